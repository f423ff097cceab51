//! Pull/push reconciliation against the remote directory, plus the
//! fire-and-forget work queue that keeps sync off every hot path.

use std::collections::{HashMap, HashSet};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::Serialize;
use time::{
    Date, OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description,
};
use tokio::sync::mpsc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::directory::client::{DirectoryClient, DirectoryGuest, RsvpPush};
use crate::directory::remote_status;
use crate::entity::{guest, rsvp};
use crate::error::SyncError;
use crate::schedule::Stage;

/// Counts reported by one directory pull.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PullStats {
    pub created: u32,
    pub updated: u32,
    pub deleted: u32,
}

/// Walks the remote list and makes the local guest table follow it.
///
/// Remote rows are matched to local guests by token first, phone second.
/// Unmatched remote rows become new local guests (with a generated token if
/// the remote row carries none); matched rows update identity fields and
/// mirror any non-pending RSVP state; local guests matching no remote row
/// are removed along with their RSVP row. Ledger rows survive removal so
/// the send history stays auditable.
#[tracing::instrument(skip_all)]
pub async fn pull_directory(
    db: &DatabaseConnection,
    client: &DirectoryClient,
) -> Result<PullStats, SyncError> {
    let remote = client.list_all().await?;
    let locals = guest::Entity::find().all(db).await?;

    let mut by_token: HashMap<&str, &guest::Model> = HashMap::new();
    let mut by_phone: HashMap<&str, &guest::Model> = HashMap::new();
    for local in &locals {
        by_token.insert(local.token.as_str(), local);
        if let Some(phone) = local.phone.as_deref().filter(|p| !p.is_empty()) {
            by_phone.entry(phone).or_insert(local);
        }
    }

    let mut stats = PullStats::default();
    let mut matched: HashSet<i32> = HashSet::new();

    for record in &remote {
        let existing = record
            .token
            .as_deref()
            .and_then(|token| by_token.get(token).copied())
            .or_else(|| {
                if record.phone.is_empty() {
                    None
                } else {
                    by_phone.get(record.phone.as_str()).copied()
                }
            });

        match existing {
            Some(local) => {
                matched.insert(local.id);
                apply_guest_updates(db, local, record).await?;
                sync_rsvp_state(db, local.id, record).await?;
                stats.updated += 1;
            }
            None => {
                let id = create_local_guest(db, record).await?;
                matched.insert(id);
                sync_rsvp_state(db, id, record).await?;
                stats.created += 1;
            }
        }
    }

    for local in &locals {
        if matched.contains(&local.id) {
            continue;
        }
        rsvp::Entity::delete_many()
            .filter(rsvp::Column::GuestId.eq(local.id))
            .exec(db)
            .await?;
        guest::Entity::delete_by_id(local.id).exec(db).await?;
        stats.deleted += 1;
    }

    tracing::info!(
        "Directory pull: {} created, {} updated, {} deleted",
        stats.created,
        stats.updated,
        stats.deleted
    );
    Ok(stats)
}

async fn apply_guest_updates(
    db: &DatabaseConnection,
    local: &guest::Model,
    record: &DirectoryGuest,
) -> Result<(), SyncError> {
    let mut row: guest::ActiveModel = local.clone().into();
    row.name = Set(record.name.clone());
    row.phone = Set(Some(record.phone.clone()).filter(|p| !p.is_empty()));
    row.language_preference = Set(Some(record.language.clone()));
    if let Some(token) = &record.token {
        row.token = Set(token.clone());
    }
    row.update(db).await?;
    Ok(())
}

async fn create_local_guest(
    db: &DatabaseConnection,
    record: &DirectoryGuest,
) -> Result<i32, SyncError> {
    let token = record
        .token
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    let inserted = guest::ActiveModel {
        name: Set(record.name.clone()),
        phone: Set(Some(record.phone.clone()).filter(|p| !p.is_empty())),
        email: Set(None),
        token: Set(token),
        language_preference: Set(Some(record.language.clone())),
        has_plus_one: Set(false),
        plus_one_used: Set(false),
        is_family: Set(false),
        created_at: Set(OffsetDateTime::now_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    tracing::debug!("Created local guest {} from directory", inserted.name);
    Ok(inserted.id)
}

/// Mirrors a non-pending remote status onto the local RSVP row.
async fn sync_rsvp_state(
    db: &DatabaseConnection,
    guest_id: i32,
    record: &DirectoryGuest,
) -> Result<(), SyncError> {
    if !record.has_responded() {
        return Ok(());
    }

    let rsvp_date = record.rsvp_date.as_deref().and_then(parse_remote_timestamp);
    let now = OffsetDateTime::now_utc();

    let existing = rsvp::Entity::find()
        .filter(rsvp::Column::GuestId.eq(guest_id))
        .one(db)
        .await?;
    let mut row: rsvp::ActiveModel = match existing {
        Some(model) => model.into(),
        None => rsvp::ActiveModel {
            guest_id: Set(guest_id),
            is_attending: Set(false),
            is_cancelled: Set(false),
            adults_count: Set(1),
            children_count: Set(0),
            plus_one_name: Set(None),
            hotel_name: Set(None),
            transport_to_church: Set(false),
            transport_to_reception: Set(false),
            transport_to_hotel: Set(false),
            dietary_notes: Set(None),
            created_at: Set(rsvp_date.unwrap_or(now)),
            last_updated: Set(rsvp_date.unwrap_or(now)),
            cancellation_date: Set(None),
            ..Default::default()
        },
    };

    match record.status.as_str() {
        remote_status::ATTENDING => {
            row.is_attending = Set(true);
            row.is_cancelled = Set(false);
        }
        remote_status::DECLINED => {
            row.is_attending = Set(false);
            row.is_cancelled = Set(false);
        }
        remote_status::CANCELLED => {
            row.is_attending = Set(false);
            row.is_cancelled = Set(true);
            row.cancellation_date = Set(Some(rsvp_date.unwrap_or(now)));
        }
        _ => {}
    }

    if let Some(hotel) = &record.hotel {
        row.hotel_name = Set(Some(hotel.clone()));
    }
    if let Some(adults) = record.adults_count {
        row.adults_count = Set(adults);
    }
    if let Some(children) = record.children_count {
        row.children_count = Set(children);
    }
    row.transport_to_church = Set(record.transport_church);
    row.transport_to_reception = Set(record.transport_reception);
    row.transport_to_hotel = Set(record.transport_hotel);
    if let Some(when) = rsvp_date {
        row.created_at = Set(when);
        row.last_updated = Set(when);
    }

    row.save(db).await?;
    Ok(())
}

/// Pushes one guest's local RSVP state onto the matching remote record.
#[tracing::instrument(skip(db, client))]
pub async fn push_rsvp(
    db: &DatabaseConnection,
    client: &DirectoryClient,
    token: &str,
) -> Result<(), SyncError> {
    let local = guest::Entity::find()
        .filter(guest::Column::Token.eq(token))
        .one(db)
        .await?
        .ok_or_else(|| SyncError::MissingLocal(format!("no guest with token {token}")))?;
    let state = rsvp::Entity::find()
        .filter(rsvp::Column::GuestId.eq(local.id))
        .one(db)
        .await?
        .ok_or_else(|| SyncError::MissingLocal(format!("no RSVP for guest {}", local.name)))?;

    let remote = match client.find_by_token(token).await? {
        Some(remote) => remote,
        None => {
            let phone = local.phone.as_deref().filter(|p| !p.is_empty());
            match phone {
                Some(phone) => client
                    .find_by_phone(phone)
                    .await?
                    .ok_or_else(|| SyncError::MissingRemote(local.name.clone()))?,
                None => return Err(SyncError::MissingRemote(local.name.clone())),
            }
        }
    };

    let status = if state.is_cancelled {
        remote_status::CANCELLED
    } else if state.is_attending {
        remote_status::ATTENDING
    } else {
        remote_status::DECLINED
    };

    let push = RsvpPush {
        status,
        rsvp_date: state.created_at.date(),
        adults_count: Some(state.adults_count),
        children_count: Some(state.children_count),
        hotel: state.hotel_name.clone(),
        dietary_notes: state.dietary_notes.clone(),
        transport_church: state.transport_to_church,
        transport_reception: state.transport_to_reception,
        transport_hotel: state.transport_to_hotel,
    };
    client.update_rsvp_fields(&remote.record_id, &push).await?;
    tracing::info!("Pushed RSVP for {} to the directory", local.name);
    Ok(())
}

/// Directory timestamps arrive either as bare dates or full RFC 3339.
fn parse_remote_timestamp(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(when) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(when);
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|date| date.midnight().assume_utc())
}

/// Work item on the sync queue.
#[derive(Debug)]
pub enum SyncJob {
    PushRsvp { token: String },
    MarkReminderSent { token: String, stage: Stage },
}

/// Cheap cloneable handle for enqueueing sync work.
///
/// Submission never blocks and never fails the caller. With no directory
/// configured, jobs are dropped with a debug log.
#[derive(Clone)]
pub struct SyncHandle {
    tx: Option<mpsc::UnboundedSender<SyncJob>>,
}

impl SyncHandle {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn push_rsvp(&self, token: &str) {
        self.submit(SyncJob::PushRsvp {
            token: token.to_owned(),
        });
    }

    pub fn mark_reminder_sent(&self, token: &str, stage: Stage) {
        self.submit(SyncJob::MarkReminderSent {
            token: token.to_owned(),
            stage,
        });
    }

    fn submit(&self, job: SyncJob) {
        match &self.tx {
            Some(tx) => {
                if tx.send(job).is_err() {
                    tracing::warn!("Sync worker is gone; dropping directory sync job");
                }
            }
            None => tracing::debug!("Directory not configured; dropping sync job"),
        }
    }
}

/// Spawns the queue worker and returns its submission handle.
pub fn spawn_sync_worker(db: DatabaseConnection, client: DirectoryClient) -> SyncHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            if let Err(e) = run_job(&db, &client, &job).await {
                tracing::error!(
                    name = "directory.sync_job_failed",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    job = ?job,
                    error = %e,
                    message = "directory sync job failed",
                );
            }
        }
    });
    SyncHandle { tx: Some(tx) }
}

async fn run_job(
    db: &DatabaseConnection,
    client: &DirectoryClient,
    job: &SyncJob,
) -> Result<(), SyncError> {
    match job {
        SyncJob::PushRsvp { token } => push_rsvp(db, client, token).await,
        SyncJob::MarkReminderSent { token, stage } => {
            let remote = client
                .find_by_token(token)
                .await?
                .ok_or_else(|| SyncError::MissingRemote(format!("token {token}")))?;
            client
                .mark_reminder_sent(&remote.record_id, *stage, OffsetDateTime::now_utc())
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parses_bare_dates_and_rfc3339() {
        assert_eq!(
            parse_remote_timestamp("2026-04-06"),
            Some(datetime!(2026-04-06 00:00 UTC))
        );
        assert_eq!(
            parse_remote_timestamp("2026-04-06T10:30:00Z"),
            Some(datetime!(2026-04-06 10:30 UTC))
        );
        assert_eq!(parse_remote_timestamp("next tuesday"), None);
        assert_eq!(parse_remote_timestamp(""), None);
    }

    #[test]
    fn disabled_handle_drops_jobs_silently() {
        let handle = SyncHandle::disabled();
        handle.push_rsvp("tok-1");
        handle.mark_reminder_sent("tok-1", Stage::Initial);
    }
}
