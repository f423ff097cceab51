//! Dispatch engine: turns a candidate list into send attempts and ledger rows.
//!
//! A batch walks its candidates sequentially. Each guest goes through the
//! same sequence: re-check RSVP state (race guard), resolve channel and
//! language, render copy, deliver under a timeout, record the outcome. A
//! channel failure is folded into the guest's ledger row and the batch
//! continues; only database errors abort the batch, leaving the batch row
//! with `completed_at` unset and correct partial counts.
//!
//! Dry runs render everything but call no adapter and write nothing.

use std::collections::BTreeMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::AppResources;
use crate::channel::templates::{language_for_guest, reminder_copy};
use crate::channel::{Channel, resolve_channel};
use crate::eligibility;
use crate::entity::{guest, reminder_batch, reminder_history, reminder_preference, rsvp};
use crate::error::SendError;
use crate::schedule::{SCHEDULED_STAGES, Stage};

/// How a run was started. Decides the recorded `executed_by` identity and
/// the batch type.
#[derive(Debug, Clone)]
pub enum Trigger {
    Scheduled,
    Manual { executed_by: String },
}

impl Trigger {
    pub fn executed_by(&self) -> &str {
        match self {
            Trigger::Scheduled => "scheduler",
            Trigger::Manual { executed_by } => executed_by,
        }
    }

    pub fn batch_type(&self) -> &'static str {
        match self {
            Trigger::Scheduled => "scheduled",
            Trigger::Manual { .. } => "manual",
        }
    }
}

/// One dispatch invocation, fully specified by the caller. Which stage to
/// run is decided upstream, against the calendar or a forced override.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub trigger: Trigger,
    pub dry_run: bool,
}

/// Per-guest line in the batch report.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SendDetail {
    pub guest: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SendDetail {
    pub(crate) fn sent(name: &str, sent_to: String, dry_run: bool) -> Self {
        let status = if dry_run { "sent (dry run)" } else { "sent" };
        Self {
            guest: name.to_owned(),
            status: status.to_owned(),
            sent_to: Some(sent_to),
            error: None,
            reason: None,
        }
    }

    pub(crate) fn failed(name: &str, error: String) -> Self {
        Self {
            guest: name.to_owned(),
            status: "failed".to_owned(),
            sent_to: None,
            error: Some(error),
            reason: None,
        }
    }

    pub(crate) fn skipped(name: &str, reason: &str) -> Self {
        Self {
            guest: name.to_owned(),
            status: "skipped".to_owned(),
            sent_to: None,
            error: None,
            reason: Some(reason.to_owned()),
        }
    }

    fn counts_as_sent(&self) -> bool {
        self.status.starts_with("sent")
    }
}

/// Aggregate result of one batch or one manual multi-guest run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchOutcome {
    pub stage: Stage,
    pub dry_run: bool,
    pub total: i32,
    pub sent: i32,
    pub failed: i32,
    pub skipped: i32,
    pub details: Vec<SendDetail>,
}

/// Runs one stage's batch end to end and finalizes the batch row.
///
/// Dry runs produce the same report without a batch row or any other write.
#[tracing::instrument(skip(resources, request), fields(dry_run = request.dry_run))]
pub async fn run_stage_batch(
    resources: &AppResources,
    stage: Stage,
    request: &DispatchRequest,
) -> Result<BatchOutcome, DbErr> {
    let db = &resources.db;
    let candidates = eligibility::candidates_for_stage(db, stage).await?;

    tracing::info!(
        "Dispatching {stage} reminder to {} candidate(s){}",
        candidates.len(),
        if request.dry_run { " (dry run)" } else { "" }
    );

    let batch = if request.dry_run {
        None
    } else {
        let started = reminder_batch::ActiveModel {
            batch_type: Set(request.trigger.batch_type().to_owned()),
            reminder_type: Set(stage.as_str().to_owned()),
            total_guests: Set(candidates.len() as i32),
            sent_count: Set(0),
            failed_count: Set(0),
            skipped_count: Set(0),
            started_at: Set(OffsetDateTime::now_utc()),
            completed_at: Set(None),
            executed_by: Set(Some(request.trigger.executed_by().to_owned())),
            days_before_deadline: Set(stage.days_before().map(|d| d as i32)),
            ..Default::default()
        };
        Some(started.insert(db).await?)
    };

    let mut sent = 0;
    let mut failed = 0;
    let mut skipped = 0;
    let mut details = Vec::with_capacity(candidates.len());

    for candidate in &candidates {
        let detail = deliver(
            resources,
            candidate,
            stage,
            None,
            request.trigger.executed_by(),
            request.dry_run,
        )
        .await?;
        if detail.counts_as_sent() {
            sent += 1;
        } else if detail.status == "failed" {
            failed += 1;
        } else {
            skipped += 1;
        }
        details.push(detail);
    }

    if let Some(batch) = batch {
        let mut row: reminder_batch::ActiveModel = batch.into();
        row.sent_count = Set(sent);
        row.failed_count = Set(failed);
        row.skipped_count = Set(skipped);
        row.completed_at = Set(Some(OffsetDateTime::now_utc()));
        row.update(db).await?;
    }

    tracing::info!(
        "Completed {stage} batch: {sent} sent, {failed} failed, {skipped} skipped"
    );

    Ok(BatchOutcome {
        stage,
        dry_run: request.dry_run,
        total: candidates.len() as i32,
        sent,
        failed,
        skipped,
        details,
    })
}

/// Ad-hoc sends to explicitly named guests, recorded under the `manual`
/// stage with the operator identity and optional note.
///
/// No batch row is written; manual sends stand alone in the history. Unknown
/// guest ids are reported as per-id failures rather than aborting the run.
#[tracing::instrument(skip(resources, guest_ids, note))]
pub async fn send_manual_reminders(
    resources: &AppResources,
    guest_ids: &[i32],
    note: Option<&str>,
    sent_by: &str,
) -> Result<BatchOutcome, DbErr> {
    let db = &resources.db;
    let mut sent = 0;
    let mut failed = 0;
    let mut skipped = 0;
    let mut details = Vec::with_capacity(guest_ids.len());

    for id in guest_ids {
        let detail = match guest::Entity::find_by_id(*id).one(db).await? {
            Some(guest) => deliver(resources, &guest, Stage::Manual, note, sent_by, false).await?,
            None => SendDetail::failed(&format!("guest #{id}"), "Guest not found".to_owned()),
        };
        if detail.counts_as_sent() {
            sent += 1;
        } else if detail.status == "failed" {
            failed += 1;
        } else {
            skipped += 1;
        }
        details.push(detail);
    }

    Ok(BatchOutcome {
        stage: Stage::Manual,
        dry_run: false,
        total: guest_ids.len() as i32,
        sent,
        failed,
        skipped,
        details,
    })
}

/// One guest's re-check, render, send and record sequence.
///
/// Channel failures become FAILED rows and a failed detail; only database
/// errors propagate.
async fn deliver(
    resources: &AppResources,
    guest: &guest::Model,
    stage: Stage,
    note: Option<&str>,
    sent_by: &str,
    dry_run: bool,
) -> Result<SendDetail, DbErr> {
    let db = &resources.db;
    let config = &resources.config;

    // Race guard: the guest may have responded since the candidate snapshot
    // was taken. Manual sends are operator-directed and skip this check.
    if stage != Stage::Manual {
        let responded = rsvp::Entity::find()
            .filter(rsvp::Column::GuestId.eq(guest.id))
            .one(db)
            .await?
            .is_some_and(|r| r.is_active());
        if responded {
            if !dry_run {
                record_skipped(db, guest, stage, sent_by, "Already responded").await?;
            }
            return Ok(SendDetail::skipped(&guest.name, "Already responded"));
        }
    }

    // Preference gate. Candidates were already filtered, so for batches this
    // only catches a mid-batch opt-out; for manual sends it is the sole gate.
    let preference = reminder_preference::Entity::find()
        .filter(reminder_preference::Column::GuestId.eq(guest.id))
        .one(db)
        .await?;
    if preference.is_some_and(|p| !p.can_send_reminder()) {
        return Ok(SendDetail::skipped(
            &guest.name,
            "Opted out or reached reminder cap",
        ));
    }

    let Some(channel) = resolve_channel(guest) else {
        let err = SendError::InvalidDestination("no phone number or email address on file".into());
        if dry_run {
            return Ok(SendDetail::failed(&guest.name, err.to_string()));
        }
        let record = insert_pending(db, guest, stage, None, None, sent_by, note).await?;
        return fail_record(db, record, guest, &err).await;
    };

    let language = match channel {
        Channel::WhatsApp => language_for_guest(
            guest.language_preference.as_deref(),
            guest.phone.as_deref(),
            &config.default_country_code,
        ),
        Channel::Email => language_for_guest(
            guest.language_preference.as_deref(),
            None,
            &config.default_country_code,
        ),
    };
    let rsvp_link = config.rsvp_link(&guest.token);
    let copy = reminder_copy(
        stage,
        language,
        &guest.name,
        &rsvp_link,
        config.rsvp_deadline,
        note,
    );

    let destination = match channel {
        Channel::WhatsApp => guest.phone.clone(),
        Channel::Email => guest.email.clone(),
    }
    .unwrap_or_default();

    if dry_run {
        return Ok(SendDetail::sent(&guest.name, destination, true));
    }

    let record = insert_pending(
        db,
        guest,
        stage,
        Some(destination.clone()),
        Some(copy.subject.clone()),
        sent_by,
        note,
    )
    .await?;

    let attempt = async {
        match channel {
            Channel::WhatsApp => resources.whatsapp.send_reminder(&destination, &copy).await,
            Channel::Email => {
                resources
                    .email
                    .send_reminder(&destination, &copy, &rsvp_link, language)
                    .await
            }
        }
    };
    let outcome = match tokio::time::timeout(config.send_timeout(), attempt).await {
        Ok(outcome) => outcome,
        Err(_) => Err(SendError::Timeout(config.send_timeout())),
    };

    match outcome {
        Ok(delivery) => {
            // Status flip and counter bump commit together.
            let txn = db.begin().await?;
            let mut row: reminder_history::ActiveModel = record.into();
            row.status = Set(reminder_history::status::SENT.to_owned());
            row.sent_at = Set(Some(OffsetDateTime::now_utc()));
            row.sent_to = Set(Some(delivery.destination.clone()));
            row.update(&txn).await?;
            bump_preference(&txn, guest.id).await?;
            txn.commit().await?;

            if stage.remote_field().is_some() {
                resources.sync.mark_reminder_sent(&guest.token, stage);
            }
            Ok(SendDetail::sent(&guest.name, delivery.destination, false))
        }
        Err(err) => fail_record(db, record, guest, &err).await,
    }
}

async fn fail_record(
    db: &DatabaseConnection,
    record: reminder_history::Model,
    guest: &guest::Model,
    err: &SendError,
) -> Result<SendDetail, DbErr> {
    tracing::error!(
        name = "reminder.send_failed",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        guest_id = guest.id,
        category = err.category(),
        retryable = err.is_retryable(),
        error = %err,
        message = "reminder delivery failed",
    );
    let mut row: reminder_history::ActiveModel = record.into();
    row.status = Set(reminder_history::status::FAILED.to_owned());
    row.error_message = Set(Some(err.to_string()));
    row.update(db).await?;
    Ok(SendDetail::failed(&guest.name, err.to_string()))
}

async fn insert_pending(
    db: &DatabaseConnection,
    guest: &guest::Model,
    stage: Stage,
    sent_to: Option<String>,
    subject: Option<String>,
    sent_by: &str,
    note: Option<&str>,
) -> Result<reminder_history::Model, DbErr> {
    let now = OffsetDateTime::now_utc();
    reminder_history::ActiveModel {
        guest_id: Set(guest.id),
        reminder_type: Set(stage.as_str().to_owned()),
        status: Set(reminder_history::status::PENDING.to_owned()),
        sent_to: Set(sent_to),
        subject: Set(subject),
        scheduled_for: Set(Some(now)),
        sent_at: Set(None),
        error_message: Set(None),
        sent_by: Set(Some(sent_by.to_owned())),
        notes: Set(note.map(str::to_owned)),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

async fn record_skipped(
    db: &DatabaseConnection,
    guest: &guest::Model,
    stage: Stage,
    sent_by: &str,
    reason: &str,
) -> Result<(), DbErr> {
    let now = OffsetDateTime::now_utc();
    reminder_history::ActiveModel {
        guest_id: Set(guest.id),
        reminder_type: Set(stage.as_str().to_owned()),
        status: Set(reminder_history::status::SKIPPED.to_owned()),
        sent_to: Set(None),
        subject: Set(None),
        scheduled_for: Set(Some(now)),
        sent_at: Set(None),
        error_message: Set(None),
        sent_by: Set(Some(sent_by.to_owned())),
        notes: Set(Some(reason.to_owned())),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Post-send counter update; creates the preference row on first send.
async fn bump_preference<C: ConnectionTrait>(conn: &C, guest_id: i32) -> Result<(), DbErr> {
    let now = OffsetDateTime::now_utc();
    match reminder_preference::Entity::find()
        .filter(reminder_preference::Column::GuestId.eq(guest_id))
        .one(conn)
        .await?
    {
        Some(existing) => {
            let total = existing.total_sent + 1;
            let mut row: reminder_preference::ActiveModel = existing.into();
            row.total_sent = Set(total);
            row.last_reminder_sent = Set(Some(now));
            row.updated_at = Set(now);
            row.update(conn).await?;
        }
        None => {
            reminder_preference::ActiveModel {
                guest_id: Set(guest_id),
                opt_out: Set(false),
                preferred_language: Set("es".to_owned()),
                max_reminders: Set(4),
                total_sent: Set(1),
                last_reminder_sent: Set(Some(now)),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(conn)
            .await?;
        }
    }
    Ok(())
}

/// Marks a guest as opted out, creating the preference row if needed.
pub async fn opt_out_guest(
    db: &DatabaseConnection,
    guest_id: i32,
) -> Result<reminder_preference::Model, DbErr> {
    let now = OffsetDateTime::now_utc();
    match reminder_preference::Entity::find()
        .filter(reminder_preference::Column::GuestId.eq(guest_id))
        .one(db)
        .await?
    {
        Some(existing) => {
            let mut row: reminder_preference::ActiveModel = existing.into();
            row.opt_out = Set(true);
            row.updated_at = Set(now);
            row.update(db).await
        }
        None => {
            reminder_preference::ActiveModel {
                guest_id: Set(guest_id),
                opt_out: Set(true),
                preferred_language: Set("es".to_owned()),
                max_reminders: Set(4),
                total_sent: Set(0),
                last_reminder_sent: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await
        }
    }
}

/// Ledger rows, newest first, optionally narrowed to one guest.
pub async fn reminder_history(
    db: &DatabaseConnection,
    guest_id: Option<i32>,
    limit: u64,
) -> Result<Vec<reminder_history::Model>, DbErr> {
    let mut query = reminder_history::Entity::find()
        .order_by_desc(reminder_history::Column::CreatedAt)
        .order_by_desc(reminder_history::Column::Id)
        .limit(limit);
    if let Some(guest_id) = guest_id {
        query = query.filter(reminder_history::Column::GuestId.eq(guest_id));
    }
    query.all(db).await
}

/// Aggregate ledger counters for the status surface.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LedgerStatistics {
    pub total_sent: u64,
    pub total_failed: u64,
    pub total_pending: u64,
    pub opted_out: u64,
    pub sent_by_stage: BTreeMap<String, u64>,
    pub recent_batches: Vec<reminder_batch::Model>,
}

pub async fn reminder_statistics(db: &DatabaseConnection) -> Result<LedgerStatistics, DbErr> {
    let count_with_status = |status: &'static str| {
        reminder_history::Entity::find()
            .filter(reminder_history::Column::Status.eq(status))
            .count(db)
    };
    let total_sent = count_with_status(reminder_history::status::SENT).await?;
    let total_failed = count_with_status(reminder_history::status::FAILED).await?;
    let total_pending = count_with_status(reminder_history::status::PENDING).await?;

    let mut sent_by_stage = BTreeMap::new();
    for stage in SCHEDULED_STAGES.into_iter().chain([Stage::Manual]) {
        let count = reminder_history::Entity::find()
            .filter(reminder_history::Column::ReminderType.eq(stage.as_str()))
            .filter(reminder_history::Column::Status.eq(reminder_history::status::SENT))
            .count(db)
            .await?;
        sent_by_stage.insert(stage.as_str().to_owned(), count);
    }

    let recent_batches = reminder_batch::Entity::find()
        .order_by_desc(reminder_batch::Column::StartedAt)
        .order_by_desc(reminder_batch::Column::Id)
        .limit(10)
        .all(db)
        .await?;

    let opted_out = eligibility::opted_out_count(db).await?;

    Ok(LedgerStatistics {
        total_sent,
        total_failed,
        total_pending,
        opted_out,
        sent_by_stage,
        recent_batches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_identities() {
        assert_eq!(Trigger::Scheduled.executed_by(), "scheduler");
        assert_eq!(Trigger::Scheduled.batch_type(), "scheduled");
        let manual = Trigger::Manual {
            executed_by: "ops@example.com".to_owned(),
        };
        assert_eq!(manual.executed_by(), "ops@example.com");
        assert_eq!(manual.batch_type(), "manual");
    }

    #[test]
    fn dry_run_details_count_as_sent() {
        assert!(SendDetail::sent("Ana", "+34612345678".into(), true).counts_as_sent());
        assert!(SendDetail::sent("Ana", "+34612345678".into(), false).counts_as_sent());
        assert!(!SendDetail::failed("Ana", "boom".into()).counts_as_sent());
        assert!(!SendDetail::skipped("Ana", "Already responded").counts_as_sent());
    }
}
