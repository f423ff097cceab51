//! Decides which guests a reminder run may contact.
//!
//! A guest is pending while they have no active RSVP. Opt-outs and guests
//! at their reminder cap are excluded next, and for scheduled stages any
//! guest with a sent row for that stage is excluded so re-runs of the same
//! day cannot double-send. Manual reminders skip the sent-row check; an
//! operator may nudge the same guest repeatedly.

use std::collections::HashSet;

use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};

use crate::entity::{guest, reminder_history, reminder_preference, rsvp};
use crate::schedule::Stage;

/// Guests with no active RSVP that are still allowed to receive reminders.
///
/// Ordered by guest id so batch output is stable across runs.
pub async fn pending_guests(db: &DatabaseConnection) -> Result<Vec<guest::Model>, DbErr> {
    let guests = guest::Entity::find()
        .order_by_asc(guest::Column::Id)
        .all(db)
        .await?;

    let responded: HashSet<i32> = rsvp::Entity::find()
        .filter(rsvp::Column::IsCancelled.eq(false))
        .all(db)
        .await?
        .into_iter()
        .map(|r| r.guest_id)
        .collect();

    let blocked: HashSet<i32> = reminder_preference::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .filter(|p| !p.can_send_reminder())
        .map(|p| p.guest_id)
        .collect();

    Ok(guests
        .into_iter()
        .filter(|g| !responded.contains(&g.id) && !blocked.contains(&g.id))
        .collect())
}

/// Pending guests minus those already sent this stage.
pub async fn candidates_for_stage(
    db: &DatabaseConnection,
    stage: Stage,
) -> Result<Vec<guest::Model>, DbErr> {
    let pending = pending_guests(db).await?;
    if stage == Stage::Manual {
        return Ok(pending);
    }

    let already_sent: HashSet<i32> = reminder_history::Entity::find()
        .filter(reminder_history::Column::ReminderType.eq(stage.as_str()))
        .filter(reminder_history::Column::Status.eq(reminder_history::status::SENT))
        .all(db)
        .await?
        .into_iter()
        .map(|h| h.guest_id)
        .collect();

    Ok(pending
        .into_iter()
        .filter(|g| !already_sent.contains(&g.id))
        .collect())
}

/// Count of guests opted out of reminders entirely.
pub async fn opted_out_count(db: &DatabaseConnection) -> Result<u64, DbErr> {
    use sea_orm::PaginatorTrait;

    reminder_preference::Entity::find()
        .filter(reminder_preference::Column::OptOut.eq(true))
        .count(db)
        .await
}
