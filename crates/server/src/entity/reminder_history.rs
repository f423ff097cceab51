//! Per-send audit log for reminder deliveries.
//!
//! One row per attempt. Failed and skipped rows may repeat per guest and
//! stage; successfully sent rows are unique per guest and scheduled stage
//! (enforced by a partial unique index in the schema).

use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, ToSchema)]
#[sea_orm(table_name = "reminder_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub guest_id: i32,
    pub reminder_type: String, // "initial", "first", "second", "final" or "manual"
    pub status: String,        // "pending", "sent", "failed" or "skipped"
    pub sent_to: Option<String>,
    pub subject: Option<String>,
    pub scheduled_for: Option<OffsetDateTime>,
    pub sent_at: Option<OffsetDateTime>,
    pub error_message: Option<String>,
    pub sent_by: Option<String>, // "scheduler", "system" or an operator identity
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Values the `status` column takes over a row's lifetime.
pub mod status {
    pub const PENDING: &str = "pending";
    pub const SENT: &str = "sent";
    pub const FAILED: &str = "failed";
    pub const SKIPPED: &str = "skipped";
}

impl Model {
    pub fn is_sent(&self) -> bool {
        self.status == status::SENT
    }

    /// Failed and pending rows are eligible for another attempt on a later run.
    pub fn can_retry(&self) -> bool {
        self.status == status::FAILED || self.status == status::PENDING
    }
}
