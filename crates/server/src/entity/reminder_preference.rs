//! Per-guest reminder preferences and send counters.
//!
//! Rows are created lazily on the first send attempt (or on opt-out), so the
//! absence of a row means default behavior: reminders allowed, Spanish copy,
//! cap of four sends.

use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, ToSchema)]
#[sea_orm(table_name = "guest_reminder_preference")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub guest_id: i32,
    pub opt_out: bool,
    pub preferred_language: String,
    pub max_reminders: i32,
    pub total_sent: i32,
    pub last_reminder_sent: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn can_send_reminder(&self) -> bool {
        !self.opt_out && self.total_sent < self.max_reminders
    }
}
