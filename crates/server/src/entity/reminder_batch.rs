use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, ToSchema)]
#[sea_orm(table_name = "reminder_batch")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub batch_type: String, // "scheduled" or "manual"
    pub reminder_type: String,
    pub total_guests: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub skipped_count: i32,
    pub started_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
    pub executed_by: Option<String>,
    pub days_before_deadline: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// A batch without `completed_at` was interrupted mid-run; its counts
    /// reflect the guests processed up to that point.
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}
