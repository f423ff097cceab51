use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, ToSchema)]
#[sea_orm(table_name = "rsvp")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub guest_id: i32,
    pub is_attending: bool,
    pub is_cancelled: bool,
    pub adults_count: i32,
    pub children_count: i32,
    pub plus_one_name: Option<String>,
    pub hotel_name: Option<String>,
    pub transport_to_church: bool,
    pub transport_to_reception: bool,
    pub transport_to_hotel: bool,
    pub dietary_notes: Option<String>,
    pub created_at: OffsetDateTime,
    pub last_updated: OffsetDateTime,
    pub cancellation_date: Option<OffsetDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// A response counts as active unless the guest cancelled it again.
    /// Cancelled responses put the guest back into the reminder pool.
    pub fn is_active(&self) -> bool {
        !self.is_cancelled
    }

    pub fn party_size(&self) -> i32 {
        self.adults_count + self.children_count
    }
}
