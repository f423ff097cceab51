use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, ToSchema)]
#[sea_orm(table_name = "guest")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[sea_orm(unique)]
    pub token: String,
    pub language_preference: Option<String>,
    pub has_plus_one: bool,
    pub plus_one_used: bool,
    pub is_family: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// A guest is reachable if at least one channel has a destination on file.
    pub fn is_reachable(&self) -> bool {
        self.phone.as_deref().is_some_and(|p| !p.is_empty())
            || self.email.as_deref().is_some_and(|e| !e.is_empty())
    }
}
