pub use sea_orm_migration::prelude::*;

mod m20260115_120000_add_guest_tables;
mod m20260201_120000_add_reminder_tables;
mod m20260210_120000_add_sent_uniqueness;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260115_120000_add_guest_tables::Migration),
            Box::new(m20260201_120000_add_reminder_tables::Migration),
            Box::new(m20260210_120000_add_sent_uniqueness::Migration),
        ]
    }
}
