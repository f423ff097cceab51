use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// At most one successfully sent reminder per guest and scheduled stage. Failed
// and skipped rows may repeat (retries on later runs), and manual sends are
// operator-driven so they stay unconstrained.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Partial indexes are not expressible through the schema builder.
        // The same syntax is valid on both PostgreSQL and SQLite.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX idx_reminder_history_sent_once \
                 ON reminder_history (guest_id, reminder_type) \
                 WHERE status = 'sent' AND reminder_type <> 'manual'",
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP INDEX idx_reminder_history_sent_once")
            .await?;
        Ok(())
    }
}
