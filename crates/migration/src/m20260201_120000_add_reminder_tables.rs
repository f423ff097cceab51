use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Reminder audit tables: per-send history, batch runs, and per-guest
/// send preferences.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReminderHistory::Table)
                    .if_not_exists()
                    .col(pk_auto(ReminderHistory::Id))
                    .col(integer(ReminderHistory::GuestId))
                    .col(
                        ColumnDef::new(ReminderHistory::ReminderType)
                            .string()
                            .not_null()
                            .comment("Stage: 'initial', 'first', 'second', 'final' or 'manual'"),
                    )
                    .col(
                        ColumnDef::new(ReminderHistory::Status)
                            .string()
                            .not_null()
                            .default("pending")
                            .comment("'pending', 'sent', 'failed' or 'skipped'"),
                    )
                    .col(string_null(ReminderHistory::SentTo))
                    .col(string_null(ReminderHistory::Subject))
                    .col(timestamp_with_time_zone_null(ReminderHistory::ScheduledFor))
                    .col(timestamp_with_time_zone_null(ReminderHistory::SentAt))
                    .col(text_null(ReminderHistory::ErrorMessage))
                    .col(string_null(ReminderHistory::SentBy))
                    .col(text_null(ReminderHistory::Notes))
                    .col(
                        timestamp_with_time_zone(ReminderHistory::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null()
                            .to_owned(),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_reminder_history_guest_id")
                    .table(ReminderHistory::Table)
                    .col(ReminderHistory::GuestId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_reminder_history_type_status")
                    .table(ReminderHistory::Table)
                    .col(ReminderHistory::ReminderType)
                    .col(ReminderHistory::Status)
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(ReminderBatch::Table)
                    .if_not_exists()
                    .col(pk_auto(ReminderBatch::Id))
                    .col(
                        ColumnDef::new(ReminderBatch::BatchType)
                            .string()
                            .not_null()
                            .comment("'scheduled' or 'manual'"),
                    )
                    .col(string(ReminderBatch::ReminderType))
                    .col(integer(ReminderBatch::TotalGuests).default(0).to_owned())
                    .col(integer(ReminderBatch::SentCount).default(0).to_owned())
                    .col(integer(ReminderBatch::FailedCount).default(0).to_owned())
                    .col(integer(ReminderBatch::SkippedCount).default(0).to_owned())
                    .col(
                        timestamp_with_time_zone(ReminderBatch::StartedAt)
                            .default(Expr::current_timestamp())
                            .not_null()
                            .to_owned(),
                    )
                    .col(timestamp_with_time_zone_null(ReminderBatch::CompletedAt))
                    .col(string_null(ReminderBatch::ExecutedBy))
                    .col(integer_null(ReminderBatch::DaysBeforeDeadline))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_reminder_batch_started_at")
                    .table(ReminderBatch::Table)
                    .col(ReminderBatch::StartedAt)
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(GuestReminderPreference::Table)
                    .if_not_exists()
                    .col(pk_auto(GuestReminderPreference::Id))
                    .col(
                        integer(GuestReminderPreference::GuestId)
                            .unique_key()
                            .to_owned(),
                    )
                    .col(
                        boolean(GuestReminderPreference::OptOut)
                            .default(false)
                            .to_owned(),
                    )
                    .col(
                        string(GuestReminderPreference::PreferredLanguage)
                            .default("es")
                            .to_owned(),
                    )
                    .col(
                        integer(GuestReminderPreference::MaxReminders)
                            .default(4)
                            .to_owned(),
                    )
                    .col(
                        integer(GuestReminderPreference::TotalSent)
                            .default(0)
                            .to_owned(),
                    )
                    .col(timestamp_with_time_zone_null(
                        GuestReminderPreference::LastReminderSent,
                    ))
                    .col(
                        timestamp_with_time_zone(GuestReminderPreference::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null()
                            .to_owned(),
                    )
                    .col(
                        timestamp_with_time_zone(GuestReminderPreference::UpdatedAt)
                            .default(Expr::current_timestamp())
                            .not_null()
                            .to_owned(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(GuestReminderPreference::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(ReminderBatch::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ReminderHistory::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum ReminderHistory {
    Table,
    Id,
    GuestId,
    ReminderType,
    Status,
    SentTo,
    Subject,
    ScheduledFor,
    SentAt,
    ErrorMessage,
    SentBy,
    Notes,
    CreatedAt,
}

#[derive(Iden)]
pub enum ReminderBatch {
    Table,
    Id,
    BatchType,
    ReminderType,
    TotalGuests,
    SentCount,
    FailedCount,
    SkippedCount,
    StartedAt,
    CompletedAt,
    ExecutedBy,
    DaysBeforeDeadline,
}

#[derive(Iden)]
pub enum GuestReminderPreference {
    Table,
    Id,
    GuestId,
    OptOut,
    PreferredLanguage,
    MaxReminders,
    TotalSent,
    LastReminderSent,
    CreatedAt,
    UpdatedAt,
}
