use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Local mirror of the guest directory plus RSVP responses.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Guest::Table)
                    .if_not_exists()
                    .col(pk_auto(Guest::Id))
                    .col(string(Guest::Name))
                    .col(string_null(Guest::Phone))
                    .col(string_null(Guest::Email))
                    .col(string(Guest::Token).not_null().unique_key().to_owned())
                    .col(string_null(Guest::LanguagePreference).default("en").to_owned())
                    .col(boolean(Guest::HasPlusOne).default(false).to_owned())
                    .col(boolean(Guest::PlusOneUsed).default(false).to_owned())
                    .col(boolean(Guest::IsFamily).default(false).to_owned())
                    .col(
                        timestamp_with_time_zone(Guest::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null()
                            .to_owned(),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(Rsvp::Table)
                    .if_not_exists()
                    .col(pk_auto(Rsvp::Id))
                    .col(integer(Rsvp::GuestId))
                    .col(boolean(Rsvp::IsAttending).default(false).to_owned())
                    .col(boolean(Rsvp::IsCancelled).default(false).to_owned())
                    .col(integer(Rsvp::AdultsCount).default(1).to_owned())
                    .col(integer(Rsvp::ChildrenCount).default(0).to_owned())
                    .col(string_null(Rsvp::PlusOneName))
                    .col(string_null(Rsvp::HotelName))
                    .col(boolean(Rsvp::TransportToChurch).default(false).to_owned())
                    .col(boolean(Rsvp::TransportToReception).default(false).to_owned())
                    .col(boolean(Rsvp::TransportToHotel).default(false).to_owned())
                    .col(text_null(Rsvp::DietaryNotes))
                    .col(
                        timestamp_with_time_zone(Rsvp::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null()
                            .to_owned(),
                    )
                    .col(
                        timestamp_with_time_zone(Rsvp::LastUpdated)
                            .default(Expr::current_timestamp())
                            .not_null()
                            .to_owned(),
                    )
                    .col(timestamp_with_time_zone_null(Rsvp::CancellationDate))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_rsvp_guest_id")
                    .table(Rsvp::Table)
                    .col(Rsvp::GuestId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Rsvp::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Guest::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Guest {
    Table,
    Id,
    Name,
    Phone,
    Email,
    Token,
    LanguagePreference,
    HasPlusOne,
    PlusOneUsed,
    IsFamily,
    CreatedAt,
}

#[derive(Iden)]
pub enum Rsvp {
    Table,
    Id,
    GuestId,
    IsAttending,
    IsCancelled,
    AdultsCount,
    ChildrenCount,
    PlusOneName,
    HotelName,
    TransportToChurch,
    TransportToReception,
    TransportToHotel,
    DietaryNotes,
    CreatedAt,
    LastUpdated,
    CancellationDate,
}
