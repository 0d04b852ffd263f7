use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Cancel and reschedule stamp their own timestamps alongside updated_at
        manager
            .alter_table(
                Table::alter()
                    .table(Booking::Table)
                    .add_column(timestamp_with_time_zone_null(Booking::UpdatedAt))
                    .add_column(timestamp_with_time_zone_null(Booking::CancelledAt))
                    .add_column(timestamp_with_time_zone_null(Booking::RescheduledAt))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Booking::Table)
                    .drop_column(Booking::RescheduledAt)
                    .drop_column(Booking::CancelledAt)
                    .drop_column(Booking::UpdatedAt)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Booking {
    Table,
    UpdatedAt,
    CancelledAt,
    RescheduledAt,
}
