use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

use super::m20250301_000001_create_users::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(BookingStatus::Enum)
                    .values([
                        BookingStatus::Pending,
                        BookingStatus::Confirmed,
                        BookingStatus::Completed,
                        BookingStatus::Cancelled,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(PaymentStatus::Enum)
                    .values([
                        PaymentStatus::Pending,
                        PaymentStatus::Paid,
                        PaymentStatus::Refunded,
                    ])
                    .to_owned(),
            )
            .await?;

        // vehicle_id is a weak reference: deleting a vehicle leaves its bookings in place
        manager
            .create_table(
                Table::create()
                    .table(Booking::Table)
                    .if_not_exists()
                    .col(uuid(Booking::Id).primary_key())
                    .col(uuid(Booking::VehicleId).not_null())
                    .col(uuid(Booking::UserId).not_null())
                    .col(timestamp_with_time_zone(Booking::StartDate).not_null())
                    .col(timestamp_with_time_zone(Booking::EndDate).not_null())
                    .col(decimal_len(Booking::TotalPrice, 12, 2).not_null())
                    .col(
                        ColumnDef::new(Booking::Status)
                            .custom(BookingStatus::Enum)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Booking::PaymentStatus)
                            .custom(PaymentStatus::Enum)
                            .not_null(),
                    )
                    .col(string_len_null(Booking::PaymentId, 100))
                    .col(timestamp_with_time_zone_null(Booking::PaymentDate))
                    .col(string_len(Booking::CustomerName, 200).not_null())
                    .col(string_len(Booking::CustomerEmail, 255).not_null())
                    .col(string_len(Booking::CustomerPhone, 20).not_null())
                    .col(string_len(Booking::PickupCity, 100).not_null())
                    .col(
                        timestamp_with_time_zone(Booking::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(Booking::EndDate).gt(Expr::col(Booking::StartDate)))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_user")
                            .from(Booking::Table, Booking::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_booking_vehicle_window")
                    .table(Booking::Table)
                    .col(Booking::VehicleId)
                    .col(Booking::StartDate)
                    .col(Booking::EndDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_booking_user_created")
                    .table(Booking::Table)
                    .col(Booking::UserId)
                    .col(Booking::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Booking::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(PaymentStatus::Enum).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(BookingStatus::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Booking {
    Table,
    Id,
    VehicleId,
    UserId,
    StartDate,
    EndDate,
    TotalPrice,
    Status,
    PaymentStatus,
    PaymentId,
    PaymentDate,
    CustomerName,
    CustomerEmail,
    CustomerPhone,
    PickupCity,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum BookingStatus {
    #[sea_orm(iden = "booking_status")]
    Enum,
    #[sea_orm(iden = "pending")]
    Pending,
    #[sea_orm(iden = "confirmed")]
    Confirmed,
    #[sea_orm(iden = "completed")]
    Completed,
    #[sea_orm(iden = "cancelled")]
    Cancelled,
}

#[derive(DeriveIden)]
pub enum PaymentStatus {
    #[sea_orm(iden = "payment_status")]
    Enum,
    #[sea_orm(iden = "pending")]
    Pending,
    #[sea_orm(iden = "paid")]
    Paid,
    #[sea_orm(iden = "refunded")]
    Refunded,
}
