use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(VehicleCategory::Enum)
                    .values([VehicleCategory::Car, VehicleCategory::Bike])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Vehicle::Table)
                    .if_not_exists()
                    .col(uuid(Vehicle::Id).primary_key())
                    .col(string_len(Vehicle::Name, 150).not_null())
                    .col(
                        ColumnDef::new(Vehicle::Category)
                            .custom(VehicleCategory::Enum)
                            .not_null(),
                    )
                    .col(decimal_len(Vehicle::HourlyRate, 12, 2).not_null())
                    .col(boolean(Vehicle::AvailabilityStatus).not_null().default(true))
                    .col(integer_null(Vehicle::Seats))
                    .col(string_len_null(Vehicle::Transmission, 50))
                    .col(string_len_null(Vehicle::Fuel, 50))
                    .col(string_len_null(Vehicle::EngineSize, 50))
                    .col(text_null(Vehicle::ImageUrl))
                    .col(
                        timestamp_with_time_zone(Vehicle::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone_null(Vehicle::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_vehicle_category_availability")
                    .table(Vehicle::Table)
                    .col(Vehicle::Category)
                    .col(Vehicle::AvailabilityStatus)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Vehicle::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(VehicleCategory::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Vehicle {
    Table,
    Id,
    Name,
    Category,
    HourlyRate,
    AvailabilityStatus,
    Seats,
    Transmission,
    Fuel,
    EngineSize,
    ImageUrl,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum VehicleCategory {
    #[sea_orm(iden = "vehicle_category")]
    Enum,
    #[sea_orm(iden = "car")]
    Car,
    #[sea_orm(iden = "bike")]
    Bike,
}
