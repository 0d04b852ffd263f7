use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "vehicle_category")]
#[serde(rename_all = "lowercase")]
pub enum VehicleCategory {
    #[sea_orm(string_value = "car")]
    Car,
    #[sea_orm(string_value = "bike")]
    Bike,
}

impl VehicleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleCategory::Car => "car",
            VehicleCategory::Bike => "bike",
        }
    }
}

/// A rentable car or bike. `availability_status` is a manual admin flag and
/// says nothing about particular dates; date conflicts come from bookings.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vehicle")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub category: VehicleCategory,
    pub hourly_rate: Decimal,
    pub availability_status: bool,
    pub seats: Option<i32>,
    pub transmission: Option<String>,
    pub fuel: Option<String>,
    pub engine_size: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: Option<DateTimeWithTimeZone>,
}

// Bookings point at vehicles without a foreign key, so no relation is declared here.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
