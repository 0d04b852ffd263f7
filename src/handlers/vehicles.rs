use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::vehicle::{self, VehicleCategory};
use crate::error::{AppError, AppResult};
use crate::services::availability;
use crate::services::pricing::{self, Quote};
use crate::services::window::BookingWindow;
use crate::utils::location::SERVED_CITIES;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VehicleFilter {
    pub category: Option<VehicleCategory>,
    pub available_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub vehicle_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct StateCities {
    pub state: &'static str,
    pub cities: &'static [&'static str],
}

pub(crate) async fn find_vehicle(state: &AppState, vehicle_id: Uuid) -> AppResult<vehicle::Model> {
    vehicle::Entity::find_by_id(vehicle_id)
        .one(&*state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))
}

/// Browse the catalog. Hidden vehicles are left out unless `available_only=false`.
pub async fn list_vehicles(
    State(state): State<AppState>,
    Query(filter): Query<VehicleFilter>,
) -> AppResult<Json<Vec<vehicle::Model>>> {
    let mut query = vehicle::Entity::find().order_by_asc(vehicle::Column::Name);

    if let Some(category) = filter.category {
        query = query.filter(vehicle::Column::Category.eq(category));
    }
    if filter.available_only.unwrap_or(true) {
        query = query.filter(vehicle::Column::AvailabilityStatus.eq(true));
    }

    Ok(Json(query.all(&*state.db).await?))
}

pub async fn get_vehicle(
    State(state): State<AppState>,
    Path(vehicle_id): Path<Uuid>,
) -> AppResult<Json<vehicle::Model>> {
    Ok(Json(find_vehicle(&state, vehicle_id).await?))
}

/// Price a window at the vehicle's current rate, tax shown separately.
pub async fn quote(
    State(state): State<AppState>,
    Path(vehicle_id): Path<Uuid>,
    Query(params): Query<WindowQuery>,
) -> AppResult<Json<Quote>> {
    let window = BookingWindow::new(params.start, params.end)?;
    let vehicle = find_vehicle(&state, vehicle_id).await?;

    Ok(Json(pricing::quote(&window, vehicle.hourly_rate)))
}

pub async fn check_availability(
    State(state): State<AppState>,
    Path(vehicle_id): Path<Uuid>,
    Query(params): Query<WindowQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    let window = BookingWindow::new(params.start, params.end)?;
    let vehicle = find_vehicle(&state, vehicle_id).await?;

    let available = availability::is_available(&*state.db, vehicle.id, &window).await?;

    Ok(Json(AvailabilityResponse {
        vehicle_id: vehicle.id,
        start: window.start(),
        end: window.end(),
        available,
    }))
}

pub async fn list_cities() -> Json<Vec<StateCities>> {
    Json(
        SERVED_CITIES
            .iter()
            .map(|&(state, cities)| StateCities { state, cities })
            .collect(),
    )
}
