use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::booking::BookingStatus;
use crate::entities::user::{self, UserRole};
use crate::entities::vehicle::{self, VehicleCategory};
use crate::error::{AppError, AppResult};
use crate::handlers::auth::UserInfo;
use crate::handlers::bookings::{with_vehicle, with_vehicles, BookingResponse};
use crate::handlers::vehicles::find_vehicle;
use crate::services::analytics::{self, Analytics, Overview, TimeRange};
use crate::services::booking_records;
use crate::utils::jwt::Claims;
use crate::AppState;

// ============ Vehicle Management ============

#[derive(Debug, Deserialize)]
pub struct CreateVehicleRequest {
    pub name: String,
    pub category: VehicleCategory,
    pub hourly_rate: Decimal,
    pub availability_status: Option<bool>,
    pub seats: Option<i32>,
    pub transmission: Option<String>,
    pub fuel: Option<String>,
    pub engine_size: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateVehicleRequest {
    pub name: Option<String>,
    pub category: Option<VehicleCategory>,
    pub hourly_rate: Option<Decimal>,
    pub availability_status: Option<bool>,
    pub seats: Option<i32>,
    pub transmission: Option<String>,
    pub fuel: Option<String>,
    pub engine_size: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetAvailabilityRequest {
    pub availability_status: bool,
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Vehicle name is required".to_string()));
    }
    Ok(name.to_string())
}

fn validate_rate(rate: Decimal) -> AppResult<Decimal> {
    if rate <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "Hourly rate must be greater than zero".to_string(),
        ));
    }
    Ok(rate)
}

/// Apply a partial update. Fields left out of the request keep their value.
fn apply_vehicle_update(
    vehicle: vehicle::Model,
    payload: UpdateVehicleRequest,
) -> AppResult<vehicle::ActiveModel> {
    let mut active: vehicle::ActiveModel = vehicle.into();

    if let Some(name) = payload.name {
        active.name = Set(validate_name(&name)?);
    }
    if let Some(category) = payload.category {
        active.category = Set(category);
    }
    if let Some(rate) = payload.hourly_rate {
        active.hourly_rate = Set(validate_rate(rate)?);
    }
    if let Some(flag) = payload.availability_status {
        active.availability_status = Set(flag);
    }
    if payload.seats.is_some() {
        active.seats = Set(payload.seats);
    }
    if payload.transmission.is_some() {
        active.transmission = Set(payload.transmission);
    }
    if payload.fuel.is_some() {
        active.fuel = Set(payload.fuel);
    }
    if payload.engine_size.is_some() {
        active.engine_size = Set(payload.engine_size);
    }
    if payload.image_url.is_some() {
        active.image_url = Set(payload.image_url);
    }
    active.updated_at = Set(Some(Utc::now().into()));

    Ok(active)
}

/// Every vehicle, including hidden ones.
pub async fn list_vehicles(State(state): State<AppState>) -> AppResult<Json<Vec<vehicle::Model>>> {
    let vehicles = vehicle::Entity::find()
        .order_by_asc(vehicle::Column::Name)
        .all(&*state.db)
        .await?;
    Ok(Json(vehicles))
}

pub async fn create_vehicle(
    State(state): State<AppState>,
    Json(payload): Json<CreateVehicleRequest>,
) -> AppResult<Json<vehicle::Model>> {
    let new_vehicle = vehicle::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(validate_name(&payload.name)?),
        category: Set(payload.category),
        hourly_rate: Set(validate_rate(payload.hourly_rate)?),
        availability_status: Set(payload.availability_status.unwrap_or(true)),
        seats: Set(payload.seats),
        transmission: Set(payload.transmission),
        fuel: Set(payload.fuel),
        engine_size: Set(payload.engine_size),
        image_url: Set(payload.image_url),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    };

    let vehicle = new_vehicle.insert(&*state.db).await?;
    tracing::info!(vehicle_id = %vehicle.id, name = %vehicle.name, "Vehicle created");

    Ok(Json(vehicle))
}

pub async fn update_vehicle(
    State(state): State<AppState>,
    Path(vehicle_id): Path<Uuid>,
    Json(payload): Json<UpdateVehicleRequest>,
) -> AppResult<Json<vehicle::Model>> {
    let vehicle = find_vehicle(&state, vehicle_id).await?;
    let updated = apply_vehicle_update(vehicle, payload)?.update(&*state.db).await?;
    Ok(Json(updated))
}

/// Bookings that reference the vehicle are kept and show a placeholder name.
pub async fn delete_vehicle(
    State(state): State<AppState>,
    Path(vehicle_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let result = vehicle::Entity::delete_by_id(vehicle_id)
        .exec(&*state.db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Vehicle not found".to_string()));
    }

    tracing::info!(vehicle_id = %vehicle_id, "Vehicle deleted");
    Ok(Json(serde_json::json!({ "message": "Vehicle deleted" })))
}

pub async fn set_vehicle_availability(
    State(state): State<AppState>,
    Path(vehicle_id): Path<Uuid>,
    Json(payload): Json<SetAvailabilityRequest>,
) -> AppResult<Json<vehicle::Model>> {
    let update = UpdateVehicleRequest {
        availability_status: Some(payload.availability_status),
        ..Default::default()
    };
    let vehicle = find_vehicle(&state, vehicle_id).await?;
    let updated = apply_vehicle_update(vehicle, update)?.update(&*state.db).await?;
    Ok(Json(updated))
}

// ============ User Management ============

#[derive(Debug, Deserialize)]
pub struct UserFilter {
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct PromoteRequest {
    pub email: String,
}

async fn set_role(
    state: &AppState,
    admin: &Claims,
    user: user::Model,
    role: UserRole,
) -> AppResult<UserInfo> {
    if user.id == admin.sub && role != UserRole::Admin {
        return Err(AppError::BadRequest(
            "You cannot remove your own admin role".to_string(),
        ));
    }

    let previous = user.role;
    let mut active: user::ActiveModel = user.into();
    active.role = Set(role);
    active.updated_at = Set(Some(Utc::now().into()));
    let updated = active.update(&*state.db).await?;

    tracing::info!(
        user_id = %updated.id,
        by = %admin.sub,
        from = ?previous,
        to = ?updated.role,
        "User role changed"
    );
    Ok(updated.into())
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> AppResult<Json<Vec<UserInfo>>> {
    let mut query = user::Entity::find().order_by_desc(user::Column::CreatedAt);
    if let Some(role) = filter.role {
        query = query.filter(user::Column::Role.eq(role));
    }

    let users = query.all(&*state.db).await?;
    Ok(Json(users.into_iter().map(UserInfo::from).collect()))
}

pub async fn update_user_role(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> AppResult<Json<UserInfo>> {
    let user = user::Entity::find_by_id(user_id)
        .one(&*state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(set_role(&state, &claims, user, payload.role).await?))
}

pub async fn promote_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PromoteRequest>,
) -> AppResult<Json<UserInfo>> {
    let email = payload.email.trim().to_lowercase();
    let user = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&*state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No account registered for {}", email)))?;

    Ok(Json(set_role(&state, &claims, user, UserRole::Admin).await?))
}

// ============ Bookings Management ============

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

pub async fn list_all_bookings(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<BookingResponse>>> {
    let bookings = booking_records::list_all(&*state.db).await?;
    Ok(Json(with_vehicles(&*state.db, bookings).await?))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let booking = booking_records::require(&*state.db, booking_id).await?;
    Ok(Json(with_vehicle(&*state.db, booking).await?))
}

pub async fn update_booking_status(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<BookingResponse>> {
    let booking =
        booking_records::update_status(&*state.db, booking_id, payload.status, Utc::now()).await?;
    Ok(Json(with_vehicle(&*state.db, booking).await?))
}

// ============ Dashboard ============

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub range: Option<TimeRange>,
}

pub async fn overview(State(state): State<AppState>) -> AppResult<Json<Overview>> {
    let vehicles = vehicle::Entity::find().all(&*state.db).await?;
    let bookings = booking_records::list_all(&*state.db).await?;
    let total_users = user::Entity::find().count(&*state.db).await?;

    Ok(Json(analytics::overview(&vehicles, &bookings, total_users)))
}

pub async fn analytics_report(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsQuery>,
) -> AppResult<Json<Analytics>> {
    let vehicles = vehicle::Entity::find().all(&*state.db).await?;
    let bookings = booking_records::list_all(&*state.db).await?;

    Ok(Json(analytics::analytics(
        &bookings,
        &vehicles,
        params.range.unwrap_or_default(),
        Utc::now(),
    )))
}
