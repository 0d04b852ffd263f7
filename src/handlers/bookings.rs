use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{booking, vehicle};
use crate::error::{AppError, AppResult};
use crate::handlers::vehicles::find_vehicle;
use crate::services::availability;
use crate::services::booking_records::{self, CustomerDetails, NewBooking};
use crate::services::lifecycle;
use crate::services::receipt::{self, Receipt};
use crate::services::window::BookingWindow;
use crate::utils::jwt::Claims;
use crate::utils::location::served_city;
use crate::AppState;

/// Pickup times this far in the past are still accepted, to absorb slow forms.
const PICKUP_GRACE_MINUTES: i64 = 5;

pub const MISSING_VEHICLE_NAME: &str = "Vehicle unavailable";

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub vehicle_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub pickup_city: String,
    pub customer_phone: String,
    /// Defaults to the account name.
    pub customer_name: Option<String>,
    /// Defaults to the account email.
    pub customer_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    #[serde(flatten)]
    pub booking: booking::Model,
    pub vehicle_name: String,
    pub duration_hours: i64,
}

impl BookingResponse {
    pub fn new(booking: booking::Model, vehicle: Option<&vehicle::Model>) -> Self {
        let vehicle_name = vehicle
            .map(|v| v.name.clone())
            .unwrap_or_else(|| MISSING_VEHICLE_NAME.to_string());
        let duration_hours = BookingWindow::of(&booking).hours();

        Self {
            booking,
            vehicle_name,
            duration_hours,
        }
    }
}

/// Everything the create form must get right before touching storage.
#[derive(Debug)]
struct ValidatedBooking {
    window: BookingWindow,
    customer: CustomerDetails,
    pickup_city: &'static str,
}

fn non_empty(value: Option<String>, fallback: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn validate_create(
    payload: &CreateBookingRequest,
    session: &Claims,
    now: DateTime<Utc>,
) -> AppResult<ValidatedBooking> {
    let window = BookingWindow::new(payload.start_date, payload.end_date)?;

    if window.start() < now - Duration::minutes(PICKUP_GRACE_MINUTES) {
        return Err(AppError::BadRequest(
            "Pickup time cannot be in the past".to_string(),
        ));
    }

    let pickup_city = served_city(&payload.pickup_city).ok_or_else(|| {
        AppError::BadRequest(format!(
            "We don't serve {} yet",
            payload.pickup_city.trim()
        ))
    })?;

    let phone = payload.customer_phone.trim();
    if phone.is_empty() {
        return Err(AppError::BadRequest("Phone number is required".to_string()));
    }

    Ok(ValidatedBooking {
        window,
        customer: CustomerDetails {
            name: non_empty(payload.customer_name.clone(), &session.name),
            email: non_empty(payload.customer_email.clone(), &session.email),
            phone: phone.to_string(),
        },
        pickup_city,
    })
}

fn ensure_can_view(session: &Claims, booking: &booking::Model) -> AppResult<()> {
    if !session.can_act_for(booking.user_id) {
        return Err(AppError::Forbidden(
            "You can only view your own bookings".to_string(),
        ));
    }
    Ok(())
}

/// Resolve vehicle names for a batch of bookings in one query.
pub(crate) async fn with_vehicles<C: ConnectionTrait>(
    db: &C,
    bookings: Vec<booking::Model>,
) -> AppResult<Vec<BookingResponse>> {
    let ids: Vec<Uuid> = bookings.iter().map(|b| b.vehicle_id).collect();
    let vehicles: HashMap<Uuid, vehicle::Model> = vehicle::Entity::find()
        .filter(vehicle::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|v| (v.id, v))
        .collect();

    Ok(bookings
        .into_iter()
        .map(|b| {
            let vehicle = vehicles.get(&b.vehicle_id);
            BookingResponse::new(b, vehicle)
        })
        .collect())
}

pub(crate) async fn with_vehicle<C: ConnectionTrait>(
    db: &C,
    booking: booking::Model,
) -> AppResult<BookingResponse> {
    let vehicle = vehicle::Entity::find_by_id(booking.vehicle_id).one(db).await?;
    Ok(BookingResponse::new(booking, vehicle.as_ref()))
}

pub async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateBookingRequest>,
) -> AppResult<Json<BookingResponse>> {
    let now = Utc::now();
    let validated = validate_create(&payload, &claims, now)?;

    let vehicle = find_vehicle(&state, payload.vehicle_id).await?;
    if !vehicle.availability_status {
        return Err(AppError::BadRequest(
            "This vehicle is not open for booking".to_string(),
        ));
    }

    if !availability::is_available(&*state.db, vehicle.id, &validated.window).await? {
        tracing::warn!(
            vehicle_id = %vehicle.id,
            user_id = %claims.sub,
            "Booking rejected, window already taken"
        );
        return Err(AppError::Conflict(
            "Vehicle is not available for the selected dates".to_string(),
        ));
    }

    let new = NewBooking {
        vehicle_id: vehicle.id,
        user_id: claims.sub,
        window: validated.window,
        customer: validated.customer,
        pickup_city: validated.pickup_city.to_string(),
    };
    let booking = booking_records::create_for_vehicle(&*state.db, &vehicle, new, now).await?;

    Ok(Json(BookingResponse::new(booking, Some(&vehicle))))
}

pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<BookingResponse>>> {
    let bookings = booking_records::list_by_user(&*state.db, claims.sub).await?;
    Ok(Json(with_vehicles(&*state.db, bookings).await?))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let booking = booking_records::require(&*state.db, booking_id).await?;
    ensure_can_view(&claims, &booking)?;
    Ok(Json(with_vehicle(&*state.db, booking).await?))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let booking = lifecycle::cancel(&*state.db, &claims, booking_id, Utc::now()).await?;
    Ok(Json(with_vehicle(&*state.db, booking).await?))
}

pub async fn reschedule_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<RescheduleRequest>,
) -> AppResult<Json<BookingResponse>> {
    let booking = lifecycle::reschedule(
        &*state.db,
        &claims,
        booking_id,
        payload.start_date,
        payload.end_date,
        Utc::now(),
    )
    .await?;
    Ok(Json(with_vehicle(&*state.db, booking).await?))
}

pub async fn booking_receipt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<Receipt>> {
    let booking = booking_records::require(&*state.db, booking_id).await?;
    ensure_can_view(&claims, &booking)?;

    let response = with_vehicle(&*state.db, booking).await?;
    Ok(Json(receipt::receipt(
        &response.booking,
        &response.vehicle_name,
        &state.config.checkout.business_name,
        Utc::now(),
    )))
}
