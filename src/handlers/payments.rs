use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::handlers::bookings::{with_vehicle, BookingResponse};
use crate::services::booking_records;
use crate::services::payment::{self, CheckoutSession, PaymentOutcome};
use crate::utils::jwt::Claims;
use crate::AppState;

/// What the client reports once the checkout widget closes.
#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub reference: String,
    #[serde(flatten)]
    pub outcome: PaymentOutcome,
}

fn ensure_owner(session: &Claims, user_id: Uuid) -> AppResult<()> {
    if !session.can_act_for(user_id) {
        return Err(AppError::Forbidden(
            "You can only pay for your own bookings".to_string(),
        ));
    }
    Ok(())
}

/// Build the checkout payload for a booking.
pub async fn initiate_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<CheckoutSession>> {
    let booking = booking_records::require(&*state.db, booking_id).await?;
    ensure_owner(&claims, booking.user_id)?;

    let response = with_vehicle(&*state.db, booking).await?;
    let session = payment::initiate(
        &response.booking,
        &response.vehicle_name,
        &claims,
        &state.config.checkout,
    )?;

    tracing::info!(
        booking_id = %booking_id,
        reference = %session.reference,
        amount_minor = session.amount_minor,
        "Checkout initiated"
    );
    Ok(Json(session))
}

/// Record the widget outcome against the booking.
pub async fn confirm_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> AppResult<Json<BookingResponse>> {
    let booking = booking_records::require(&*state.db, booking_id).await?;
    ensure_owner(&claims, booking.user_id)?;

    let updated = payment::reconcile(
        &*state.db,
        booking_id,
        &payload.reference,
        payload.outcome,
        Utc::now(),
    )
    .await?;

    Ok(Json(with_vehicle(&*state.db, updated).await?))
}
