//! Guarded cancel and reschedule transitions.
//!
//! ```text
//! pending   --cancel-->     cancelled
//! confirmed --cancel-->     cancelled
//! pending   --reschedule--> pending
//! confirmed --reschedule--> pending
//! cancelled --*-->          error
//! started   --*-->          error
//! ```

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::error::{AppError, AppResult};
use crate::services::availability;
use crate::services::booking_records;
use crate::services::pricing::{ensure_storable, reprice};
use crate::services::window::BookingWindow;
use crate::utils::jwt::Claims;

fn has_started(booking: &booking::Model, now: DateTime<Utc>) -> bool {
    now >= booking.start_date.with_timezone(&Utc)
}

fn authorize(session: &Claims, booking: &booking::Model) -> AppResult<()> {
    if !session.can_act_for(booking.user_id) {
        return Err(AppError::Forbidden(
            "You can only manage your own bookings".to_string(),
        ));
    }
    Ok(())
}

pub fn ensure_cancellable(booking: &booking::Model, now: DateTime<Utc>) -> AppResult<()> {
    if booking.status == BookingStatus::Cancelled {
        return Err(AppError::InvalidState(
            "Booking is already cancelled".to_string(),
        ));
    }
    if has_started(booking, now) {
        return Err(AppError::InvalidState(
            "Cannot cancel a booking that has already started".to_string(),
        ));
    }
    Ok(())
}

pub fn ensure_reschedulable(booking: &booking::Model, now: DateTime<Utc>) -> AppResult<()> {
    if booking.status == BookingStatus::Cancelled {
        return Err(AppError::InvalidState(
            "Cannot reschedule a cancelled booking".to_string(),
        ));
    }
    if has_started(booking, now) {
        return Err(AppError::InvalidState(
            "Cannot reschedule a booking that has already started".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_new_window(
    new_start: DateTime<Utc>,
    new_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AppResult<BookingWindow> {
    let window = BookingWindow::new(new_start, new_end)?;
    if window.start() < now {
        return Err(AppError::BadRequest(
            "New start date cannot be in the past".to_string(),
        ));
    }
    Ok(window)
}

pub fn cancellation(booking: booking::Model, now: DateTime<Utc>) -> AppResult<booking::ActiveModel> {
    ensure_cancellable(&booking, now)?;

    let mut active: booking::ActiveModel = booking.into();
    active.status = Set(BookingStatus::Cancelled);
    active.cancelled_at = Set(Some(now.into()));
    active.updated_at = Set(Some(now.into()));
    Ok(active)
}

/// New dates, a price at the originally charged hourly rate, and a reset
/// to `pending` so the booking goes back through confirmation.
pub fn rescheduling(
    booking: booking::Model,
    window: &BookingWindow,
    now: DateTime<Utc>,
) -> AppResult<booking::ActiveModel> {
    let new_price = ensure_storable(reprice(
        booking.total_price,
        &BookingWindow::of(&booking),
        window,
    ))?;

    let mut active: booking::ActiveModel = booking.into();
    active.start_date = Set(window.start().into());
    active.end_date = Set(window.end().into());
    active.total_price = Set(new_price);
    active.status = Set(BookingStatus::Pending);
    active.rescheduled_at = Set(Some(now.into()));
    active.updated_at = Set(Some(now.into()));
    Ok(active)
}

pub async fn cancel<C: ConnectionTrait>(
    db: &C,
    session: &Claims,
    booking_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<booking::Model> {
    let booking = booking_records::require(db, booking_id).await?;
    authorize(session, &booking)?;

    let updated = cancellation(booking, now)?.update(db).await?;

    tracing::info!(booking_id = %booking_id, by = %session.sub, "Booking cancelled");
    Ok(updated)
}

pub async fn reschedule<C: ConnectionTrait>(
    db: &C,
    session: &Claims,
    booking_id: Uuid,
    new_start: DateTime<Utc>,
    new_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AppResult<booking::Model> {
    let booking = booking_records::require(db, booking_id).await?;
    authorize(session, &booking)?;
    ensure_reschedulable(&booking, now)?;
    let window = validate_new_window(new_start, new_end, now)?;

    // The booking's own current slot must not count against its new one.
    let available =
        availability::is_available_excluding(db, booking.vehicle_id, &window, Some(booking.id))
            .await?;
    if !available {
        return Err(AppError::Conflict(
            "Vehicle is not available for the selected dates".to_string(),
        ));
    }

    let previous_price = booking.total_price;
    let updated = rescheduling(booking, &window, now)?.update(db).await?;

    tracing::info!(
        booking_id = %booking_id,
        by = %session.sub,
        previous_price = %previous_price,
        new_price = %updated.total_price,
        "Booking rescheduled"
    );
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::UserRole;
    use crate::services::test_support::{booking_at, hours_from_now, session_for};
    use chrono::Duration;
    use rust_decimal::Decimal;
    use sea_orm::prelude::DateTimeWithTimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[test]
    fn test_cancel_pending_future_booking() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Pending);
        let now = Utc::now();
        let stamp: DateTimeWithTimeZone = now.into();
        let active = cancellation(booking, now).unwrap();

        assert_eq!(active.status, Set(BookingStatus::Cancelled));
        assert_eq!(active.cancelled_at, Set(Some(stamp)));
    }

    #[test]
    fn test_cancel_confirmed_future_booking() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Confirmed);
        assert!(cancellation(booking, Utc::now()).is_ok());
    }

    #[test]
    fn test_cancel_twice_is_rejected() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Cancelled);
        let err = cancellation(booking, Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Booking is already cancelled");
    }

    #[test]
    fn test_cannot_cancel_started_booking() {
        let booking = booking_at(hours_from_now(-1), hours_from_now(2), BookingStatus::Confirmed);
        let err = cancellation(booking, Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Cannot cancel a booking that has already started");
    }

    #[test]
    fn test_start_instant_counts_as_started() {
        let start = hours_from_now(24);
        let booking = booking_at(start, start + Duration::hours(2), BookingStatus::Pending);
        assert!(ensure_cancellable(&booking, start).is_err());
        assert!(ensure_reschedulable(&booking, start).is_err());
        assert!(ensure_cancellable(&booking, start - Duration::seconds(1)).is_ok());
    }

    #[test]
    fn test_reschedule_past_booking_rejected_for_any_dates() {
        let booking = booking_at(hours_from_now(-3), hours_from_now(-1), BookingStatus::Confirmed);
        let err = ensure_reschedulable(&booking, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[test]
    fn test_reschedule_cancelled_rejected() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Cancelled);
        let err = ensure_reschedulable(&booking, Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Cannot reschedule a cancelled booking");
    }

    #[test]
    fn test_new_window_validation() {
        let now = Utc::now();
        assert_eq!(
            validate_new_window(hours_from_now(5), hours_from_now(5), now)
                .unwrap_err()
                .to_string(),
            "End date must be after start date"
        );
        assert_eq!(
            validate_new_window(now - Duration::hours(1), now + Duration::hours(1), now)
                .unwrap_err()
                .to_string(),
            "New start date cannot be in the past"
        );
    }

    #[test]
    fn test_reschedule_keeps_rate_and_demotes_to_pending() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Confirmed);
        assert_eq!(booking.total_price, Decimal::from(300));

        let window = BookingWindow::new(hours_from_now(48), hours_from_now(53)).unwrap();
        let active = rescheduling(booking, &window, Utc::now()).unwrap();

        assert_eq!(active.total_price, Set(Decimal::from(500)));
        assert_eq!(active.status, Set(BookingStatus::Pending));
        let new_start: DateTimeWithTimeZone = window.start().into();
        assert_eq!(active.start_date, Set(new_start));
    }

    #[test]
    fn test_reschedule_to_unstorable_price_rejected() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Pending);
        let start = hours_from_now(48);
        let window = BookingWindow::new(start, start + Duration::hours(100_000_000)).unwrap();

        let err = rescheduling(booking, &window, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_cancel_already_cancelled_never_writes() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Cancelled);
        let session = session_for(booking.user_id, UserRole::Customer);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![booking.clone()]])
            .into_connection();

        let err = cancel(&db, &session, booking.id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(db.into_transaction_log().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_other_users_booking_forbidden() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Pending);
        let stranger = session_for(Uuid::new_v4(), UserRole::Customer);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![booking.clone()]])
            .into_connection();

        let err = cancel(&db, &stranger, booking.id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_admin_can_cancel_any_booking() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Pending);
        let mut cancelled = booking.clone();
        cancelled.status = BookingStatus::Cancelled;

        let admin = session_for(Uuid::new_v4(), UserRole::Admin);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![booking.clone()]])
            .append_query_results([vec![cancelled]])
            .into_connection();

        let updated = cancel(&db, &admin, booking.id, Utc::now()).await.unwrap();
        assert_eq!(updated.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_reschedule_checks_availability_without_own_slot() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Confirmed);
        let session = session_for(booking.user_id, UserRole::Customer);
        let mut moved = booking.clone();
        moved.start_date = hours_from_now(25).into();
        moved.end_date = hours_from_now(30).into();
        moved.total_price = Decimal::from(500);
        moved.status = BookingStatus::Pending;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![booking.clone()]])
            .append_query_results([Vec::<booking::Model>::new()])
            .append_query_results([vec![moved]])
            .into_connection();

        // Overlaps the booking's current slot, which must not block it.
        let updated = reschedule(
            &db,
            &session,
            booking.id,
            hours_from_now(25),
            hours_from_now(30),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(updated.status, BookingStatus::Pending);
        assert_eq!(updated.total_price, Decimal::from(500));

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 3);
        let conflict_sql = format!("{:?}", log[1]).replace("\\\"", "\"");
        assert!(conflict_sql.contains(r#""id" <>"#));
    }

    #[tokio::test]
    async fn test_reschedule_into_taken_window_conflicts() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Pending);
        let other = booking_at(hours_from_now(48), hours_from_now(50), BookingStatus::Confirmed);
        let session = session_for(booking.user_id, UserRole::Customer);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![booking.clone()]])
            .append_query_results([vec![other]])
            .into_connection();

        let err = reschedule(
            &db,
            &session,
            booking.id,
            hours_from_now(49),
            hours_from_now(52),
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(db.into_transaction_log().len(), 2);
    }
}
