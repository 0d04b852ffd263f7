use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus, PaymentStatus};
use crate::entities::vehicle;
use crate::error::{AppError, AppResult};
use crate::services::payment::PaymentTransition;
use crate::services::pricing::{compute_price, ensure_storable};
use crate::services::window::BookingWindow;

/// Contact details captured at booking time. Later profile edits do not
/// touch bookings that already exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub vehicle_id: Uuid,
    pub user_id: Uuid,
    pub window: BookingWindow,
    pub customer: CustomerDetails,
    pub pickup_city: String,
}

/// Build the row for a new booking priced at the vehicle's current rate.
pub fn new_booking_model(
    vehicle: &vehicle::Model,
    new: &NewBooking,
    now: DateTime<Utc>,
) -> AppResult<booking::ActiveModel> {
    let total_price = ensure_storable(compute_price(
        new.window.start(),
        new.window.end(),
        vehicle.hourly_rate,
    ))?;

    Ok(booking::ActiveModel {
        id: Set(Uuid::new_v4()),
        vehicle_id: Set(vehicle.id),
        user_id: Set(new.user_id),
        start_date: Set(new.window.start().into()),
        end_date: Set(new.window.end().into()),
        total_price: Set(total_price),
        status: Set(BookingStatus::Pending),
        payment_status: Set(PaymentStatus::Pending),
        payment_id: Set(None),
        payment_date: Set(None),
        customer_name: Set(new.customer.name.clone()),
        customer_email: Set(new.customer.email.clone()),
        customer_phone: Set(new.customer.phone.clone()),
        pickup_city: Set(new.pickup_city.clone()),
        created_at: Set(now.into()),
        updated_at: Set(Some(now.into())),
        cancelled_at: Set(None),
        rescheduled_at: Set(None),
    })
}

/// Persist a pending booking. Availability is the caller's job; running the
/// check and this insert back to back is not atomic.
pub async fn create<C: ConnectionTrait>(
    db: &C,
    new: NewBooking,
    now: DateTime<Utc>,
) -> AppResult<booking::Model> {
    let vehicle = vehicle::Entity::find_by_id(new.vehicle_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))?;

    create_for_vehicle(db, &vehicle, new, now).await
}

pub async fn create_for_vehicle<C: ConnectionTrait>(
    db: &C,
    vehicle: &vehicle::Model,
    new: NewBooking,
    now: DateTime<Utc>,
) -> AppResult<booking::Model> {
    let booking = new_booking_model(vehicle, &new, now)?.insert(db).await?;

    tracing::info!(
        booking_id = %booking.id,
        vehicle_id = %booking.vehicle_id,
        user_id = %booking.user_id,
        total_price = %booking.total_price,
        "Booking created"
    );

    Ok(booking)
}

pub async fn get_by_id<C: ConnectionTrait>(
    db: &C,
    booking_id: Uuid,
) -> AppResult<Option<booking::Model>> {
    Ok(booking::Entity::find_by_id(booking_id).one(db).await?)
}

pub async fn require<C: ConnectionTrait>(db: &C, booking_id: Uuid) -> AppResult<booking::Model> {
    get_by_id(db, booking_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

/// Newest first.
pub async fn list_by_user<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
) -> AppResult<Vec<booking::Model>> {
    Ok(booking::Entity::find()
        .filter(booking::Column::UserId.eq(user_id))
        .order_by_desc(booking::Column::CreatedAt)
        .all(db)
        .await?)
}

/// Newest first.
pub async fn list_all<C: ConnectionTrait>(db: &C) -> AppResult<Vec<booking::Model>> {
    Ok(booking::Entity::find()
        .order_by_desc(booking::Column::CreatedAt)
        .all(db)
        .await?)
}

/// Overwrite the status with no transition checks (admin back-office).
pub async fn update_status<C: ConnectionTrait>(
    db: &C,
    booking_id: Uuid,
    status: BookingStatus,
    now: DateTime<Utc>,
) -> AppResult<booking::Model> {
    let booking = require(db, booking_id).await?;
    let previous = booking.status;

    let mut active: booking::ActiveModel = booking.into();
    active.status = Set(status);
    active.updated_at = Set(Some(now.into()));
    let updated = active.update(db).await?;

    tracing::info!(
        booking_id = %booking_id,
        from = previous.as_str(),
        to = status.as_str(),
        "Booking status overwritten"
    );

    Ok(updated)
}

/// Changes for recording a payment outcome. Payment and booking status are
/// decided together so they land in the same UPDATE.
pub fn payment_update(
    booking: booking::Model,
    payment_id: &str,
    payment_status: PaymentStatus,
    now: DateTime<Utc>,
) -> booking::ActiveModel {
    let transition = PaymentTransition::for_status(payment_status);

    let mut active: booking::ActiveModel = booking.into();
    active.payment_status = Set(transition.payment_status);
    if let Some(status) = transition.status {
        active.status = Set(status);
    }
    active.payment_id = Set(Some(payment_id.to_string()));
    active.payment_date = Set(Some(now.into()));
    active.updated_at = Set(Some(now.into()));
    active
}

pub async fn update_payment_status<C: ConnectionTrait>(
    db: &C,
    booking_id: Uuid,
    payment_id: &str,
    payment_status: PaymentStatus,
    now: DateTime<Utc>,
) -> AppResult<booking::Model> {
    let booking = require(db, booking_id).await?;
    record_payment(db, booking, payment_id, payment_status, now).await
}

/// Write a payment outcome onto an already loaded booking.
pub async fn record_payment<C: ConnectionTrait>(
    db: &C,
    booking: booking::Model,
    payment_id: &str,
    payment_status: PaymentStatus,
    now: DateTime<Utc>,
) -> AppResult<booking::Model> {
    let booking_id = booking.id;
    let updated = payment_update(booking, payment_id, payment_status, now)
        .update(db)
        .await?;

    tracing::info!(
        booking_id = %booking_id,
        payment_id = payment_id,
        payment_status = ?updated.payment_status,
        status = updated.status.as_str(),
        "Payment status updated"
    );

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::vehicle::VehicleCategory;
    use crate::services::test_support::{booking_at, hours_from_now, vehicle};
    use rust_decimal::Decimal;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn request(vehicle_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> NewBooking {
        NewBooking {
            vehicle_id,
            user_id: Uuid::new_v4(),
            window: BookingWindow::new(start, end).unwrap(),
            customer: CustomerDetails {
                name: "Asha Rao".to_string(),
                email: "asha@example.com".to_string(),
                phone: "9876543210".to_string(),
            },
            pickup_city: "Hyderabad".to_string(),
        }
    }

    #[test]
    fn test_new_booking_is_pending_and_priced_by_ceil_hours() {
        let car = vehicle("Toyota Camry", VehicleCategory::Car, 100);
        let start = hours_from_now(24);
        let end = start + chrono::Duration::minutes(150);
        let active = new_booking_model(&car, &request(car.id, start, end), Utc::now()).unwrap();

        assert_eq!(active.total_price, Set(Decimal::from(300)));
        assert_eq!(active.status, Set(BookingStatus::Pending));
        assert_eq!(active.payment_status, Set(PaymentStatus::Pending));
        assert_eq!(active.vehicle_id, Set(car.id));
    }

    #[test]
    fn test_paid_forces_confirmed() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Pending);
        let active = payment_update(booking, "pay_123", PaymentStatus::Paid, Utc::now());

        assert_eq!(active.payment_status, Set(PaymentStatus::Paid));
        assert_eq!(active.status, Set(BookingStatus::Confirmed));
        assert_eq!(active.payment_id, Set(Some("pay_123".to_string())));
    }

    #[test]
    fn test_non_paid_outcome_leaves_status_alone() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Pending);
        let active = payment_update(booking, "pay_123", PaymentStatus::Pending, Utc::now());

        assert_eq!(active.status, sea_orm::ActiveValue::Unchanged(BookingStatus::Pending));
    }

    #[tokio::test]
    async fn test_create_reads_vehicle_then_inserts() {
        let car = vehicle("Honda Civic", VehicleCategory::Car, 100);
        let start = hours_from_now(24);
        let stored = booking_at(start, start + chrono::Duration::hours(3), BookingStatus::Pending);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![car.clone()]])
            .append_query_results([vec![stored.clone()]])
            .into_connection();

        let created = create(&db, request(car.id, start, start + chrono::Duration::hours(3)), Utc::now())
            .await
            .unwrap();
        assert_eq!(created.id, stored.id);
        assert_eq!(db.into_transaction_log().len(), 2);
    }

    #[tokio::test]
    async fn test_create_for_missing_vehicle_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<vehicle::Model>::new()])
            .into_connection();

        let start = hours_from_now(24);
        let err = create(&db, request(Uuid::new_v4(), start, hours_from_now(26)), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(db.into_transaction_log().len(), 1);
    }

    #[tokio::test]
    async fn test_update_payment_status_is_a_single_update() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Pending);
        let mut paid = booking.clone();
        paid.payment_status = PaymentStatus::Paid;
        paid.status = BookingStatus::Confirmed;
        paid.payment_id = Some("pay_123".to_string());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![booking.clone()]])
            .append_query_results([vec![paid]])
            .into_connection();

        let updated = update_payment_status(&db, booking.id, "pay_123", PaymentStatus::Paid, Utc::now())
            .await
            .unwrap();
        assert_eq!(updated.status, BookingStatus::Confirmed);

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 2);
        let update_sql = format!("{:?}", log[1]).replace("\\\"", "\"");
        assert!(update_sql.contains("UPDATE"));
        assert!(update_sql.contains(r#""payment_status" ="#));
        assert!(update_sql.contains(r#"SET "status" ="#));
    }

    #[test]
    fn test_price_beyond_column_range_is_rejected() {
        let car = vehicle("Toyota Camry", VehicleCategory::Car, 100);
        let start = hours_from_now(24);
        let end = start + chrono::Duration::hours(100_000_000);

        let err = new_booking_model(&car, &request(car.id, start, end), Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_create_with_oversized_price_never_inserts() {
        let car = vehicle("Toyota Camry", VehicleCategory::Car, 100);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![car.clone()]])
            .into_connection();

        let start = hours_from_now(24);
        let end = start + chrono::Duration::hours(100_000_000);
        let err = create(&db, request(car.id, start, end), Utc::now()).await.unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(db.into_transaction_log().len(), 1);
    }

    #[tokio::test]
    async fn test_update_payment_status_for_missing_booking() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<booking::Model>::new()])
            .into_connection();

        let err = update_payment_status(&db, Uuid::new_v4(), "pay_1", PaymentStatus::Paid, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Booking not found");
    }
}
