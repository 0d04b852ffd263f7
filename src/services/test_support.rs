//! Fixtures shared by the service tests.

use chrono::{DateTime, Duration, DurationRound, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus, PaymentStatus};
use crate::entities::user::UserRole;
use crate::entities::vehicle::{self, VehicleCategory};
use crate::utils::jwt::Claims;

/// Whole hours from now, truncated so windows line up on hour boundaries.
pub fn hours_from_now(hours: i64) -> DateTime<Utc> {
    let now = Utc::now().duration_trunc(Duration::hours(1)).unwrap();
    now + Duration::hours(hours)
}

pub fn vehicle(name: &str, category: VehicleCategory, hourly_rate: i64) -> vehicle::Model {
    vehicle::Model {
        id: Uuid::new_v4(),
        name: name.to_string(),
        category,
        hourly_rate: Decimal::from(hourly_rate),
        availability_status: true,
        seats: Some(5),
        transmission: Some("Automatic".to_string()),
        fuel: Some("Petrol".to_string()),
        engine_size: None,
        image_url: None,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

/// A booking priced at 100 per hour over the given window.
pub fn booking_at(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    status: BookingStatus,
) -> booking::Model {
    let hours = crate::services::pricing::compute_duration(start, end);
    booking::Model {
        id: Uuid::new_v4(),
        vehicle_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        start_date: start.into(),
        end_date: end.into(),
        total_price: Decimal::from(100 * hours),
        status,
        payment_status: PaymentStatus::Pending,
        payment_id: None,
        payment_date: None,
        customer_name: "Asha Rao".to_string(),
        customer_email: "asha@example.com".to_string(),
        customer_phone: "9876543210".to_string(),
        pickup_city: "Hyderabad".to_string(),
        created_at: Utc::now().into(),
        updated_at: None,
        cancelled_at: None,
        rescheduled_at: None,
    }
}

pub fn session_for(user_id: Uuid, role: UserRole) -> Claims {
    let now = Utc::now();
    Claims {
        sub: user_id,
        email: "asha@example.com".to_string(),
        name: "Asha Rao".to_string(),
        role,
        exp: (now + Duration::hours(1)).timestamp(),
        iat: now.timestamp(),
    }
}
