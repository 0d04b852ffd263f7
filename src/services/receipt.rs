use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::entities::booking::{self, PaymentStatus};
use crate::services::pricing::with_tax;
use crate::services::window::BookingWindow;

#[derive(Debug, Serialize)]
pub struct Receipt {
    pub receipt_number: String,
    pub booking_id: Uuid,
    pub payment_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub vehicle_name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_hours: i64,
    pub amount: Decimal,
    pub tax: Decimal,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub payment_date: Option<DateTime<Utc>>,
    pub issued_at: DateTime<Utc>,
    pub company_name: String,
}

pub fn receipt(
    booking: &booking::Model,
    vehicle_name: &str,
    company_name: &str,
    now: DateTime<Utc>,
) -> Receipt {
    let window = BookingWindow::of(booking);
    let breakdown = with_tax(booking.total_price);

    Receipt {
        receipt_number: format!("RCPT-{}", now.timestamp_millis()),
        booking_id: booking.id,
        payment_id: booking.payment_id.clone().unwrap_or_else(|| "N/A".to_string()),
        customer_name: booking.customer_name.clone(),
        customer_email: booking.customer_email.clone(),
        vehicle_name: vehicle_name.to_string(),
        start_date: window.start(),
        end_date: window.end(),
        duration_hours: window.hours(),
        amount: breakdown.subtotal,
        tax: breakdown.tax,
        total_amount: breakdown.total,
        payment_status: booking.payment_status,
        payment_date: booking.payment_date.map(|d| d.with_timezone(&Utc)),
        issued_at: now,
        company_name: company_name.to_string(),
    }
}
