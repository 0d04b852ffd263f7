use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::services::window::BookingWindow;

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

/// Flat tax applied at checkout, never stored on the booking.
pub const TAX_RATE: Decimal = Decimal::from_parts(18, 0, 0, false, 2);

/// Billable hours between `start` and `end`: partial hours round up and
/// anything shorter than an hour still bills one.
pub fn compute_duration(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let millis = (end - start).num_milliseconds();
    let hours = if millis > 0 {
        (millis + MILLIS_PER_HOUR - 1) / MILLIS_PER_HOUR
    } else {
        0
    };
    hours.max(1)
}

/// Largest amount the `numeric(12,2)` price column holds: 9,999,999,999.99.
pub const MAX_PRICE: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

pub fn compute_price(start: DateTime<Utc>, end: DateTime<Utc>, hourly_rate: Decimal) -> Decimal {
    Decimal::from(compute_duration(start, end)) * hourly_rate
}

/// Reject prices the booking table cannot store.
pub fn ensure_storable(price: Decimal) -> AppResult<Decimal> {
    if price > MAX_PRICE {
        return Err(AppError::BadRequest(
            "Booking total exceeds the maximum allowed amount".to_string(),
        ));
    }
    Ok(price)
}

fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaxBreakdown {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

pub fn with_tax(subtotal: Decimal) -> TaxBreakdown {
    let tax = round_money(subtotal * TAX_RATE);
    TaxBreakdown {
        subtotal,
        tax,
        total: subtotal + tax,
    }
}

/// The hourly rate a booking was actually priced at.
pub fn effective_hourly_rate(total_price: Decimal, window: &BookingWindow) -> Decimal {
    total_price / Decimal::from(window.hours())
}

/// Price a new window at the rate the booking was originally charged,
/// ignoring whatever the vehicle costs today.
pub fn reprice(total_price: Decimal, old: &BookingWindow, new: &BookingWindow) -> Decimal {
    round_money(effective_hourly_rate(total_price, old) * Decimal::from(new.hours()))
}

/// Amount in the currency's smallest unit (paise for INR).
pub fn to_minor_units(amount: Decimal) -> AppResult<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| AppError::Payment(format!("Amount {} is out of range", amount)))
}

#[derive(Debug, Serialize)]
pub struct Quote {
    pub duration_hours: i64,
    pub hourly_rate: Decimal,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

pub fn quote(window: &BookingWindow, hourly_rate: Decimal) -> Quote {
    let breakdown = with_tax(compute_price(window.start(), window.end(), hourly_rate));
    Quote {
        duration_hours: window.hours(),
        hourly_rate,
        subtotal: breakdown.subtotal,
        tax: breakdown.tax,
        total: breakdown.total,
    }
}
