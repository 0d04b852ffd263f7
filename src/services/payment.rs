//! Two-phase checkout against a hosted payment widget.
//!
//! `initiate` builds everything the widget needs to open; the client then
//! reports the widget's outcome and `reconcile` records it. The gateway's
//! signature is not verified server-side, so a reported success is trusted.

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CheckoutConfig;
use crate::entities::booking::{self, BookingStatus, PaymentStatus};
use crate::error::{AppError, AppResult};
use crate::services::booking_records;
use crate::services::pricing::{to_minor_units, with_tax};
use crate::utils::jwt::Claims;

const REFERENCE_LEN: usize = 14;

/// How a payment outcome moves the booking: a paid booking is always a
/// confirmed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentTransition {
    pub payment_status: PaymentStatus,
    pub status: Option<BookingStatus>,
}

impl PaymentTransition {
    pub fn for_status(payment_status: PaymentStatus) -> Self {
        Self {
            payment_status,
            status: (payment_status == PaymentStatus::Paid).then_some(BookingStatus::Confirmed),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutPrefill {
    pub name: String,
    pub email: String,
    pub contact: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutNotes {
    pub booking_id: Uuid,
    pub vehicle_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Pending checkout handle returned to the client.
#[derive(Debug, Serialize)]
pub struct CheckoutSession {
    pub reference: String,
    pub booking_id: Uuid,
    pub key_id: String,
    pub merchant_name: String,
    pub currency: String,
    pub description: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    /// `total` in the currency's smallest unit.
    pub amount_minor: i64,
    pub prefill: CheckoutPrefill,
    pub notes: CheckoutNotes,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Succeeded { transaction_id: String },
    Failed { description: String },
}

fn new_reference() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFERENCE_LEN)
        .map(char::from)
        .collect();
    format!("chk_{}", suffix)
}

/// Cancelled bookings stay cancelled and a booking is charged at most once.
pub fn ensure_payable(booking: &booking::Model) -> AppResult<()> {
    if booking.status == BookingStatus::Cancelled {
        return Err(AppError::Payment(
            "Cannot pay for a cancelled booking".to_string(),
        ));
    }
    if booking.payment_status == PaymentStatus::Paid {
        return Err(AppError::Payment("Booking is already paid".to_string()));
    }
    Ok(())
}

/// Whether `reference` has the shape `initiate` hands out.
fn is_checkout_reference(reference: &str) -> bool {
    reference.strip_prefix("chk_").is_some_and(|suffix| {
        suffix.len() == REFERENCE_LEN && suffix.chars().all(|c| c.is_ascii_alphanumeric())
    })
}

pub fn initiate(
    booking: &booking::Model,
    vehicle_name: &str,
    session: &Claims,
    config: &CheckoutConfig,
) -> AppResult<CheckoutSession> {
    if booking.total_price <= Decimal::ZERO {
        return Err(AppError::Payment("Invalid booking information".to_string()));
    }
    if session.email.trim().is_empty() {
        return Err(AppError::Payment("User information required".to_string()));
    }
    ensure_payable(booking)?;

    let breakdown = with_tax(booking.total_price);

    Ok(CheckoutSession {
        reference: new_reference(),
        booking_id: booking.id,
        key_id: config.key_id.clone(),
        merchant_name: config.business_name.clone(),
        currency: config.currency.clone(),
        description: format!("Booking for {}", vehicle_name),
        subtotal: breakdown.subtotal,
        tax: breakdown.tax,
        total: breakdown.total,
        amount_minor: to_minor_units(breakdown.total)?,
        prefill: CheckoutPrefill {
            name: session.name.clone(),
            email: session.email.clone(),
            contact: booking.customer_phone.clone(),
        },
        notes: CheckoutNotes {
            booking_id: booking.id,
            vehicle_id: booking.vehicle_id,
            start_date: booking.start_date.with_timezone(&Utc),
            end_date: booking.end_date.with_timezone(&Utc),
        },
    })
}

/// Record a gateway-confirmed charge: `paid` and `confirmed` in one write.
pub async fn mark_paid<C: ConnectionTrait>(
    db: &C,
    booking_id: Uuid,
    transaction_id: &str,
    now: DateTime<Utc>,
) -> AppResult<booking::Model> {
    let booking = booking_records::require(db, booking_id).await?;
    settle(db, booking, transaction_id, now).await
}

async fn settle<C: ConnectionTrait>(
    db: &C,
    booking: booking::Model,
    transaction_id: &str,
    now: DateTime<Utc>,
) -> AppResult<booking::Model> {
    let booking_id = booking.id;
    match booking_records::record_payment(db, booking, transaction_id, PaymentStatus::Paid, now)
        .await
    {
        Ok(booking) => Ok(booking),
        Err(err) => {
            // The gateway already holds the money at this point.
            tracing::error!(
                booking_id = %booking_id,
                transaction_id = transaction_id,
                error = %err,
                "Payment collected but booking not updated"
            );
            Err(err)
        }
    }
}

pub async fn reconcile<C: ConnectionTrait>(
    db: &C,
    booking_id: Uuid,
    reference: &str,
    outcome: PaymentOutcome,
    now: DateTime<Utc>,
) -> AppResult<booking::Model> {
    match outcome {
        PaymentOutcome::Succeeded { transaction_id } => {
            if transaction_id.trim().is_empty() {
                return Err(AppError::Payment(
                    "Missing transaction id".to_string(),
                ));
            }
            if !is_checkout_reference(reference) {
                return Err(AppError::Payment(
                    "Unknown checkout reference".to_string(),
                ));
            }

            let booking = booking_records::require(db, booking_id).await?;
            if let Err(err) = ensure_payable(&booking) {
                tracing::warn!(
                    booking_id = %booking_id,
                    reference = reference,
                    transaction_id = %transaction_id,
                    status = booking.status.as_str(),
                    payment_status = ?booking.payment_status,
                    "Checkout success reported for a booking that cannot be paid"
                );
                return Err(err);
            }

            tracing::info!(
                booking_id = %booking_id,
                reference = reference,
                transaction_id = %transaction_id,
                "Checkout reported success"
            );
            settle(db, booking, &transaction_id, now).await
        }
        PaymentOutcome::Failed { description } => {
            tracing::warn!(
                booking_id = %booking_id,
                reference = reference,
                description = %description,
                "Checkout reported failure"
            );
            Err(AppError::Payment(format!("Payment failed: {}", description)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::UserRole;
    use crate::services::test_support::{booking_at, hours_from_now, session_for};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[test]
    fn test_paid_implies_confirmed() {
        let transition = PaymentTransition::for_status(PaymentStatus::Paid);
        assert_eq!(transition.status, Some(BookingStatus::Confirmed));

        assert_eq!(PaymentTransition::for_status(PaymentStatus::Pending).status, None);
        assert_eq!(PaymentTransition::for_status(PaymentStatus::Refunded).status, None);
    }

    #[test]
    fn test_checkout_amount_includes_tax_but_booking_does_not() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Pending);
        let session = session_for(booking.user_id, UserRole::Customer);
        let checkout = initiate(&booking, "Toyota Camry", &session, &CheckoutConfig::default()).unwrap();

        assert_eq!(checkout.subtotal, Decimal::from(300));
        assert_eq!(checkout.tax, Decimal::from(54));
        assert_eq!(checkout.total, Decimal::from(354));
        assert_eq!(checkout.amount_minor, 35400);
        assert_eq!(checkout.currency, "INR");
        assert_eq!(checkout.description, "Booking for Toyota Camry");
        assert!(checkout.reference.starts_with("chk_"));
        assert_eq!(checkout.reference.len(), 4 + REFERENCE_LEN);
        assert_eq!(booking.total_price, Decimal::from(300));
    }

    #[test]
    fn test_cannot_initiate_for_cancelled_or_paid() {
        let cancelled = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Cancelled);
        let session = session_for(cancelled.user_id, UserRole::Customer);
        assert!(matches!(
            initiate(&cancelled, "Bike", &session, &CheckoutConfig::default()),
            Err(AppError::Payment(_))
        ));

        let mut paid = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Confirmed);
        paid.payment_status = PaymentStatus::Paid;
        assert!(matches!(
            initiate(&paid, "Bike", &session, &CheckoutConfig::default()),
            Err(AppError::Payment(_))
        ));
    }

    #[test]
    fn test_missing_user_email_is_payment_error() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Pending);
        let mut session = session_for(booking.user_id, UserRole::Customer);
        session.email = String::new();

        let err = initiate(&booking, "Bike", &session, &CheckoutConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), "User information required");
    }

    #[tokio::test]
    async fn test_mark_paid_confirms_pending_booking() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Pending);
        let mut stored = booking.clone();
        stored.payment_status = PaymentStatus::Paid;
        stored.status = BookingStatus::Confirmed;
        stored.payment_id = Some("pay_9Xk".to_string());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![booking.clone()]])
            .append_query_results([vec![stored]])
            .into_connection();

        let paid = mark_paid(&db, booking.id, "pay_9Xk", Utc::now()).await.unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_failed_outcome_writes_nothing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let err = reconcile(
            &db,
            Uuid::new_v4(),
            "chk_test",
            PaymentOutcome::Failed {
                description: "Card declined".to_string(),
            },
            Utc::now(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "Payment failed: Card declined");
        assert!(db.into_transaction_log().is_empty());
    }

    #[test]
    fn test_outcome_wire_format() {
        let outcome: PaymentOutcome = serde_json::from_str(
            r#"{"outcome":"succeeded","transaction_id":"pay_123"}"#,
        )
        .unwrap();
        assert!(matches!(outcome, PaymentOutcome::Succeeded { transaction_id } if transaction_id == "pay_123"));
    }

    fn reference() -> String {
        "chk_A1b2C3d4E5f6G7".to_string()
    }

    fn succeeded(transaction_id: &str) -> PaymentOutcome {
        PaymentOutcome::Succeeded {
            transaction_id: transaction_id.to_string(),
        }
    }

    #[test]
    fn test_reference_shape() {
        assert!(is_checkout_reference(&reference()));
        assert!(is_checkout_reference(&new_reference()));
        assert!(!is_checkout_reference("chk_never_issued"));
        assert!(!is_checkout_reference("A1b2C3d4E5f6G7ab"));
    }

    #[tokio::test]
    async fn test_success_for_cancelled_booking_is_rejected_without_update() {
        let cancelled = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Cancelled);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![cancelled.clone()]])
            .into_connection();

        let err = reconcile(&db, cancelled.id, &reference(), succeeded("pay_x"), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot pay for a cancelled booking");

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);
        assert!(!format!("{:?}", log[0]).contains("UPDATE"));
    }

    #[tokio::test]
    async fn test_success_for_already_paid_booking_is_rejected() {
        let mut paid = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Confirmed);
        paid.payment_status = PaymentStatus::Paid;
        paid.payment_id = Some("pay_first".to_string());
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![paid.clone()]])
            .into_connection();

        let err = reconcile(&db, paid.id, &reference(), succeeded("pay_second"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Payment(_)));

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);
        assert!(!format!("{:?}", log[0]).contains("UPDATE"));
    }

    #[tokio::test]
    async fn test_unissued_reference_touches_nothing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let err = reconcile(&db, Uuid::new_v4(), "chk_never_issued", succeeded("pay_x"), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown checkout reference");
        assert!(db.into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn test_success_for_pending_booking_marks_paid() {
        let booking = booking_at(hours_from_now(24), hours_from_now(27), BookingStatus::Pending);
        let mut stored = booking.clone();
        stored.payment_status = PaymentStatus::Paid;
        stored.status = BookingStatus::Confirmed;
        stored.payment_id = Some("pay_ok".to_string());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![booking.clone()]])
            .append_query_results([vec![stored]])
            .into_connection();

        let paid = reconcile(&db, booking.id, &reference(), succeeded("pay_ok"), Utc::now())
            .await
            .unwrap();
        assert_eq!(paid.status, BookingStatus::Confirmed);
        assert_eq!(paid.payment_status, PaymentStatus::Paid);

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 2);
        assert!(format!("{:?}", log[1]).contains("UPDATE"));
    }
}
