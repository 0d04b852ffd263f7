use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or out-of-range input, rejected before any write.
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// The requested window collides with an existing reservation, or a unique value is taken.
    #[error("{0}")]
    Conflict(String),

    /// The booking is in a state that does not allow the operation.
    #[error("{0}")]
    InvalidState(String),

    /// Checkout could not start or the gateway reported a failure.
    #[error("{0}")]
    Payment(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::Payment(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            AppError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                "Internal server error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_taxonomy_status_codes() {
        assert_eq!(
            AppError::BadRequest("End date must be after start date".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict("Vehicle is not available for the selected dates".into())
                .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::InvalidState("Booking is already cancelled".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Payment("Payment failed: card declined".into()).status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            AppError::Database(DbErr::Custom("connection reset".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages_are_passed_through() {
        let err = AppError::InvalidState("Cannot reschedule a cancelled booking".into());
        assert_eq!(err.to_string(), "Cannot reschedule a cancelled booking");
    }
}
