use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::utils::response::error as error_response;

/// Application error taxonomy. Every operation of the engine returns one of
/// these; handlers convert them to a taxonomy-coded JSON body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Insufficient inventory: {0}")]
    InsufficientInventory(String),

    #[error("Per-user limit exceeded: {0}")]
    PerUserLimitExceeded(String),

    #[error("Sale window closed: {0}")]
    SaleWindowClosed(String),

    #[error("Already checked in: {0}")]
    AlreadyCheckedIn(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state transition: {0}")]
    InvalidState(String),

    #[error("Payment pending: {0}")]
    PaymentPending(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::CapacityExceeded(_)
            | AppError::InsufficientInventory(_)
            | AppError::PerUserLimitExceeded(_)
            | AppError::SaleWindowClosed(_)
            | AppError::AlreadyCheckedIn(_)
            | AppError::Conflict(_)
            | AppError::InvalidState(_) => StatusCode::CONFLICT,
            // Client-correctable per the verify contract: retry later / retry
            // checkout, so these stay in the 4xx range.
            AppError::PaymentPending(_) | AppError::PaymentFailed(_) => StatusCode::BAD_REQUEST,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Auth(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            AppError::InsufficientInventory(_) => "INSUFFICIENT_INVENTORY",
            AppError::PerUserLimitExceeded(_) => "PER_USER_LIMIT_EXCEEDED",
            AppError::SaleWindowClosed(_) => "SALE_WINDOW_CLOSED",
            AppError::AlreadyCheckedIn(_) => "ALREADY_CHECKED_IN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::PaymentPending(_) => "PAYMENT_PENDING",
            AppError::PaymentFailed(_) => "PAYMENT_FAILED",
            AppError::Gateway(_) => "GATEWAY_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// 5xx responses are always safe to retry; 4xx are client-correctable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Gateway(_) | AppError::Database(_) | AppError::Internal(_)
        )
    }

    fn log(&self) {
        match self {
            AppError::Database(e) => {
                error!(error = ?e, "Database error");
            }
            AppError::Gateway(msg) | AppError::Internal(msg) => {
                error!(error = ?self, message = %msg, "Infrastructure error");
            }
            _ => {
                warn!(code = self.code(), error = %self, "Request rejected");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        // Internal details stay in the logs; the client sees a stable code
        // and a high-level message.
        let public_message = match &self {
            AppError::Database(_) => "A database error occurred".to_string(),
            other => other.to_string(),
        };

        error_response(code, public_message, None, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_family_maps_to_409() {
        for err in [
            AppError::CapacityExceeded("c".into()),
            AppError::InsufficientInventory("i".into()),
            AppError::PerUserLimitExceeded("p".into()),
            AppError::SaleWindowClosed("s".into()),
            AppError::AlreadyCheckedIn("a".into()),
            AppError::InvalidState("t".into()),
        ] {
            assert_eq!(err.status_code(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn gateway_failures_are_retryable_5xx() {
        let err = AppError::Gateway("provider unreachable".into());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.is_retryable());
        assert!(!AppError::PaymentFailed("declined".into()).is_retryable());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            AppError::InsufficientInventory("x".into()).code(),
            "INSUFFICIENT_INVENTORY"
        );
        assert_eq!(AppError::PaymentPending("x".into()).code(), "PAYMENT_PENDING");
    }
}
