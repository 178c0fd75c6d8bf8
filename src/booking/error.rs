use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::booking::payment::PaymentError;
use crate::engine::{CouponRejection, EngineError, StepError, WizardStep};

/// Error types for booking operations
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    InvalidStep(#[from] StepError),

    #[error("Booking is at the {0} step, not payment")]
    NotReady(WizardStep),

    #[error("{0}")]
    CouponRejected(#[from] CouponRejection),

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Could not save reservation: {0}")]
    Persistence(String),

    /// Reservation row exists but some selection lines were not written
    #[error("Reservation {reservation_id} was saved without all of its selections")]
    PartialWrite { reservation_id: Uuid },

    #[error("{0} not found")]
    NotFound(String),
}

impl From<EngineError> for BookingError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ProductNotFound(id) => BookingError::NotFound(format!("Product {}", id)),
            EngineError::DateNotSelected => BookingError::InvalidStep(StepError::DateNotSelected),
            EngineError::SessionNotLoaded => BookingError::InvalidStep(StepError::SessionNotLoaded),
            EngineError::InvalidRecord(msg) => BookingError::ValidationError(msg),
            other => BookingError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<PaymentError> for BookingError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Declined(msg) => BookingError::PaymentDeclined(msg),
            other => BookingError::PaymentFailed(other.to_string()),
        }
    }
}

impl BookingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::ValidationError(_)
            | BookingError::InvalidStep(_)
            | BookingError::NotReady(_)
            | BookingError::CouponRejected(_) => StatusCode::BAD_REQUEST,
            BookingError::PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,
            BookingError::PaymentFailed(_) => StatusCode::BAD_GATEWAY,
            BookingError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            BookingError::Persistence(_) | BookingError::PartialWrite { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            BookingError::PartialWrite { reservation_id } => Json(json!({
                "error": self.to_string(),
                "reservation_id": reservation_id,
            })),
            BookingError::StoreUnavailable(msg) | BookingError::Persistence(msg) => {
                tracing::error!("Booking failed: {}", msg);
                Json(json!({
                    "error": "The booking service is temporarily unavailable",
                }))
            }
            _ => Json(json!({
                "error": self.to_string(),
            })),
        };

        (status, body).into_response()
    }
}
