// HTTP handlers for booking endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::booking::{BookingError, ReservationRequest, ReservationResponse};
use crate::engine::ProductId;

/// Handler for POST /api/products/:id/reservations
/// Validates the booking steps, requests payment and stores the reservation
#[utoipa::path(
    post,
    path = "/api/products/{id}/reservations",
    params(
        ("id" = String, Path, description = "Product ID")
    ),
    request_body = ReservationRequest,
    responses(
        (status = 201, description = "Reservation created", body = ReservationResponse),
        (status = 400, description = "Invalid booking", body = String, example = json!({"error": "At least one adult is required"})),
        (status = 402, description = "Payment declined", body = String, example = json!({"error": "Payment declined: Card expired"})),
        (status = 404, description = "Product not found", body = String, example = json!({"error": "Product P-1 not found"})),
        (status = 500, description = "Reservation not fully saved", body = String, example = json!({"error": "Could not save reservation"}))
    ),
    tag = "bookings"
)]
pub async fn create_reservation_handler(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
    Json(request): Json<ReservationRequest>,
) -> Result<(StatusCode, Json<ReservationResponse>), BookingError> {
    // Validate request
    request
        .validate()
        .map_err(|e| BookingError::ValidationError(e.to_string()))?;

    let product_id = ProductId::new(id);
    tracing::debug!("Booking product {} on {}", product_id, request.date);

    let response = state.bookings.book(&product_id, request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}
