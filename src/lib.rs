pub mod booking;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use booking::BookingService;
use engine::BookingEngine;

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        engine::handlers::get_calendar,
        engine::handlers::quote,
        engine::handlers::choice_availability,
        engine::handlers::get_content,
        engine::handlers::save_content,
        engine::handlers::validate_coupon,
        booking::handlers::create_reservation_handler,
    ),
    components(
        schemas(
            engine::CalendarDay,
            engine::CategoryPrices,
            engine::DemandState,
            engine::Quote,
            engine::PriceBreakdown,
            engine::SelectionLine,
            engine::Participants,
            engine::Selections,
            engine::OptionAvailability,
            engine::ResolvedContent,
            engine::ContentSection,
            engine::ContentField,
            engine::ProductId,
            engine::Coupon,
            engine::CouponCheck,
            engine::DiscountType,
            engine::CouponStatus,
            engine::GuestInfo,
            engine::handlers::ChoiceAvailabilityRequest,
            engine::handlers::SaveContentRequest,
            engine::handlers::SavedContentResponse,
            engine::handlers::ValidateCouponRequest,
            booking::ParticipantsRequest,
            booking::QuoteRequest,
            booking::ReservationRequest,
            booking::ReservationResponse,
            booking::Reservation,
            booking::ReservationStatus,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "engine", description = "Pricing, availability and coupon endpoints"),
        (name = "content", description = "Per-channel product content"),
        (name = "bookings", description = "Reservation endpoints")
    ),
    info(
        title = "Tour Booking API",
        version = "1.0.0",
        description = "Pricing, availability and content resolution for tour bookings"
    )
)]
pub struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: BookingEngine,
    pub bookings: BookingService,
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS and tracing middleware
pub fn create_router(state: AppState) -> Router {
    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Engine routes
        .route("/api/products/:id/calendar", get(engine::handlers::get_calendar))
        .route("/api/products/:id/quote", post(engine::handlers::quote))
        .route(
            "/api/products/:id/choice-availability",
            post(engine::handlers::choice_availability),
        )
        .route(
            "/api/products/:id/content",
            get(engine::handlers::get_content).put(engine::handlers::save_content),
        )
        .route("/api/coupons/validate", post(engine::handlers::validate_coupon))
        // Booking routes
        .route(
            "/api/products/:id/reservations",
            post(booking::handlers::create_reservation_handler),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests;
