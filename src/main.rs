use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use tour_booking::booking::{BookingService, HttpPaymentGateway, PayOnSiteGateway, PaymentGateway};
use tour_booking::config::AppConfig;
use tour_booking::engine::{BookingEngine, PgBookingStore};
use tour_booking::{create_router, db, AppState};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing subscriber, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Tour Booking API - Starting...");

    let config = AppConfig::from_env().expect("Invalid configuration");

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&config.database_url, config.database_pool_size)
        .await
        .expect("Failed to create database pool");

    // Run SQLx migrations on startup
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations completed successfully");

    let store = Arc::new(PgBookingStore::new(db_pool));
    let engine = BookingEngine::new(store.clone(), config.engine_settings());

    let gateway: Arc<dyn PaymentGateway> = match &config.payment_gateway_url {
        Some(url) => {
            tracing::info!("Payments go through {}", url);
            Arc::new(
                HttpPaymentGateway::new(url.as_str(), config.payment_gateway_key.clone(), Duration::from_secs(10))
                    .expect("Failed to build payment gateway client"),
            )
        }
        None => {
            tracing::warn!("PAYMENT_GATEWAY_URL not set, reservations are recorded as pay on site");
            Arc::new(PayOnSiteGateway)
        }
    };

    let bookings = BookingService::new(engine.clone(), store, gateway, config.currency.clone());

    // Create the application router
    let app = create_router(AppState { engine, bookings });

    // Start the Axum server
    let addr = config.bind_address();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Tour Booking API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
