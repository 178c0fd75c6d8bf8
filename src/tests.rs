// Handler tests for the Tour Booking API
// Each test runs the full router over an in-memory store

use super::*;
use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;

use crate::booking::{BookingService, PayOnSiteGateway};
use crate::engine::{
    AgeBands, CalendarDay, Coupon, CouponStatus, DatePricingRecord, DemandState, DiscountType,
    EngineSettings, InMemoryStore, OptionAvailability, Product, ProductId, Quote, RawChoiceRow,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn product() -> Product {
    Product {
        id: ProductId::new("P-1"),
        name: "Harbour Cruise".to_string(),
        base_price: dec!(100),
        age_bands: AgeBands::default(),
        min_participants: 2,
        max_participants: 20,
    }
}

fn ticket_option(option_id: &str, name: &str, is_default: bool, sort_order: i32) -> RawChoiceRow {
    RawChoiceRow {
        group_id: "ticket".to_string(),
        group_name: "Ticket".to_string(),
        group_description: None,
        is_required: true,
        option_id: option_id.to_string(),
        option_name: name.to_string(),
        price_adjustment: Decimal::ZERO,
        adult_adjustment: None,
        child_adjustment: None,
        infant_adjustment: None,
        is_default,
        image_url: None,
        sort_order,
    }
}

/// Seeds one product with a special price on 2025-11-05, a closed
/// 2025-11-06, a two-option ticket group and a 10% coupon
async fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    let product = product();
    store.insert_product(product.clone()).await;

    store
        .insert_date_pricing(
            &product.id,
            DatePricingRecord {
                date: date("2025-11-05"),
                adult_price: Some(dec!(120)),
                child_price: None,
                infant_price: None,
                sale_available: true,
                choice_availability: [("optA".to_string(), false)].into_iter().collect(),
            },
        )
        .await;
    store
        .insert_date_pricing(
            &product.id,
            DatePricingRecord {
                date: date("2025-11-06"),
                adult_price: None,
                child_price: None,
                infant_price: None,
                sale_available: false,
                choice_availability: Default::default(),
            },
        )
        .await;

    store
        .insert_choice_rows(
            &product.id,
            vec![
                ticket_option("optA", "Premium", false, 0),
                ticket_option("optB", "Standard", true, 1),
            ],
        )
        .await;

    store
        .insert_coupon(Coupon {
            code: "SAVE10".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: dec!(10),
            status: CouponStatus::Active,
            product_id: None,
            channel_id: None,
            start_date: None,
            end_date: None,
        })
        .await;

    store
}

/// Helper function to create a test app over the in-memory store
fn create_test_app(store: Arc<InMemoryStore>) -> TestServer {
    let settings = EngineSettings {
        self_operated_channels: ["web".to_string()].into_iter().collect(),
        pricing_window_days: 30,
    };
    let engine = BookingEngine::new(store.clone(), settings);
    let bookings = BookingService::new(engine.clone(), store, Arc::new(PayOnSiteGateway), "USD".to_string());

    TestServer::new(create_router(AppState { engine, bookings })).unwrap()
}

fn guest() -> serde_json::Value {
    json!({
        "name": "Mina Cho",
        "email": "mina@example.com",
        "phone": "+82 10 5555 0101",
        "country": "KR",
        "native_language": "ko"
    })
}

// ============================================================================
// Calendar Tests (GET /api/products/:id/calendar)
// ============================================================================

#[tokio::test]
async fn test_calendar_reports_prices_and_closed_dates() {
    let store = seeded_store().await;
    store.set_booked(&product().id, date("2025-11-04"), 3).await;
    let server = create_test_app(store);

    let response = server
        .get("/api/products/P-1/calendar")
        .add_query_param("from", "2025-11-04")
        .add_query_param("to", "2025-11-06")
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let days: Vec<CalendarDay> = response.json();
    assert_eq!(days.len(), 3);

    assert_eq!(days[0].booked, 3);
    assert_eq!(days[0].demand_state, DemandState::Confirmed);
    assert_eq!(days[0].prices.adult, dec!(100));

    assert!(days[1].open);
    assert_eq!(days[1].prices.adult, dec!(120));

    assert!(!days[2].open);
    assert_eq!(days[2].demand_state, DemandState::Closed);
}

#[tokio::test]
async fn test_calendar_unknown_product() {
    let server = create_test_app(seeded_store().await);

    let response = server.get("/api/products/missing/calendar").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "NOT_FOUND");
}

// ============================================================================
// Quote Tests (POST /api/products/:id/quote)
// ============================================================================

#[tokio::test]
async fn test_quote_uses_date_price_and_flags_closed_combination() {
    let server = create_test_app(seeded_store().await);

    let response = server
        .post("/api/products/P-1/quote")
        .json(&json!({
            "date": "2025-11-05",
            "participants": { "adults": 1 },
            "selections": { "required": { "ticket": "optA" }, "optional": [] }
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let quote: Quote = response.json();
    assert_eq!(quote.breakdown.unit_prices.adult, dec!(120));
    assert_eq!(quote.breakdown.total, dec!(120));
    assert!(!quote.combination_open);
}

#[tokio::test]
async fn test_quote_without_pricing_row_uses_base_price() {
    let server = create_test_app(seeded_store().await);

    let response = server
        .post("/api/products/P-1/quote")
        .json(&json!({
            "date": "2025-12-25",
            "participants": { "adults": 2, "children": 1 }
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let quote: Quote = response.json();
    assert_eq!(quote.breakdown.unit_prices.adult, dec!(100));
    assert_eq!(quote.breakdown.unit_prices.child, Decimal::ZERO);
    assert_eq!(quote.breakdown.total, dec!(200));
    assert!(quote.combination_open);
}

#[tokio::test]
async fn test_quote_applies_percentage_coupon() {
    let server = create_test_app(seeded_store().await);

    let response = server
        .post("/api/products/P-1/quote")
        .json(&json!({
            "date": "2025-12-25",
            "participants": { "adults": 2 },
            "coupon_code": " save10 "
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let quote: Quote = response.json();
    assert_eq!(quote.breakdown.subtotal, dec!(200));
    assert_eq!(quote.breakdown.discount, dec!(20));
    assert_eq!(quote.breakdown.total, dec!(180));
    assert_eq!(quote.coupon_error, None);
}

#[tokio::test]
async fn test_quote_reports_unknown_coupon() {
    let server = create_test_app(seeded_store().await);

    let response = server
        .post("/api/products/P-1/quote")
        .json(&json!({
            "date": "2025-12-25",
            "participants": { "adults": 2 },
            "coupon_code": "NOPE"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let quote: Quote = response.json();
    assert_eq!(quote.breakdown.total, dec!(200));
    assert_eq!(quote.coupon_error.as_deref(), Some("Coupon code not found"));
}

#[tokio::test]
async fn test_quote_requires_an_adult() {
    let server = create_test_app(seeded_store().await);

    let response = server
        .post("/api/products/P-1/quote")
        .json(&json!({
            "date": "2025-12-25",
            "participants": { "adults": 0, "children": 2 }
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
}

// ============================================================================
// Choice Availability Tests (POST /api/products/:id/choice-availability)
// ============================================================================

#[tokio::test]
async fn test_choice_availability_per_option() {
    let server = create_test_app(seeded_store().await);

    let response = server
        .post("/api/products/P-1/choice-availability")
        .json(&json!({
            "group_id": "ticket",
            "date": "2025-11-05"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let options: Vec<OptionAvailability> = response.json();
    let open = |id: &str| options.iter().find(|o| o.option_id == id).map(|o| o.open);
    assert_eq!(open("optA"), Some(false));
    assert_eq!(open("optB"), Some(true));
}

#[tokio::test]
async fn test_choice_availability_rejects_blank_group() {
    let server = create_test_app(seeded_store().await);

    let response = server
        .post("/api/products/P-1/choice-availability")
        .json(&json!({ "group_id": "  " }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Content Tests (GET/PUT /api/products/:id/content)
// ============================================================================

#[tokio::test]
async fn test_content_falls_back_to_any_row_without_common_content() {
    let server = create_test_app(seeded_store().await);

    let saved = server
        .put("/api/products/P-1/content")
        .json(&json!({
            "section": "details",
            "channel_id": "agency-7",
            "language_code": "en",
            "fields": { "description": "Agency copy" },
            "tags": ["sunset"]
        }))
        .await;
    assert_eq!(saved.status_code(), StatusCode::OK);

    let response = server
        .get("/api/products/P-1/content")
        .add_query_param("section", "details")
        .add_query_param("language", "en")
        .add_query_param("channels", "web")
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["fields"]["description"], "Agency copy");
    assert_eq!(body["fields"]["slogan1"], "");
    assert_eq!(body["tags"], json!(["sunset"]));
}

#[tokio::test]
async fn test_content_channel_row_wins_over_common() {
    let server = create_test_app(seeded_store().await);

    server
        .put("/api/products/P-1/content")
        .json(&json!({
            "section": "details",
            "language_code": "en",
            "fields": { "description": "Product copy", "included": "Lunch" }
        }))
        .await;
    server
        .put("/api/products/P-1/content")
        .json(&json!({
            "section": "details",
            "channel_id": "web",
            "language_code": "en",
            "fields": { "description": "<p>Storefront copy</p>", "included": "<p>&nbsp;</p>" }
        }))
        .await;

    let response = server
        .get("/api/products/P-1/content")
        .add_query_param("section", "details")
        .add_query_param("language", "en")
        .add_query_param("channels", "web")
        .await;

    let body: serde_json::Value = response.json();
    assert_eq!(body["fields"]["description"], "<p>Storefront copy</p>");
    assert_eq!(body["fields"]["included"], "Lunch");
}

#[tokio::test]
async fn test_content_rejects_invalid_language() {
    let server = create_test_app(seeded_store().await);

    let response = server
        .get("/api/products/P-1/content")
        .add_query_param("section", "policies")
        .add_query_param("language", "english!")
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_content_save_rejects_field_from_other_section() {
    let server = create_test_app(seeded_store().await);

    let response = server
        .put("/api/products/P-1/content")
        .json(&json!({
            "section": "details",
            "language_code": "en",
            "fields": { "refund_policy": "No refunds" }
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Coupon Tests (POST /api/coupons/validate)
// ============================================================================

#[tokio::test]
async fn test_validate_coupon() {
    let server = create_test_app(seeded_store().await);

    let response = server
        .post("/api/coupons/validate")
        .json(&json!({ "code": "save10", "product_id": "P-1" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["valid"], true);
    assert_eq!(body["coupon"]["code"], "SAVE10");

    let response = server
        .post("/api/coupons/validate")
        .json(&json!({ "code": "EXPIRED", "product_id": "P-1" }))
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["valid"], false);
    assert_eq!(body["error_message"], "Coupon code not found");
}

// ============================================================================
// Reservation Tests (POST /api/products/:id/reservations)
// ============================================================================

#[tokio::test]
async fn test_create_reservation_pay_on_site() {
    let store = seeded_store().await;
    let server = create_test_app(store.clone());

    let response = server
        .post("/api/products/P-1/reservations")
        .json(&json!({
            "date": "2025-12-25",
            "participants": { "adults": 2 },
            "guest": guest(),
            "coupon_code": "SAVE10"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["reservation"]["status"], "pay_on_site");
    assert_eq!(body["reservation"]["customer_name"], "Mina Cho");
    assert_eq!(body["selections"][0]["option_id"], "optB");

    let reservations = store.reservations().await;
    assert_eq!(reservations.len(), 1);
    assert_eq!(reservations[0].total_price, dec!(180));
}

#[tokio::test]
async fn test_create_reservation_rejects_closed_date() {
    let server = create_test_app(seeded_store().await);

    let response = server
        .post("/api/products/P-1/reservations")
        .json(&json!({
            "date": "2025-11-06",
            "participants": { "adults": 2 },
            "guest": guest()
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_reservation_validates_guest() {
    let server = create_test_app(seeded_store().await);

    let mut guest = guest();
    guest["email"] = json!("not-an-email");

    let response = server
        .post("/api/products/P-1/reservations")
        .json(&json!({
            "date": "2025-12-25",
            "participants": { "adults": 2 },
            "guest": guest
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_create_reservation_rejects_oversized_counts() {
    let store = seeded_store().await;
    let server = create_test_app(store.clone());

    let response = server
        .post("/api/products/P-1/reservations")
        .json(&json!({
            "date": "2025-12-25",
            "participants": { "adults": 4294967295u32, "children": 1 },
            "guest": guest()
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(store.reservations().await.is_empty());
}

#[tokio::test]
async fn test_create_reservation_respects_remaining_seats() {
    let store = seeded_store().await;
    store.set_booked(&product().id, date("2025-12-24"), 19).await;
    let server = create_test_app(store.clone());

    let response = server
        .post("/api/products/P-1/reservations")
        .json(&json!({
            "date": "2025-12-24",
            "participants": { "adults": 2 },
            "guest": guest()
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Only 1 seats left on 2025-12-24");
    assert!(store.reservations().await.is_empty());
}
