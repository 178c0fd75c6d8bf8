// HTTP handlers for the pricing, availability and content endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::booking::QuoteRequest;
use crate::engine::{
    content::DEFAULT_VARIANT, CalendarDay, ContentField, ContentOverrideRecord, ContentQuery,
    ContentSection, ContentUpdate, CouponCheck, OptionAvailability, ProductId, Quote,
    ResolvedContent, Selections,
};
use crate::error::{ApiError, ErrorResponse};
use crate::validation::{validate_language_code, validate_not_blank};
use crate::AppState;

/// Query parameters for the demand calendar
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CalendarParams {
    /// First date of the window (defaults to today)
    pub from: Option<NaiveDate>,
    /// Last date of the window (defaults to the configured window length)
    pub to: Option<NaiveDate>,
}

/// Request DTO for per-option availability of one required group
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChoiceAvailabilityRequest {
    #[validate(custom = "validate_not_blank")]
    pub group_id: String,
    #[serde(default)]
    pub selections: Selections,
    pub date: Option<NaiveDate>,
}

/// Query parameters for resolved content
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ContentParams {
    pub section: ContentSection,
    #[validate(custom = "validate_language_code")]
    pub language: String,
    /// Variant key (defaults to "default")
    pub variant: Option<String>,
    /// Comma separated channel ids in priority order
    pub channels: Option<String>,
}

impl ContentParams {
    fn channel_list(&self) -> Vec<String> {
        self.channels
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|channel| !channel.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Request DTO for saving a content override row
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SaveContentRequest {
    pub section: ContentSection,
    /// Absent for product-wide content
    pub channel_id: Option<String>,
    pub variant_key: Option<String>,
    #[validate(custom = "validate_language_code")]
    pub language_code: String,
    /// An empty value resets the field
    #[serde(default)]
    pub fields: BTreeMap<ContentField, String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Response DTO for a saved content row
#[derive(Debug, Serialize, ToSchema)]
pub struct SavedContentResponse {
    pub product_id: ProductId,
    pub section: ContentSection,
    pub channel_id: Option<String>,
    pub variant_key: String,
    pub language_code: String,
    pub fields: BTreeMap<ContentField, String>,
    pub tags: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<ContentOverrideRecord> for SavedContentResponse {
    fn from(record: ContentOverrideRecord) -> Self {
        SavedContentResponse {
            channel_id: record.channel.column_value().map(str::to_string),
            product_id: record.product_id,
            section: record.section,
            variant_key: record.variant_key,
            language_code: record.language_code,
            fields: record.fields,
            tags: record.tags,
            updated_at: record.updated_at,
        }
    }
}

/// Request DTO for coupon validation
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ValidateCouponRequest {
    #[validate(custom = "validate_not_blank")]
    pub code: String,
    #[validate(custom = "validate_not_blank")]
    pub product_id: String,
    pub channel_id: Option<String>,
}

fn variant_or_default(variant: Option<String>) -> String {
    variant
        .map(|variant| variant.trim().to_string())
        .filter(|variant| !variant.is_empty())
        .unwrap_or_else(|| DEFAULT_VARIANT.to_string())
}

/// Handler for GET /api/products/:id/calendar
/// Open flag, demand state and prices per date
#[utoipa::path(
    get,
    path = "/api/products/{id}/calendar",
    params(
        ("id" = String, Path, description = "Product ID"),
        CalendarParams
    ),
    responses(
        (status = 200, description = "Demand calendar", body = Vec<CalendarDay>),
        (status = 404, description = "Product not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "engine"
)]
pub async fn get_calendar(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<CalendarParams>,
) -> Result<Json<Vec<CalendarDay>>, ApiError> {
    let product_id = ProductId::new(id);
    let (from, to) = state
        .engine
        .window(params.from, params.to, Utc::now().date_naive());
    tracing::debug!("Fetching calendar for product {} from {} to {}", product_id, from, to);

    let days = state.engine.demand_calendar(&product_id, from, to).await?;
    Ok(Json(days))
}

/// Handler for POST /api/products/:id/quote
/// Prices a date, participant mix and choice selection
#[utoipa::path(
    post,
    path = "/api/products/{id}/quote",
    params(
        ("id" = String, Path, description = "Product ID")
    ),
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Price quote", body = Quote),
        (status = 400, description = "Invalid input data", body = ErrorResponse),
        (status = 404, description = "Product not found", body = ErrorResponse)
    ),
    tag = "engine"
)]
pub async fn quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<QuoteRequest>,
) -> Result<Json<Quote>, ApiError> {
    payload.validate()?;

    let product_id = ProductId::new(id);
    tracing::debug!("Quoting product {} on {}", product_id, payload.date);

    let quote = state.engine.quote(&product_id, &payload.into()).await?;
    Ok(Json(quote))
}

/// Handler for POST /api/products/:id/choice-availability
/// Open flags for the options of one required group
#[utoipa::path(
    post,
    path = "/api/products/{id}/choice-availability",
    params(
        ("id" = String, Path, description = "Product ID")
    ),
    request_body = ChoiceAvailabilityRequest,
    responses(
        (status = 200, description = "Per-option availability", body = Vec<OptionAvailability>),
        (status = 400, description = "Invalid input data", body = ErrorResponse),
        (status = 404, description = "Product not found", body = ErrorResponse)
    ),
    tag = "engine"
)]
pub async fn choice_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ChoiceAvailabilityRequest>,
) -> Result<Json<Vec<OptionAvailability>>, ApiError> {
    payload.validate()?;

    let options = state
        .engine
        .choice_availability(
            &ProductId::new(id),
            payload.group_id.trim(),
            &payload.selections,
            payload.date,
        )
        .await?;
    Ok(Json(options))
}

/// Handler for GET /api/products/:id/content
/// Merged content for one section across the selected channels
#[utoipa::path(
    get,
    path = "/api/products/{id}/content",
    params(
        ("id" = String, Path, description = "Product ID"),
        ContentParams
    ),
    responses(
        (status = 200, description = "Resolved content", body = ResolvedContent),
        (status = 400, description = "Invalid query", body = ErrorResponse)
    ),
    tag = "content"
)]
pub async fn get_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ContentParams>,
) -> Result<Json<ResolvedContent>, ApiError> {
    params.validate()?;

    let channels = params.channel_list();
    let query = ContentQuery {
        product_id: ProductId::new(id),
        section: params.section,
        language_code: params.language.trim().to_string(),
        variant_key: variant_or_default(params.variant),
        channels,
    };

    let content = state.engine.resolve_content(&query).await?;
    Ok(Json(content))
}

/// Handler for PUT /api/products/:id/content
/// Upserts one content override row
#[utoipa::path(
    put,
    path = "/api/products/{id}/content",
    params(
        ("id" = String, Path, description = "Product ID")
    ),
    request_body = SaveContentRequest,
    responses(
        (status = 200, description = "Content saved", body = SavedContentResponse),
        (status = 400, description = "Invalid input data", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "content"
)]
pub async fn save_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SaveContentRequest>,
) -> Result<Json<SavedContentResponse>, ApiError> {
    payload.validate()?;

    let update = ContentUpdate {
        product_id: ProductId::new(id),
        section: payload.section,
        channel_id: payload
            .channel_id
            .map(|channel| channel.trim().to_string())
            .filter(|channel| !channel.is_empty()),
        variant_key: variant_or_default(payload.variant_key),
        language_code: payload.language_code.trim().to_string(),
        fields: payload.fields,
        tags: payload.tags,
    };

    let record = state.engine.save_content(update).await?;
    Ok(Json(record.into()))
}

/// Handler for POST /api/coupons/validate
/// Checks a coupon code against a product and channel
#[utoipa::path(
    post,
    path = "/api/coupons/validate",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Validation outcome", body = CouponCheck),
        (status = 400, description = "Invalid input data", body = ErrorResponse)
    ),
    tag = "engine"
)]
pub async fn validate_coupon(
    State(state): State<AppState>,
    Json(payload): Json<ValidateCouponRequest>,
) -> Result<Json<CouponCheck>, ApiError> {
    payload.validate()?;

    let check = state
        .engine
        .validate_coupon(
            &payload.code,
            &ProductId::new(payload.product_id),
            payload.channel_id.as_deref(),
        )
        .await?;
    Ok(Json(check))
}
