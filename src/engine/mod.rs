// Booking Engine Module
//
// Pricing, availability and content resolution for the tour booking flow:
// - Content fallback: resolve per-channel, per-variant, per-language product text
// - Date pricing: per-date category prices and sale/combination availability
// - Choice catalog: required single-select groups and optional add-ons
// - Availability and demand state per date and per choice combination
// - Pricing and coupon discounts, recomputed from loaded data without round trips
// - Booking wizard state: immutable aggregate with step guards
//
// Loads degrade to documented defaults when the store fails; recomputation is
// synchronous over already loaded data.

pub mod error;
pub mod types;
pub mod store;
pub mod content;
pub mod pricing_index;
pub mod catalog;
pub mod availability;
pub mod pricing;
pub mod coupon;
pub mod wizard;
pub mod handlers;

// Re-export commonly used types for convenience
pub use error::{EngineError, EngineResult};
pub use types::{
    AgeBands,
    CategoryPrices,
    CouponStatus,
    DemandState,
    DiscountType,
    ParticipantCategory,
    Participants,
    Product,
    ProductId,
};
pub use store::{BookingStore, InMemoryStore, PgBookingStore};
pub use content::{
    ChannelScope,
    ContentField,
    ContentOverrideRecord,
    ContentSection,
    FallbackResolver,
    ResolvedContent,
};
pub use pricing_index::{combination_key, DatePricingIndex, DatePricingRecord};
pub use catalog::{ChoiceCatalog, ChoiceGroup, ChoiceOption, RawChoiceRow, Selections};
pub use availability::{AvailabilityEvaluator, BookedCounts, OptionAvailability};
pub use pricing::{round_for_display, PriceBreakdown, PricingCalculator, SelectionLine};
pub use coupon::{Coupon, CouponRejection, CouponValidator};
pub use wizard::{BookingState, GuestInfo, LoadedSession, StepError, WizardStep};

// Booking Engine - Orchestrator
//
// Loads per-product data from the store and hands out booking states and
// resolved views built from it.

use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use utoipa::ToSchema;

/// Longest window a demand calendar may cover
pub const MAX_CALENDAR_DAYS: u64 = 366;

/// Engine settings taken from application configuration
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Storefront channel ids sharing the self-operated content scope
    pub self_operated_channels: HashSet<String>,
    /// Length of the date window loaded when none is given
    pub pricing_window_days: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            self_operated_channels: HashSet::new(),
            pricing_window_days: 180,
        }
    }
}

/// One date of the demand calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub open: bool,
    pub demand_state: DemandState,
    pub booked: u32,
    pub prices: CategoryPrices,
}

/// Content lookup for one section of a product
#[derive(Debug, Clone)]
pub struct ContentQuery {
    pub product_id: ProductId,
    pub section: ContentSection,
    pub language_code: String,
    pub variant_key: String,
    /// Selected channels in priority order; empty means product-wide content
    pub channels: Vec<String>,
}

/// Content row written by the editor
#[derive(Debug, Clone)]
pub struct ContentUpdate {
    pub product_id: ProductId,
    pub section: ContentSection,
    pub channel_id: Option<String>,
    pub variant_key: String,
    pub language_code: String,
    pub fields: BTreeMap<ContentField, String>,
    pub tags: Vec<String>,
}

/// Outcome of a coupon validation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CouponCheck {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<Coupon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Everything a shopper has entered for one booking
#[derive(Debug, Clone, Default)]
pub struct BookingDraft {
    pub date: Option<NaiveDate>,
    pub participants: Participants,
    /// Catalog defaults are used when absent
    pub selections: Option<Selections>,
    pub guest: Option<GuestInfo>,
    pub coupon_code: Option<String>,
    pub channel_id: Option<String>,
}

/// Booking state built from a draft, with the coupon outcome
#[derive(Debug, Clone)]
pub struct DraftState {
    pub state: BookingState,
    pub coupon_rejection: Option<CouponRejection>,
}

/// Priced quote for a draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Quote {
    pub breakdown: PriceBreakdown,
    pub display_total: Decimal,
    pub demand_state: DemandState,
    /// Whether the selected required combination is open on the date
    pub combination_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_error: Option<String>,
}

/// Booking Engine
///
/// Coordinates store loads and the pure engines for one store.
#[derive(Clone)]
pub struct BookingEngine {
    store: Arc<dyn BookingStore>,
    settings: EngineSettings,
}

impl BookingEngine {
    /// Create a new BookingEngine
    pub fn new(store: Arc<dyn BookingStore>, settings: EngineSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &Arc<dyn BookingStore> {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Resolve an optional window, defaulting to the configured length from `today`
    pub fn window(&self, from: Option<NaiveDate>, to: Option<NaiveDate>, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let from = from.unwrap_or(today);
        let to = to.unwrap_or_else(|| {
            from.checked_add_days(Days::new(self.settings.pricing_window_days))
                .unwrap_or(NaiveDate::MAX)
        });
        if to < from {
            (to, from)
        } else {
            (from, to)
        }
    }

    /// Fetch a product, failing when it does not exist
    pub async fn product(&self, product_id: &ProductId) -> EngineResult<Product> {
        self.store
            .fetch_product(product_id)
            .await?
            .ok_or_else(|| EngineError::ProductNotFound(product_id.to_string()))
    }

    /// Load everything the wizard needs for a product and window
    ///
    /// Pricing, choices and booked counts load concurrently; each degrades on
    /// its own when the store fails.
    pub async fn load_session(
        &self,
        product_id: &ProductId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<LoadedSession> {
        let product = self.product(product_id).await?;
        let store = self.store.as_ref();

        let (pricing, catalog, booked) = tokio::join!(
            DatePricingIndex::load(store, &product, from, to),
            ChoiceCatalog::load(store, &product),
            BookedCounts::load(store, &product, from, to),
        );

        tracing::debug!(
            "Loaded session for product {}: {} required groups, {} add-ons, pricing degraded: {}",
            product.id,
            catalog.required_groups.len(),
            catalog.optional_groups.len(),
            pricing.is_degraded()
        );

        Ok(LoadedSession {
            product,
            pricing,
            catalog,
            booked,
        })
    }

    /// Open flag, demand state and prices for every date in the window
    pub async fn demand_calendar(
        &self,
        product_id: &ProductId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<CalendarDay>> {
        let (from, to) = if to < from { (to, from) } else { (from, to) };
        let to = to.min(
            from.checked_add_days(Days::new(MAX_CALENDAR_DAYS - 1))
                .unwrap_or(to),
        );

        let product = self.product(product_id).await?;
        let store = self.store.as_ref();
        let (pricing, booked) = tokio::join!(
            DatePricingIndex::load(store, &product, from, to),
            BookedCounts::load(store, &product, from, to),
        );

        Ok(from
            .iter_days()
            .take_while(|date| *date <= to)
            .map(|date| {
                let booked_on = booked.on(date);
                CalendarDay {
                    date,
                    open: pricing.is_date_open(date),
                    demand_state: AvailabilityEvaluator::demand_state(&pricing, &product, date, booked_on),
                    booked: booked_on,
                    prices: pricing.price_for(date),
                }
            })
            .collect())
    }

    /// Look up and check a coupon code
    ///
    /// The outer result carries store failures, the inner one the rejection.
    pub async fn check_coupon(
        &self,
        code: &str,
        product_id: &ProductId,
        channel_id: Option<&str>,
        today: NaiveDate,
    ) -> EngineResult<Result<Coupon, CouponRejection>> {
        let code = coupon::normalize_code(code);
        if code.is_empty() {
            return Ok(Err(CouponRejection::NotFound));
        }

        let Some(coupon) = self.store.find_coupon(&code).await? else {
            tracing::debug!("Coupon {} not found", code);
            return Ok(Err(CouponRejection::NotFound));
        };

        Ok(CouponValidator::validate(&coupon, product_id, channel_id, today).map(|_| coupon))
    }

    /// Validate a coupon for the coupon endpoint
    pub async fn validate_coupon(
        &self,
        code: &str,
        product_id: &ProductId,
        channel_id: Option<&str>,
    ) -> EngineResult<CouponCheck> {
        let today = Utc::now().date_naive();
        Ok(match self.check_coupon(code, product_id, channel_id, today).await? {
            Ok(coupon) => CouponCheck {
                valid: true,
                coupon: Some(coupon),
                error_message: None,
            },
            Err(rejection) => CouponCheck {
                valid: false,
                coupon: None,
                error_message: Some(rejection.to_string()),
            },
        })
    }

    /// Build a booking state from a draft
    ///
    /// The session is loaded for the draft's date only. A rejected coupon is
    /// reported alongside the state and not applied.
    pub async fn draft_state(
        &self,
        product_id: &ProductId,
        draft: &BookingDraft,
        today: NaiveDate,
    ) -> EngineResult<DraftState> {
        let date = draft.date.ok_or(EngineError::DateNotSelected)?;

        let state = BookingState::new();
        let generation = state.generation();
        let session = self.load_session(product_id, date, date).await?;

        let mut state = state
            .with_loaded(generation, Arc::new(session))
            .with_date(date)
            .with_participants(draft.participants);
        if let Some(selections) = &draft.selections {
            state = state.with_selections(selections.clone());
        }
        if let Some(guest) = &draft.guest {
            state = state.with_guest(guest.clone());
        }

        let mut coupon_rejection = None;
        if let Some(code) = draft.coupon_code.as_deref().filter(|code| !code.trim().is_empty()) {
            match self
                .check_coupon(code, product_id, draft.channel_id.as_deref(), today)
                .await?
            {
                Ok(coupon) => state = state.with_coupon(coupon),
                Err(rejection) => coupon_rejection = Some(rejection),
            }
        }

        Ok(DraftState {
            state,
            coupon_rejection,
        })
    }

    /// Price a draft
    pub async fn quote(&self, product_id: &ProductId, draft: &BookingDraft) -> EngineResult<Quote> {
        let today = Utc::now().date_naive();
        let DraftState {
            state,
            coupon_rejection,
        } = self.draft_state(product_id, draft, today).await?;

        let breakdown = state.quote()?;
        let session = state.session().ok_or(EngineError::SessionNotLoaded)?;

        Ok(Quote {
            display_total: breakdown.display_total(),
            demand_state: state.demand_state().unwrap_or(DemandState::Open),
            combination_open: AvailabilityEvaluator::is_current_selection_open(
                &session.pricing,
                state.selections(),
                state.date(),
            ),
            coupon_error: coupon_rejection.map(|rejection| rejection.to_string()),
            breakdown,
        })
    }

    /// Open flags for the options of one required group
    pub async fn choice_availability(
        &self,
        product_id: &ProductId,
        group_id: &str,
        current: &Selections,
        date: Option<NaiveDate>,
    ) -> EngineResult<Vec<OptionAvailability>> {
        let product = self.product(product_id).await?;
        let store = self.store.as_ref();
        let catalog = ChoiceCatalog::load(store, &product).await;

        let index = match date {
            Some(date) => DatePricingIndex::load(store, &product, date, date).await,
            None => {
                let today = Utc::now().date_naive();
                DatePricingIndex::empty(&product, today, today)
            }
        };

        Ok(AvailabilityEvaluator::group_options(&index, &catalog, group_id, current, date))
    }

    /// Merged content for a product section across the selected channels
    ///
    /// A failed content read degrades to empty fields.
    pub async fn resolve_content(&self, query: &ContentQuery) -> EngineResult<ResolvedContent> {
        let records = match self
            .store
            .fetch_content_records(&query.product_id, query.section, &query.language_code)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    "Content load failed for product {} ({}), returning empty content: {}",
                    query.product_id,
                    query.language_code,
                    e
                );
                Vec::new()
            }
        };

        let mut scopes: Vec<ChannelScope> = query
            .channels
            .iter()
            .map(|channel| ChannelScope::from_channel(Some(channel), &self.settings.self_operated_channels))
            .collect();
        scopes.dedup();
        if scopes.is_empty() {
            scopes.push(ChannelScope::Common);
        }

        let resolver = FallbackResolver::new(&records);
        Ok(resolver.merged(query.section, &scopes, &query.variant_key, &query.language_code))
    }

    /// Save one content override row
    ///
    /// Fields outside the section are rejected. An empty value is stored as
    /// an explicit reset.
    pub async fn save_content(&self, update: ContentUpdate) -> EngineResult<ContentOverrideRecord> {
        if let Some(field) = update.fields.keys().find(|field| field.section() != update.section) {
            return Err(EngineError::InvalidRecord(format!(
                "field {:?} does not belong to section {}",
                field, update.section
            )));
        }

        let record = ContentOverrideRecord {
            channel: ChannelScope::from_channel(update.channel_id.as_deref(), &self.settings.self_operated_channels),
            product_id: update.product_id,
            section: update.section,
            variant_key: update.variant_key,
            language_code: update.language_code,
            fields: update.fields,
            tags: update
                .tags
                .into_iter()
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect(),
            updated_at: Utc::now(),
        };

        self.store.upsert_content_record(&record).await?;
        tracing::info!(
            "Saved {} content for product {} (channel {:?}, variant {}, language {})",
            record.section,
            record.product_id,
            record.channel.column_value(),
            record.variant_key,
            record.language_code
        );

        Ok(record)
    }
}
