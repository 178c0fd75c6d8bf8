// Relational store boundary for the Booking Engine
//
// The engine only sees typed records; each adapter converts its raw rows once,
// at this boundary.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

use crate::engine::{
    catalog::RawChoiceRow,
    content::{ContentOverrideRecord, ContentSection},
    coupon::Coupon,
    error::EngineResult,
    pricing_index::DatePricingRecord,
    types::{Product, ProductId},
};

pub use memory::InMemoryStore;
pub use postgres::PgBookingStore;

/// Read side of the relational store, plus content override writes
///
/// Queries returning zero rows are not errors.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn fetch_product(&self, product_id: &ProductId) -> EngineResult<Option<Product>>;

    async fn fetch_date_pricing(
        &self,
        product_id: &ProductId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<DatePricingRecord>>;

    async fn fetch_choice_rows(&self, product_id: &ProductId) -> EngineResult<Vec<RawChoiceRow>>;

    /// Participants already booked per date in the window
    async fn fetch_booked_participants(
        &self,
        product_id: &ProductId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<HashMap<NaiveDate, u32>>;

    async fn fetch_content_records(
        &self,
        product_id: &ProductId,
        section: ContentSection,
        language_code: &str,
    ) -> EngineResult<Vec<ContentOverrideRecord>>;

    /// Insert or overwrite the row for the record's scope (last writer wins)
    async fn upsert_content_record(&self, record: &ContentOverrideRecord) -> EngineResult<()>;

    /// Look up a coupon by its normalized code
    async fn find_coupon(&self, code: &str) -> EngineResult<Option<Coupon>>;
}
