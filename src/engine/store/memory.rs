use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::booking::models::{Reservation, ReservationStatus};
use crate::engine::{
    catalog::RawChoiceRow,
    content::{ContentOverrideRecord, ContentSection},
    coupon::{normalize_code, Coupon},
    error::{EngineError, EngineResult},
    pricing::SelectionLine,
    pricing_index::DatePricingRecord,
    store::BookingStore,
    types::{Product, ProductId},
};

/// Store tables that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreTable {
    Products,
    DatePricing,
    Choices,
    Bookings,
    Content,
    Coupons,
    Reservations,
    ReservationSelections,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    pub(crate) products: HashMap<ProductId, Product>,
    pub(crate) date_pricing: HashMap<ProductId, Vec<DatePricingRecord>>,
    pub(crate) choices: HashMap<ProductId, Vec<RawChoiceRow>>,
    pub(crate) booked: HashMap<ProductId, HashMap<NaiveDate, u32>>,
    pub(crate) content: Vec<ContentOverrideRecord>,
    pub(crate) coupons: HashMap<String, Coupon>,
    pub(crate) reservations: Vec<Reservation>,
    pub(crate) reservation_lines: Vec<(Uuid, SelectionLine)>,
    pub(crate) failing: HashSet<StoreTable>,
}

impl MemoryState {
    pub(crate) fn check(&self, table: StoreTable) -> EngineResult<()> {
        if self.failing.contains(&table) {
            Err(EngineError::StoreUnavailable(format!("{:?} table unavailable", table)))
        } else {
            Ok(())
        }
    }
}

/// In-memory booking store with failure injection
#[derive(Debug, Default)]
pub struct InMemoryStore {
    pub(crate) state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) {
        let mut state = self.state.write().await;
        state.products.insert(product.id.clone(), product);
    }

    pub async fn insert_date_pricing(&self, product_id: &ProductId, record: DatePricingRecord) {
        let mut state = self.state.write().await;
        state
            .date_pricing
            .entry(product_id.clone())
            .or_default()
            .push(record);
    }

    pub async fn insert_choice_rows(&self, product_id: &ProductId, rows: Vec<RawChoiceRow>) {
        let mut state = self.state.write().await;
        state.choices.entry(product_id.clone()).or_default().extend(rows);
    }

    pub async fn set_booked(&self, product_id: &ProductId, date: NaiveDate, participants: u32) {
        let mut state = self.state.write().await;
        state
            .booked
            .entry(product_id.clone())
            .or_default()
            .insert(date, participants);
    }

    pub async fn insert_coupon(&self, coupon: Coupon) {
        let mut state = self.state.write().await;
        state.coupons.insert(normalize_code(&coupon.code), coupon);
    }

    /// Make every read or write against `table` fail until restored
    pub async fn fail(&self, table: StoreTable) {
        self.state.write().await.failing.insert(table);
    }

    pub async fn restore(&self, table: StoreTable) {
        self.state.write().await.failing.remove(&table);
    }

    /// Reservations written so far
    pub async fn reservations(&self) -> Vec<Reservation> {
        self.state.read().await.reservations.clone()
    }

    /// Selection lines written for a reservation
    pub async fn reservation_lines(&self, reservation_id: Uuid) -> Vec<SelectionLine> {
        self.state
            .read()
            .await
            .reservation_lines
            .iter()
            .filter(|(id, _)| *id == reservation_id)
            .map(|(_, line)| line.clone())
            .collect()
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn fetch_product(&self, product_id: &ProductId) -> EngineResult<Option<Product>> {
        let state = self.state.read().await;
        state.check(StoreTable::Products)?;
        Ok(state.products.get(product_id).cloned())
    }

    async fn fetch_date_pricing(
        &self,
        product_id: &ProductId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<DatePricingRecord>> {
        let state = self.state.read().await;
        state.check(StoreTable::DatePricing)?;
        Ok(state
            .date_pricing
            .get(product_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| record.date >= from && record.date <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_choice_rows(&self, product_id: &ProductId) -> EngineResult<Vec<RawChoiceRow>> {
        let state = self.state.read().await;
        state.check(StoreTable::Choices)?;
        Ok(state.choices.get(product_id).cloned().unwrap_or_default())
    }

    async fn fetch_booked_participants(
        &self,
        product_id: &ProductId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<HashMap<NaiveDate, u32>> {
        let state = self.state.read().await;
        state.check(StoreTable::Bookings)?;

        let mut counts: HashMap<NaiveDate, u32> = state
            .booked
            .get(product_id)
            .map(|counts| {
                counts
                    .iter()
                    .filter(|(date, _)| **date >= from && **date <= to)
                    .map(|(date, count)| (*date, *count))
                    .collect()
            })
            .unwrap_or_default();

        for reservation in state.reservations.iter().filter(|r| {
            r.product_id == product_id.as_str()
                && r.tour_date >= from
                && r.tour_date <= to
                && r.status != ReservationStatus::Cancelled
        }) {
            let participants = reservation.adults + reservation.children + reservation.infants;
            *counts.entry(reservation.tour_date).or_insert(0) += u32::try_from(participants).unwrap_or(0);
        }

        Ok(counts)
    }

    async fn fetch_content_records(
        &self,
        product_id: &ProductId,
        section: ContentSection,
        language_code: &str,
    ) -> EngineResult<Vec<ContentOverrideRecord>> {
        let state = self.state.read().await;
        state.check(StoreTable::Content)?;
        Ok(state
            .content
            .iter()
            .filter(|record| {
                &record.product_id == product_id
                    && record.section == section
                    && record.language_code == language_code
            })
            .cloned()
            .collect())
    }

    async fn upsert_content_record(&self, record: &ContentOverrideRecord) -> EngineResult<()> {
        let mut state = self.state.write().await;
        state.check(StoreTable::Content)?;

        let stored = ContentOverrideRecord {
            updated_at: Utc::now(),
            ..record.clone()
        };
        let existing = state.content.iter_mut().find(|row| {
            row.product_id == record.product_id
                && row.section == record.section
                && row.channel == record.channel
                && row.variant_key == record.variant_key
                && row.language_code == record.language_code
        });
        match existing {
            Some(row) => *row = stored,
            None => state.content.push(stored),
        }
        Ok(())
    }

    async fn find_coupon(&self, code: &str) -> EngineResult<Option<Coupon>> {
        let state = self.state.read().await;
        state.check(StoreTable::Coupons)?;
        Ok(state.coupons.get(&normalize_code(code)).cloned())
    }
}
