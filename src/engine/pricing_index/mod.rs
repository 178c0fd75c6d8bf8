// Date Pricing Index
//
// Loads per-date price overrides and per-combination sale availability for a product
// over a date window, and answers price/open queries from memory afterwards.
// A failed load degrades to "no overrides" so the booking path stays usable.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::engine::{
    store::BookingStore,
    types::{CategoryPrices, Product},
};

/// Separator between option ids inside a combination key
pub const COMBINATION_SEPARATOR: char = '+';

/// Override row for one product and date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatePricingRecord {
    pub date: NaiveDate,
    pub adult_price: Option<Decimal>,
    pub child_price: Option<Decimal>,
    pub infant_price: Option<Decimal>,
    pub sale_available: bool,
    /// Combination key -> sale availability
    pub choice_availability: HashMap<String, bool>,
}

/// Build the combination key for a set of selected option ids
///
/// Ids are trimmed, sorted and joined with `+`, so selection order never matters.
pub fn combination_key<I, S>(option_ids: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut ids: Vec<String> = option_ids
        .into_iter()
        .map(|id| id.as_ref().trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    ids.sort();
    ids.join(&COMBINATION_SEPARATOR.to_string())
}

/// Re-normalize a key read from the store
pub fn normalize_combination_key(raw: &str) -> String {
    combination_key(raw.split(COMBINATION_SEPARATOR))
}

/// Date Pricing Index
///
/// In-memory view of the override rows for one product and window.
#[derive(Debug, Clone)]
pub struct DatePricingIndex {
    base_price: Decimal,
    window: (NaiveDate, NaiveDate),
    records: HashMap<NaiveDate, DatePricingRecord>,
    degraded: bool,
}

impl DatePricingIndex {
    /// Build an index from already-fetched rows
    ///
    /// Rows outside the window are dropped and combination keys are normalized.
    pub fn from_records(
        product: &Product,
        from: NaiveDate,
        to: NaiveDate,
        records: Vec<DatePricingRecord>,
    ) -> Self {
        let window = if from <= to { (from, to) } else { (to, from) };

        let records = records
            .into_iter()
            .filter(|record| record.date >= window.0 && record.date <= window.1)
            .map(|record| {
                let choice_availability = record
                    .choice_availability
                    .iter()
                    .map(|(key, open)| (normalize_combination_key(key), *open))
                    .collect();
                (record.date, DatePricingRecord { choice_availability, ..record })
            })
            .collect();

        Self {
            base_price: product.base_price,
            window,
            records,
            degraded: false,
        }
    }

    /// Index with no overrides: every date open at base price
    pub fn empty(product: &Product, from: NaiveDate, to: NaiveDate) -> Self {
        Self::from_records(product, from, to, Vec::new())
    }

    /// Load the index for a product and window from the store
    ///
    /// Never fails: a store error is logged and the index degrades to base
    /// prices with every date open.
    pub async fn load(
        store: &dyn BookingStore,
        product: &Product,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Self {
        match store.fetch_date_pricing(&product.id, from, to).await {
            Ok(records) => {
                tracing::debug!(
                    "Loaded {} date pricing rows for product {} ({} to {})",
                    records.len(),
                    product.id,
                    from,
                    to
                );
                Self::from_records(product, from, to, records)
            }
            Err(e) => {
                tracing::warn!(
                    "Date pricing load failed for product {}, using base prices: {}",
                    product.id,
                    e
                );
                Self {
                    degraded: true,
                    ..Self::empty(product, from, to)
                }
            }
        }
    }

    /// Whether the index was built from a failed load
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn window(&self) -> (NaiveDate, NaiveDate) {
        self.window
    }

    fn record(&self, date: NaiveDate) -> Option<&DatePricingRecord> {
        if date < self.window.0 || date > self.window.1 {
            return None;
        }
        self.records.get(&date)
    }

    /// Unit prices per category for a date
    ///
    /// Adult falls back to the product base price, child and infant to zero.
    pub fn price_for(&self, date: NaiveDate) -> CategoryPrices {
        let base = CategoryPrices::base(self.base_price);
        match self.record(date) {
            Some(record) => CategoryPrices {
                adult: record.adult_price.unwrap_or(base.adult),
                child: record.child_price.unwrap_or(base.child),
                infant: record.infant_price.unwrap_or(base.infant),
            },
            None => base,
        }
    }

    /// Whether the date is open for sale at all
    pub fn is_date_open(&self, date: NaiveDate) -> bool {
        self.record(date).map_or(true, |record| record.sale_available)
    }

    /// Whether a specific required-choice combination is open on a date
    ///
    /// A globally closed date closes every combination; a key missing from the
    /// combination map is open.
    pub fn is_combination_open(&self, date: NaiveDate, combination_key: &str) -> bool {
        match self.record(date) {
            None => true,
            Some(record) if !record.sale_available => false,
            Some(record) => {
                let key = normalize_combination_key(combination_key);
                record.choice_availability.get(&key).copied().unwrap_or(true)
            }
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    /// Selecting the same options in any order produces the same key
    #[test]
    fn prop_combination_key_order_independent() {
        proptest!(|(ids in prop::collection::vec("[a-z0-9]{1,6}", 1..6))| {
            let mut reversed = ids.clone();
            reversed.reverse();
            prop_assert_eq!(combination_key(&ids), combination_key(&reversed));
        });
    }

    /// Normalizing an already-normalized key changes nothing
    #[test]
    fn prop_normalization_is_idempotent() {
        proptest!(|(ids in prop::collection::vec("[a-z0-9]{1,6}", 0..6))| {
            let key = combination_key(&ids);
            prop_assert_eq!(normalize_combination_key(&key), key);
        });
    }
}
