// Availability Evaluator
//
// Answers whether a hypothetical required-choice selection is purchasable on a date,
// and which demand state a date displays. Pure functions over loaded data so they
// can be evaluated once per rendered option.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::engine::{
    catalog::{ChoiceCatalog, Selections},
    pricing_index::{combination_key, DatePricingIndex},
    store::BookingStore,
    types::{DemandState, Product},
};

/// Open flag for one option of a required group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OptionAvailability {
    pub option_id: String,
    pub open: bool,
}

/// Availability Evaluator
pub struct AvailabilityEvaluator;

impl AvailabilityEvaluator {
    /// Whether choosing `candidate_option_id` for `group_id` keeps the
    /// combination open on `date`
    ///
    /// Every other required-group selection stays as it is. With no date
    /// selected every combination counts as open.
    pub fn is_selection_open(
        index: &DatePricingIndex,
        group_id: &str,
        candidate_option_id: &str,
        current: &Selections,
        date: Option<NaiveDate>,
    ) -> bool {
        let Some(date) = date else {
            return true;
        };

        let key = Self::hypothetical_key(group_id, candidate_option_id, current);
        index.is_combination_open(date, &key)
    }

    /// Whether the current required selection as a whole is open
    pub fn is_current_selection_open(
        index: &DatePricingIndex,
        current: &Selections,
        date: Option<NaiveDate>,
    ) -> bool {
        let Some(date) = date else {
            return true;
        };

        index.is_combination_open(date, &combination_key(current.required.values()))
    }

    /// Open flags for every option of one required group
    pub fn group_options(
        index: &DatePricingIndex,
        catalog: &ChoiceCatalog,
        group_id: &str,
        current: &Selections,
        date: Option<NaiveDate>,
    ) -> Vec<OptionAvailability> {
        catalog
            .required_group(group_id)
            .map(|group| {
                group
                    .options
                    .iter()
                    .map(|option| OptionAvailability {
                        option_id: option.id.clone(),
                        open: Self::is_selection_open(index, group_id, &option.id, current, date),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn hypothetical_key(group_id: &str, candidate_option_id: &str, current: &Selections) -> String {
        let mut selected = current.required.clone();
        selected.insert(group_id.to_string(), candidate_option_id.to_string());
        combination_key(selected.values())
    }

    /// Demand state for a date
    ///
    /// `booked` is the number of participants already booked on the date.
    pub fn demand_state(
        index: &DatePricingIndex,
        product: &Product,
        date: NaiveDate,
        booked: u32,
    ) -> DemandState {
        if !index.is_date_open(date) {
            return DemandState::Closed;
        }

        let capacity = product.max_participants;
        if capacity > 0 {
            if booked >= capacity {
                return DemandState::Closed;
            }
            let remaining = capacity - booked;
            if remaining <= (capacity / 5).max(1) {
                return DemandState::NearlyFull;
            }
        }

        if product.min_participants > 0 && booked >= product.min_participants {
            DemandState::Confirmed
        } else if booked > 0 {
            DemandState::Filling
        } else {
            DemandState::Open
        }
    }
}

/// Booked participant counts per date
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookedCounts {
    counts: HashMap<NaiveDate, u32>,
}

impl BookedCounts {
    pub fn new(counts: HashMap<NaiveDate, u32>) -> Self {
        Self { counts }
    }

    /// Load booked counts, treating a failed fetch as no bookings
    pub async fn load(
        store: &dyn BookingStore,
        product: &Product,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Self {
        match store.fetch_booked_participants(&product.id, from, to).await {
            Ok(counts) => Self::new(counts),
            Err(e) => {
                tracing::warn!("Booked count load failed for product {}: {}", product.id, e);
                Self::default()
            }
        }
    }

    pub fn on(&self, date: NaiveDate) -> u32 {
        self.counts.get(&date).copied().unwrap_or(0)
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    /// Two groups selected in either order give the same key
    #[test]
    fn prop_selection_order_does_not_change_key() {
        proptest!(|(a in "[a-z]{1,6}", b in "[a-z]{1,6}")| {
            let first = Selections::default().with_required("g1", a.clone()).with_required("g2", b.clone());
            let second = Selections::default().with_required("g2", b).with_required("g1", a);
            prop_assert_eq!(
                combination_key(first.required.values()),
                combination_key(second.required.values())
            );
        });
    }
}
