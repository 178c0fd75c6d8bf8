// Pricing Calculator
//
// Composes the date's per-category unit prices with required and optional choice
// adjustments into a pre-discount subtotal. Amounts accumulate in full precision;
// rounding to two places happens only at the display boundary.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::engine::{
    catalog::{ChoiceCatalog, ChoiceOption, Selections},
    pricing_index::DatePricingIndex,
    types::{CategoryPrices, ParticipantCategory, Participants},
};

/// Price contribution of one selected option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SelectionLine {
    pub group_id: String,
    pub option_id: String,
    pub option_name: String,
    pub required: bool,
    pub total: Decimal,
}

/// Itemized price for one date, participant mix and selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PriceBreakdown {
    pub date: NaiveDate,
    pub participants: Participants,
    pub unit_prices: CategoryPrices,
    /// Participants times unit prices, before choice adjustments
    pub base_total: Decimal,
    pub selection_lines: Vec<SelectionLine>,
    /// Pre-discount total
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl PriceBreakdown {
    /// Apply a discount, clamped so the total never goes negative
    pub fn with_discount(self, discount: Decimal) -> Self {
        let discount = discount.max(Decimal::ZERO).min(self.subtotal.max(Decimal::ZERO));
        let total = (self.subtotal - discount).max(Decimal::ZERO);
        Self {
            discount,
            total,
            ..self
        }
    }

    /// Total rounded for display
    pub fn display_total(&self) -> Decimal {
        round_for_display(self.total)
    }
}

/// Round a monetary amount to two places, half away from zero
pub fn round_for_display(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Pricing Calculator
///
/// Stateless; every call recomputes from its arguments.
pub struct PricingCalculator;

impl PricingCalculator {
    /// Pre-discount total for a date
    pub fn total(
        index: &DatePricingIndex,
        date: NaiveDate,
        participants: &Participants,
        selections: &Selections,
        catalog: &ChoiceCatalog,
    ) -> Decimal {
        Self::breakdown(index, date, participants, selections, catalog).subtotal
    }

    /// Itemized pre-discount price
    ///
    /// Selections naming unknown groups or options contribute nothing.
    pub fn breakdown(
        index: &DatePricingIndex,
        date: NaiveDate,
        participants: &Participants,
        selections: &Selections,
        catalog: &ChoiceCatalog,
    ) -> PriceBreakdown {
        let unit_prices = index.price_for(date);
        let base_total: Decimal = ParticipantCategory::ALL
            .iter()
            .map(|category| unit_prices.for_category(*category) * Decimal::from(participants.count(*category)))
            .sum();

        let mut selection_lines = Vec::new();

        for (group_id, option_id) in &selections.required {
            let Some(option) = catalog
                .required_group(group_id)
                .and_then(|group| group.option(option_id))
            else {
                tracing::debug!("Ignoring unknown selection {}={}", group_id, option_id);
                continue;
            };
            selection_lines.push(SelectionLine {
                group_id: group_id.clone(),
                option_id: option.id.clone(),
                option_name: option.name.clone(),
                required: true,
                total: Self::option_total(option, participants),
            });
        }

        for option_id in &selections.optional {
            let Some(option) = catalog.optional_option(option_id) else {
                tracing::debug!("Ignoring unknown add-on {}", option_id);
                continue;
            };
            selection_lines.push(SelectionLine {
                group_id: option.id.clone(),
                option_id: option.id.clone(),
                option_name: option.name.clone(),
                required: false,
                total: Self::option_total(option, participants),
            });
        }

        let subtotal = base_total + selection_lines.iter().map(|line| line.total).sum::<Decimal>();

        PriceBreakdown {
            date,
            participants: *participants,
            unit_prices,
            base_total,
            selection_lines,
            subtotal,
            discount: Decimal::ZERO,
            total: subtotal,
        }
    }

    /// Adjustment times head count, per category
    fn option_total(option: &ChoiceOption, participants: &Participants) -> Decimal {
        ParticipantCategory::ALL
            .iter()
            .map(|category| option.adjustment_for(*category) * Decimal::from(participants.count(*category)))
            .sum()
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::engine::catalog::RawChoiceRow;
    use crate::engine::types::{AgeBands, Product, ProductId};
    use proptest::prelude::*;

    fn fixtures(base_cents: u32, adjustment_cents: u32) -> (DatePricingIndex, ChoiceCatalog) {
        let product = Product {
            id: ProductId::new("P-1"),
            name: "Tour".to_string(),
            base_price: Decimal::from(base_cents) / Decimal::from(100),
            age_bands: AgeBands::default(),
            min_participants: 1,
            max_participants: 50,
        };
        let day = NaiveDate::from_ymd_opt(2025, 11, 5).unwrap();
        let index = DatePricingIndex::empty(&product, day, day);
        let catalog = ChoiceCatalog::build(vec![RawChoiceRow {
            group_id: "extras".to_string(),
            group_name: "Extras".to_string(),
            group_description: None,
            is_required: false,
            option_id: "lunch".to_string(),
            option_name: "Lunch".to_string(),
            price_adjustment: Decimal::from(adjustment_cents) / Decimal::from(100),
            adult_adjustment: None,
            child_adjustment: None,
            infant_adjustment: None,
            is_default: false,
            image_url: None,
            sort_order: 0,
        }]);
        (index, catalog)
    }

    /// One more adult adds exactly the adult unit price plus selected adjustments
    #[test]
    fn prop_adult_monotonicity() {
        proptest!(|(
            base_cents in 1u32..=100000,
            adjustment_cents in 0u32..=5000,
            adults in 1u32..=20,
            children in 0u32..=5,
            with_lunch in any::<bool>(),
        )| {
            let (index, catalog) = fixtures(base_cents, adjustment_cents);
            let day = NaiveDate::from_ymd_opt(2025, 11, 5).unwrap();
            let selections = if with_lunch {
                Selections::default().with_optional("lunch")
            } else {
                Selections::default()
            };

            let before = PricingCalculator::total(&index, day, &Participants::new(adults, children, 0), &selections, &catalog);
            let after = PricingCalculator::total(&index, day, &Participants::new(adults + 1, children, 0), &selections, &catalog);

            let mut expected = index.price_for(day).adult;
            if with_lunch {
                expected += Decimal::from(adjustment_cents) / Decimal::from(100);
            }
            prop_assert_eq!(after - before, expected);
            prop_assert!(after > before);
        });
    }

    /// Recomputing with identical arguments yields identical results
    #[test]
    fn prop_recomputation_is_idempotent() {
        proptest!(|(
            base_cents in 1u32..=100000,
            adjustment_cents in 0u32..=5000,
            adults in 1u32..=20,
            infants in 0u32..=3,
        )| {
            let (index, catalog) = fixtures(base_cents, adjustment_cents);
            let day = NaiveDate::from_ymd_opt(2025, 11, 5).unwrap();
            let selections = Selections::default().with_optional("lunch");
            let participants = Participants::new(adults, 0, infants);

            let first = PricingCalculator::breakdown(&index, day, &participants, &selections, &catalog);
            let second = PricingCalculator::breakdown(&index, day, &participants, &selections, &catalog);
            prop_assert_eq!(first, second);
        });
    }
}
