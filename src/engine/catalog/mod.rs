// Choice Catalog
//
// Normalizes raw choice/option rows into required groups (single-select, purchase
// blocking) and optional add-ons (one synthesized group per option).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use utoipa::ToSchema;

use crate::engine::{
    store::BookingStore,
    types::{ParticipantCategory, Product},
};

/// Choice row as stored: one row per option, group columns repeated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChoiceRow {
    pub group_id: String,
    pub group_name: String,
    pub group_description: Option<String>,
    pub is_required: bool,
    pub option_id: String,
    pub option_name: String,
    pub price_adjustment: Decimal,
    pub adult_adjustment: Option<Decimal>,
    pub child_adjustment: Option<Decimal>,
    pub infant_adjustment: Option<Decimal>,
    pub is_default: bool,
    pub image_url: Option<String>,
    pub sort_order: i32,
}

/// One selectable option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChoiceOption {
    pub id: String,
    pub name: String,
    /// Flat per-participant adjustment
    pub price_adjustment: Decimal,
    pub adult_adjustment: Option<Decimal>,
    pub child_adjustment: Option<Decimal>,
    pub infant_adjustment: Option<Decimal>,
    pub is_default: bool,
    pub image_url: Option<String>,
}

impl ChoiceOption {
    /// Adjustment charged per participant of the given category
    ///
    /// A category-specific value overrides the flat adjustment.
    pub fn adjustment_for(&self, category: ParticipantCategory) -> Decimal {
        let specific = match category {
            ParticipantCategory::Adult => self.adult_adjustment,
            ParticipantCategory::Child => self.child_adjustment,
            ParticipantCategory::Infant => self.infant_adjustment,
        };
        specific.unwrap_or(self.price_adjustment)
    }
}

/// Group of options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChoiceGroup {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
    pub options: Vec<ChoiceOption>,
}

impl ChoiceGroup {
    pub fn option(&self, option_id: &str) -> Option<&ChoiceOption> {
        self.options.iter().find(|option| option.id == option_id)
    }

    /// Option selected on initial load: the flagged default, else the first
    pub fn default_option(&self) -> Option<&ChoiceOption> {
        self.options
            .iter()
            .find(|option| option.is_default)
            .or_else(|| self.options.first())
    }
}

/// Current choice selections
///
/// Required groups map group id to the chosen option id; optional add-ons are
/// a set of option ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Selections {
    #[serde(default)]
    pub required: BTreeMap<String, String>,
    #[serde(default)]
    pub optional: BTreeSet<String>,
}

impl Selections {
    pub fn with_required(mut self, group_id: impl Into<String>, option_id: impl Into<String>) -> Self {
        self.required.insert(group_id.into(), option_id.into());
        self
    }

    pub fn with_optional(mut self, option_id: impl Into<String>) -> Self {
        self.optional.insert(option_id.into());
        self
    }

    /// Toggle an add-on on or off
    pub fn toggled(mut self, option_id: &str) -> Self {
        if !self.optional.remove(option_id) {
            self.optional.insert(option_id.to_string());
        }
        self
    }
}

/// Choice Catalog
///
/// Built once per product; read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChoiceCatalog {
    pub required_groups: Vec<ChoiceGroup>,
    pub optional_groups: Vec<ChoiceGroup>,
}

impl ChoiceCatalog {
    /// Build the catalog from raw rows
    ///
    /// Rows are ordered by `sort_order` (stable, so store order breaks ties),
    /// grouped by group id in first-appearance order.
    pub fn build(rows: Vec<RawChoiceRow>) -> Self {
        let mut rows = rows;
        rows.sort_by_key(|row| row.sort_order);

        let mut required_groups: Vec<ChoiceGroup> = Vec::new();
        let mut optional_groups: Vec<ChoiceGroup> = Vec::new();

        for row in rows {
            let option = ChoiceOption {
                id: row.option_id.clone(),
                name: row.option_name.clone(),
                price_adjustment: row.price_adjustment,
                adult_adjustment: row.adult_adjustment,
                child_adjustment: row.child_adjustment,
                infant_adjustment: row.infant_adjustment,
                is_default: row.is_default,
                image_url: row.image_url.clone(),
            };

            if !row.is_required {
                // An add-on has no internal alternatives
                optional_groups.push(ChoiceGroup {
                    id: row.option_id,
                    name: row.option_name,
                    description: non_empty(row.group_description),
                    required: false,
                    options: vec![option],
                });
                continue;
            }

            match required_groups.iter_mut().find(|group| group.id == row.group_id) {
                Some(group) => {
                    if group.description.is_none() {
                        group.description = non_empty(row.group_description);
                    }
                    if group.option(&option.id).is_none() {
                        group.options.push(option);
                    }
                }
                None => required_groups.push(ChoiceGroup {
                    id: row.group_id,
                    name: row.group_name,
                    description: non_empty(row.group_description),
                    required: true,
                    options: vec![option],
                }),
            }
        }

        Self {
            required_groups,
            optional_groups,
        }
    }

    /// Load and build the catalog for a product
    ///
    /// A failed load is logged and yields an empty catalog.
    pub async fn load(store: &dyn BookingStore, product: &Product) -> Self {
        match store.fetch_choice_rows(&product.id).await {
            Ok(rows) => {
                tracing::debug!("Loaded {} choice rows for product {}", rows.len(), product.id);
                Self::build(rows)
            }
            Err(e) => {
                tracing::warn!("Choice load failed for product {}, no choices offered: {}", product.id, e);
                Self::default()
            }
        }
    }

    pub fn required_group(&self, group_id: &str) -> Option<&ChoiceGroup> {
        self.required_groups.iter().find(|group| group.id == group_id)
    }

    pub fn optional_option(&self, option_id: &str) -> Option<&ChoiceOption> {
        self.optional_groups
            .iter()
            .find_map(|group| group.option(option_id))
    }

    /// Initial selections: one default option per required group
    pub fn default_selections(&self) -> Selections {
        let required = self
            .required_groups
            .iter()
            .filter_map(|group| {
                group
                    .default_option()
                    .map(|option| (group.id.clone(), option.id.clone()))
            })
            .collect();

        Selections {
            required,
            optional: BTreeSet::new(),
        }
    }

    /// Whether every required group has a valid selection
    pub fn is_complete(&self, selections: &Selections) -> bool {
        self.required_groups.iter().all(|group| {
            selections
                .required
                .get(&group.id)
                .is_some_and(|option_id| group.option(option_id).is_some())
        })
    }

    /// Required groups lacking a valid selection
    pub fn missing_groups<'a>(&'a self, selections: &Selections) -> Vec<&'a ChoiceGroup> {
        self.required_groups
            .iter()
            .filter(|group| {
                !selections
                    .required
                    .get(&group.id)
                    .is_some_and(|option_id| group.option(option_id).is_some())
            })
            .collect()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
