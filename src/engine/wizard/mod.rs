// Booking Wizard State
//
// Immutable aggregate of everything a shopper has entered, plus the step gate that
// decides whether the wizard may move forward. Every user action returns a new
// state; pricing, availability and the coupon discount are recomputed from it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;
use validator::Validate;

use crate::engine::{
    availability::{AvailabilityEvaluator, BookedCounts, OptionAvailability},
    catalog::{ChoiceCatalog, Selections},
    coupon::{Coupon, CouponValidator},
    error::{EngineError, EngineResult},
    pricing::{PriceBreakdown, PricingCalculator},
    pricing_index::DatePricingIndex,
    types::{DemandState, Participants, Product},
};
use crate::validation::validate_not_blank;

/// Wizard steps, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    SelectDate,
    RequiredChoices,
    OptionalChoices,
    GuestInfo,
    Payment,
}

impl WizardStep {
    pub const ALL: [WizardStep; 5] = [
        WizardStep::SelectDate,
        WizardStep::RequiredChoices,
        WizardStep::OptionalChoices,
        WizardStep::GuestInfo,
        WizardStep::Payment,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn next(&self) -> Option<WizardStep> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn previous(&self) -> Option<WizardStep> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardStep::SelectDate => write!(f, "select_date"),
            WizardStep::RequiredChoices => write!(f, "required_choices"),
            WizardStep::OptionalChoices => write!(f, "optional_choices"),
            WizardStep::GuestInfo => write!(f, "guest_info"),
            WizardStep::Payment => write!(f, "payment"),
        }
    }
}

/// Lead guest contact details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct GuestInfo {
    #[validate(custom = "validate_not_blank")]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(custom = "validate_not_blank")]
    pub phone: String,

    #[validate(custom = "validate_not_blank")]
    pub country: String,

    #[validate(custom = "validate_not_blank")]
    pub native_language: String,
}

/// Reason the wizard cannot leave its current step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("Booking data is still loading")]
    SessionNotLoaded,

    #[error("Please select a travel date")]
    DateNotSelected,

    #[error("{0} is not available for booking")]
    DateClosed(NaiveDate),

    #[error("At least one adult is required")]
    NoAdults,

    #[error("{total} participants exceed the maximum of {max}")]
    TooManyParticipants { total: u32, max: u32 },

    #[error("Only {remaining} seats left on {date}")]
    NotEnoughSeats { date: NaiveDate, remaining: u32 },

    #[error("Please choose: {}", .0.join(", "))]
    MissingRequiredChoice(Vec<String>),

    #[error("The selected combination is sold out for this date")]
    CombinationClosed,

    #[error("Invalid guest details: {}", .0.join(", "))]
    InvalidGuestInfo(Vec<String>),

    #[error("Already at the last step")]
    AlreadyAtLastStep,
}

/// Data loaded once per product for a booking session
#[derive(Debug, Clone)]
pub struct LoadedSession {
    pub product: Product,
    pub pricing: DatePricingIndex,
    pub catalog: ChoiceCatalog,
    pub booked: BookedCounts,
}

/// Immutable booking wizard state
///
/// `generation` identifies the load a session belongs to. Closing the wizard
/// bumps it so a load that finishes afterwards is dropped.
#[derive(Debug, Clone, Default)]
pub struct BookingState {
    step: WizardStep,
    generation: u64,
    session: Option<Arc<LoadedSession>>,
    date: Option<NaiveDate>,
    participants: Participants,
    selections: Selections,
    guest: GuestInfo,
    coupon: Option<Coupon>,
}

impl BookingState {
    pub fn new() -> Self {
        Self {
            participants: Participants::new(1, 0, 0),
            ..Self::default()
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    /// Generation a load started now must present to be accepted
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn session(&self) -> Option<&LoadedSession> {
        self.session.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn participants(&self) -> Participants {
        self.participants
    }

    pub fn selections(&self) -> &Selections {
        &self.selections
    }

    pub fn guest(&self) -> &GuestInfo {
        &self.guest
    }

    pub fn coupon(&self) -> Option<&Coupon> {
        self.coupon.as_ref()
    }

    /// Attach loaded session data
    ///
    /// A result from an older generation is discarded. When no required
    /// choice has been made yet the catalog defaults are preselected.
    pub fn with_loaded(self, generation: u64, session: Arc<LoadedSession>) -> Self {
        if generation != self.generation {
            tracing::debug!(
                "Discarding stale session load (generation {}, current {})",
                generation,
                self.generation
            );
            return self;
        }

        let selections = if self.selections.required.is_empty() {
            Selections {
                required: session.catalog.default_selections().required,
                optional: self.selections.optional.clone(),
            }
        } else {
            self.selections.clone()
        };

        Self {
            session: Some(session),
            selections,
            ..self
        }
    }

    /// Close the wizard; in-flight loads become stale
    pub fn close(self) -> Self {
        Self {
            generation: self.generation + 1,
            session: None,
            step: WizardStep::SelectDate,
            ..self
        }
    }

    pub fn with_date(self, date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..self
        }
    }

    pub fn with_participants(self, participants: Participants) -> Self {
        Self { participants, ..self }
    }

    pub fn select_required(self, group_id: &str, option_id: &str) -> Self {
        let selections = self.selections.clone().with_required(group_id, option_id);
        Self { selections, ..self }
    }

    pub fn toggle_optional(self, option_id: &str) -> Self {
        let selections = self.selections.clone().toggled(option_id);
        Self { selections, ..self }
    }

    pub fn with_selections(self, selections: Selections) -> Self {
        Self { selections, ..self }
    }

    pub fn with_guest(self, guest: GuestInfo) -> Self {
        Self { guest, ..self }
    }

    /// Hold an already validated coupon; its amount follows the subtotal
    pub fn with_coupon(self, coupon: Coupon) -> Self {
        Self {
            coupon: Some(coupon),
            ..self
        }
    }

    pub fn without_coupon(self) -> Self {
        Self { coupon: None, ..self }
    }

    /// Check the guard of the current step
    pub fn check_step(&self) -> Result<(), StepError> {
        self.check(self.step)
    }

    /// Check the guard of every step up to and including `step`
    pub fn check_through(&self, step: WizardStep) -> Result<(), StepError> {
        WizardStep::ALL
            .iter()
            .take_while(|s| **s <= step)
            .try_for_each(|s| self.check(*s))
    }

    /// Move forward one step if the current step's guard holds
    pub fn advance(&self) -> Result<Self, StepError> {
        let next = self.step.next().ok_or(StepError::AlreadyAtLastStep)?;
        self.check_step()?;
        Ok(Self {
            step: next,
            ..self.clone()
        })
    }

    /// Move back one step, keeping everything already entered
    pub fn back(&self) -> Self {
        Self {
            step: self.step.previous().unwrap_or(self.step),
            ..self.clone()
        }
    }

    fn check(&self, step: WizardStep) -> Result<(), StepError> {
        match step {
            WizardStep::SelectDate => {
                let session = self.session().ok_or(StepError::SessionNotLoaded)?;
                let date = self.date.ok_or(StepError::DateNotSelected)?;
                if !session.pricing.is_date_open(date) {
                    return Err(StepError::DateClosed(date));
                }
                Ok(())
            }
            WizardStep::RequiredChoices => {
                let session = self.session().ok_or(StepError::SessionNotLoaded)?;
                if self.participants.adults == 0 {
                    return Err(StepError::NoAdults);
                }
                let total = self.participants.total();
                let max = session.product.max_participants;
                if max > 0 && total > max {
                    return Err(StepError::TooManyParticipants { total, max });
                }
                if let (true, Some(date)) = (max > 0, self.date) {
                    let remaining = max.saturating_sub(session.booked.on(date));
                    if total > remaining {
                        return Err(StepError::NotEnoughSeats { date, remaining });
                    }
                }

                let missing: Vec<String> = session
                    .catalog
                    .missing_groups(&self.selections)
                    .into_iter()
                    .map(|group| group.name.clone())
                    .collect();
                if !missing.is_empty() {
                    return Err(StepError::MissingRequiredChoice(missing));
                }

                if !AvailabilityEvaluator::is_current_selection_open(&session.pricing, &self.selections, self.date) {
                    return Err(StepError::CombinationClosed);
                }
                Ok(())
            }
            WizardStep::OptionalChoices => Ok(()),
            WizardStep::GuestInfo => self.guest.validate().map_err(|errors| {
                let mut fields: Vec<String> = errors
                    .field_errors()
                    .keys()
                    .map(|field| field.to_string())
                    .collect();
                fields.sort();
                StepError::InvalidGuestInfo(fields)
            }),
            // Readiness is signalled by the payment collaborator
            WizardStep::Payment => Ok(()),
        }
    }

    /// Current itemized price including the held coupon's discount
    pub fn quote(&self) -> EngineResult<PriceBreakdown> {
        let session = self.session().ok_or(EngineError::SessionNotLoaded)?;
        let date = self.date.ok_or(EngineError::DateNotSelected)?;

        let breakdown = PricingCalculator::breakdown(
            &session.pricing,
            date,
            &self.participants,
            &self.selections,
            &session.catalog,
        );
        let discount = self
            .coupon
            .as_ref()
            .map(|coupon| CouponValidator::discount(coupon, breakdown.subtotal))
            .unwrap_or_default();

        Ok(breakdown.with_discount(discount))
    }

    /// Open flags for each option of a required group
    pub fn option_availability(&self, group_id: &str) -> Vec<OptionAvailability> {
        match self.session() {
            Some(session) => AvailabilityEvaluator::group_options(
                &session.pricing,
                &session.catalog,
                group_id,
                &self.selections,
                self.date,
            ),
            None => Vec::new(),
        }
    }

    /// Demand state of the selected date
    pub fn demand_state(&self) -> Option<DemandState> {
        let session = self.session()?;
        let date = self.date?;
        Some(AvailabilityEvaluator::demand_state(
            &session.pricing,
            &session.product,
            date,
            session.booked.on(date),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::catalog::RawChoiceRow;
    use crate::engine::pricing_index::DatePricingRecord;
    use crate::engine::types::{AgeBands, CouponStatus, DiscountType, ProductId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

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
            max_participants: 6,
        }
    }

    fn choice_row(group: &str, option: &str, required: bool, adjustment: Decimal, is_default: bool) -> RawChoiceRow {
        RawChoiceRow {
            group_id: group.to_string(),
            group_name: format!("{} group", group),
            group_description: None,
            is_required: required,
            option_id: option.to_string(),
            option_name: format!("{} option", option),
            price_adjustment: adjustment,
            adult_adjustment: None,
            child_adjustment: None,
            infant_adjustment: None,
            is_default,
            image_url: None,
            sort_order: 0,
        }
    }

    fn session() -> Arc<LoadedSession> {
        let product = product();
        let records = vec![
            DatePricingRecord {
                date: date("2025-11-05"),
                adult_price: Some(dec!(120)),
                child_price: None,
                infant_price: None,
                sale_available: true,
                choice_availability: [("optA".to_string(), false)].into_iter().collect(),
            },
            DatePricingRecord {
                date: date("2025-11-06"),
                adult_price: None,
                child_price: None,
                infant_price: None,
                sale_available: false,
                choice_availability: HashMap::new(),
            },
        ];
        let pricing = DatePricingIndex::from_records(&product, date("2025-11-01"), date("2025-12-31"), records);
        let catalog = ChoiceCatalog::build(vec![
            choice_row("ticket", "optA", true, dec!(0), false),
            choice_row("ticket", "optB", true, dec!(10), true),
            choice_row("lunch", "lunch", false, dec!(15), false),
        ]);

        Arc::new(LoadedSession {
            product,
            pricing,
            catalog,
            booked: BookedCounts::default(),
        })
    }

    fn guest() -> GuestInfo {
        GuestInfo {
            name: "Jin Park".to_string(),
            email: "jin@example.com".to_string(),
            phone: "+82 10 1234 5678".to_string(),
            country: "KR".to_string(),
            native_language: "ko".to_string(),
        }
    }

    fn loaded() -> BookingState {
        let state = BookingState::new();
        let generation = state.generation();
        state.with_loaded(generation, session())
    }

    #[test]
    fn test_step_order() {
        assert_eq!(WizardStep::SelectDate.next(), Some(WizardStep::RequiredChoices));
        assert_eq!(WizardStep::Payment.next(), None);
        assert_eq!(WizardStep::SelectDate.previous(), None);
        assert_eq!(WizardStep::GuestInfo.previous(), Some(WizardStep::OptionalChoices));
    }

    #[test]
    fn test_cannot_advance_before_load() {
        let state = BookingState::new().with_date(date("2025-11-05"));
        assert_eq!(state.advance().unwrap_err(), StepError::SessionNotLoaded);
    }

    #[test]
    fn test_select_date_guards() {
        let state = loaded();
        assert_eq!(state.advance().unwrap_err(), StepError::DateNotSelected);

        let closed = state.clone().with_date(date("2025-11-06"));
        assert_eq!(closed.advance().unwrap_err(), StepError::DateClosed(date("2025-11-06")));

        let open = state.with_date(date("2025-12-25"));
        assert_eq!(open.advance().unwrap().step(), WizardStep::RequiredChoices);
    }

    #[test]
    fn test_defaults_preselected_on_load() {
        let state = loaded();
        assert_eq!(state.selections().required.get("ticket").map(String::as_str), Some("optB"));
    }

    #[test]
    fn test_required_choices_guards() {
        let state = loaded().with_date(date("2025-12-25")).advance().unwrap();

        let no_adults = state.clone().with_participants(Participants::new(0, 2, 0));
        assert_eq!(no_adults.advance().unwrap_err(), StepError::NoAdults);

        let too_many = state.clone().with_participants(Participants::new(5, 2, 0));
        assert_eq!(
            too_many.advance().unwrap_err(),
            StepError::TooManyParticipants { total: 7, max: 6 }
        );

        let missing = state.clone().with_selections(Selections::default());
        assert_eq!(
            missing.advance().unwrap_err(),
            StepError::MissingRequiredChoice(vec!["ticket group".to_string()])
        );

        assert_eq!(state.advance().unwrap().step(), WizardStep::OptionalChoices);
    }

    #[test]
    fn test_overflowing_head_count_is_too_many() {
        let state = loaded()
            .with_date(date("2025-12-25"))
            .advance()
            .unwrap()
            .with_participants(Participants::new(u32::MAX, 1, 0));
        assert_eq!(
            state.advance().unwrap_err(),
            StepError::TooManyParticipants { total: u32::MAX, max: 6 }
        );
    }

    #[test]
    fn test_booked_seats_limit_party_size() {
        let mut booked_session = (*session()).clone();
        booked_session.booked = BookedCounts::new([(date("2025-12-25"), 5)].into_iter().collect());
        let state = BookingState::new();
        let generation = state.generation();
        let state = state
            .with_loaded(generation, Arc::new(booked_session))
            .with_date(date("2025-12-25"))
            .advance()
            .unwrap();

        let party = state.clone().with_participants(Participants::new(2, 0, 0));
        assert_eq!(
            party.advance().unwrap_err(),
            StepError::NotEnoughSeats { date: date("2025-12-25"), remaining: 1 }
        );

        let single = state.with_participants(Participants::new(1, 0, 0));
        assert_eq!(single.advance().unwrap().step(), WizardStep::OptionalChoices);
    }

    #[test]
    fn test_closed_combination_blocks_progress() {
        let state = loaded()
            .with_date(date("2025-11-05"))
            .advance()
            .unwrap()
            .select_required("ticket", "optA");
        assert_eq!(state.advance().unwrap_err(), StepError::CombinationClosed);

        let availability = state.option_availability("ticket");
        assert_eq!(
            availability,
            vec![
                OptionAvailability { option_id: "optA".to_string(), open: false },
                OptionAvailability { option_id: "optB".to_string(), open: true },
            ]
        );
    }

    #[test]
    fn test_guest_info_guard() {
        let state = loaded()
            .with_date(date("2025-12-25"))
            .advance()
            .and_then(|s| s.advance())
            .and_then(|s| s.advance())
            .unwrap();
        assert_eq!(state.step(), WizardStep::GuestInfo);

        let bad = state.clone().with_guest(GuestInfo {
            email: "not-an-email".to_string(),
            phone: " ".to_string(),
            ..guest()
        });
        assert_eq!(
            bad.advance().unwrap_err(),
            StepError::InvalidGuestInfo(vec!["email".to_string(), "phone".to_string()])
        );

        let good = state.with_guest(guest()).advance().unwrap();
        assert_eq!(good.step(), WizardStep::Payment);
        assert_eq!(good.advance().unwrap_err(), StepError::AlreadyAtLastStep);
        assert!(good.check_through(WizardStep::Payment).is_ok());
    }

    #[test]
    fn test_back_keeps_data() {
        let state = loaded()
            .with_date(date("2025-12-25"))
            .advance()
            .unwrap()
            .toggle_optional("lunch");
        let back = state.back();

        assert_eq!(back.step(), WizardStep::SelectDate);
        assert_eq!(back.date(), Some(date("2025-12-25")));
        assert!(back.selections().optional.contains("lunch"));
        assert_eq!(back.back().step(), WizardStep::SelectDate);
    }

    #[test]
    fn test_quote_requires_date() {
        assert!(matches!(BookingState::new().quote(), Err(EngineError::SessionNotLoaded)));
        assert!(matches!(loaded().quote(), Err(EngineError::DateNotSelected)));
    }

    #[test]
    fn test_quote_uses_override_price() {
        let state = loaded()
            .with_date(date("2025-11-05"))
            .with_participants(Participants::new(2, 0, 0));
        let quote = state.quote().unwrap();

        // 120 x 2 adults + optB adjustment 10 x 2 participants
        assert_eq!(quote.subtotal, dec!(260));
        assert_eq!(quote.total, dec!(260));
    }

    #[test]
    fn test_coupon_discount_follows_subtotal() {
        let coupon = Coupon {
            code: "SAVE10".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: dec!(10),
            status: CouponStatus::Active,
            product_id: None,
            channel_id: None,
            start_date: None,
            end_date: None,
        };
        let state = loaded()
            .with_date(date("2025-12-25"))
            .with_participants(Participants::new(2, 0, 0))
            .select_required("ticket", "optA")
            .with_coupon(coupon);
        assert_eq!(state.quote().unwrap().discount, dec!(20));

        let larger = state.with_participants(Participants::new(3, 0, 0));
        let quote = larger.quote().unwrap();
        assert_eq!(quote.discount, dec!(30));
        assert_eq!(quote.total, dec!(270));

        assert_eq!(larger.without_coupon().quote().unwrap().discount, Decimal::ZERO);
    }

    #[test]
    fn test_stale_load_discarded_after_close() {
        let state = BookingState::new();
        let generation = state.generation();
        let closed = state.close();

        let late = closed.with_loaded(generation, session());
        assert!(!late.is_loaded());

        let current = late.generation();
        assert!(late.with_loaded(current, session()).is_loaded());
    }

    #[test]
    fn test_demand_state_for_selected_date() {
        assert_eq!(loaded().demand_state(), None);
        assert_eq!(
            loaded().with_date(date("2025-11-06")).demand_state(),
            Some(DemandState::Closed)
        );
        assert_eq!(
            loaded().with_date(date("2025-12-25")).demand_state(),
            Some(DemandState::Open)
        );
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn step_strategy() -> impl Strategy<Value = WizardStep> {
        prop::sample::select(WizardStep::ALL.to_vec())
    }

    /// Moving back never clears entered data and never skips a step
    #[test]
    fn prop_back_preserves_data() {
        proptest!(|(step in step_strategy(), adults in 0u32..10, children in 0u32..10)| {
            let state = BookingState {
                step,
                participants: Participants::new(adults, children, 0),
                ..BookingState::new()
            }
            .toggle_optional("lunch");

            let back = state.back();
            prop_assert_eq!(back.participants(), state.participants());
            prop_assert_eq!(back.selections(), state.selections());
            prop_assert!(back.step().index() + 1 >= state.step().index());
            prop_assert!(back.step() <= state.step());
        });
    }
}
