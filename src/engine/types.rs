// Domain type definitions for the Booking Engine
// Provides shared types used across the pricing, availability and content engines

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Normalized product identifier
///
/// Product ids reach the engine both as integers and as strings. They are
/// normalized once here so every lookup uses the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(raw: &str) -> Self {
        ProductId::new(raw)
    }
}

impl From<i64> for ProductId {
    fn from(raw: i64) -> Self {
        ProductId(raw.to_string())
    }
}

/// Participant category used for pricing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantCategory {
    Adult,
    Child,
    Infant,
}

impl ParticipantCategory {
    pub const ALL: [ParticipantCategory; 3] = [
        ParticipantCategory::Adult,
        ParticipantCategory::Child,
        ParticipantCategory::Infant,
    ];
}

impl fmt::Display for ParticipantCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantCategory::Adult => write!(f, "adult"),
            ParticipantCategory::Child => write!(f, "child"),
            ParticipantCategory::Infant => write!(f, "infant"),
        }
    }
}

/// Age boundaries separating participant categories
///
/// Ages up to and including `infant_max_age` are infants, ages up to and
/// including `child_max_age` are children, everyone older is an adult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AgeBands {
    pub infant_max_age: u8,
    pub child_max_age: u8,
}

impl Default for AgeBands {
    fn default() -> Self {
        Self {
            infant_max_age: 2,
            child_max_age: 12,
        }
    }
}

impl AgeBands {
    /// Classify an age into its participant category
    pub fn categorize(&self, age: u8) -> ParticipantCategory {
        if age <= self.infant_max_age {
            ParticipantCategory::Infant
        } else if age <= self.child_max_age {
            ParticipantCategory::Child
        } else {
            ParticipantCategory::Adult
        }
    }
}

/// Bookable product, immutable for the duration of a booking session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Base adult price per participant
    pub base_price: Decimal,
    pub age_bands: AgeBands,
    /// Departure is confirmed once this many participants are booked on a date
    pub min_participants: u32,
    pub max_participants: u32,
}

/// Per-category unit prices for one date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CategoryPrices {
    pub adult: Decimal,
    pub child: Decimal,
    pub infant: Decimal,
}

impl CategoryPrices {
    /// Prices used when no override exists: adults pay the base price,
    /// children and infants travel free.
    pub fn base(base_price: Decimal) -> Self {
        Self {
            adult: base_price,
            child: Decimal::ZERO,
            infant: Decimal::ZERO,
        }
    }

    pub fn for_category(&self, category: ParticipantCategory) -> Decimal {
        match category {
            ParticipantCategory::Adult => self.adult,
            ParticipantCategory::Child => self.child,
            ParticipantCategory::Infant => self.infant,
        }
    }
}

/// Head counts per participant category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Participants {
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
}

impl Participants {
    pub fn new(adults: u32, children: u32, infants: u32) -> Self {
        Self {
            adults,
            children,
            infants,
        }
    }

    /// Head count across categories, saturating at `u32::MAX`
    pub fn total(&self) -> u32 {
        self.adults
            .saturating_add(self.children)
            .saturating_add(self.infants)
    }

    pub fn count(&self, category: ParticipantCategory) -> u32 {
        match category {
            ParticipantCategory::Adult => self.adults,
            ParticipantCategory::Child => self.children,
            ParticipantCategory::Infant => self.infants,
        }
    }
}

/// Type of discount carried by a coupon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Discount is a percentage of the subtotal (e.g., 10 = 10% off)
    Percentage,

    /// Discount is a fixed amount subtracted from the subtotal
    Fixed,
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscountType::Percentage => write!(f, "percentage"),
            DiscountType::Fixed => write!(f, "fixed"),
        }
    }
}

impl FromStr for DiscountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "percentage" | "percent" => Ok(DiscountType::Percentage),
            "fixed" | "fixed_amount" => Ok(DiscountType::Fixed),
            _ => Err(format!("Invalid discount type: {}", s)),
        }
    }
}

/// Lifecycle status of a coupon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    Active,
    Inactive,
    Expired,
}

impl fmt::Display for CouponStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CouponStatus::Active => write!(f, "active"),
            CouponStatus::Inactive => write!(f, "inactive"),
            CouponStatus::Expired => write!(f, "expired"),
        }
    }
}

impl FromStr for CouponStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(CouponStatus::Active),
            "inactive" => Ok(CouponStatus::Inactive),
            "expired" => Ok(CouponStatus::Expired),
            _ => Err(format!("Invalid coupon status: {}", s)),
        }
    }
}

/// Aggregate demand state displayed for a date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DemandState {
    Open,
    Filling,
    Confirmed,
    NearlyFull,
    Closed,
}

impl fmt::Display for DemandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemandState::Open => write!(f, "open"),
            DemandState::Filling => write!(f, "filling"),
            DemandState::Confirmed => write!(f, "confirmed"),
            DemandState::NearlyFull => write!(f, "nearly_full"),
            DemandState::Closed => write!(f, "closed"),
        }
    }
}
