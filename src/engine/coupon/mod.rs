// Coupon Validator
//
// Checks coupon eligibility (status, validity window, product/channel scope) once at
// apply-time and computes the discount against any subtotal afterwards.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::engine::types::{CouponStatus, DiscountType, ProductId};

/// Coupon as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub status: CouponStatus,
    /// Restricts the coupon to one product when set
    pub product_id: Option<ProductId>,
    /// Restricts the coupon to one sales channel when set
    pub channel_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Reason a coupon cannot be applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("Coupon code not found")]
    NotFound,

    #[error("Coupon is not active")]
    Inactive,

    #[error("Coupon is not valid until {0}")]
    NotYetValid(NaiveDate),

    #[error("Coupon expired on {0}")]
    Expired(NaiveDate),

    #[error("Coupon does not apply to this product")]
    WrongProduct,

    #[error("Coupon does not apply to this sales channel")]
    WrongChannel,
}

/// Normalize a coupon code typed by a shopper
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Coupon Validator
pub struct CouponValidator;

impl CouponValidator {
    /// Check eligibility of a coupon for a booking
    ///
    /// The validity window is inclusive on both ends.
    pub fn validate(
        coupon: &Coupon,
        product_id: &ProductId,
        channel_id: Option<&str>,
        today: NaiveDate,
    ) -> Result<(), CouponRejection> {
        if coupon.status != CouponStatus::Active {
            return Err(CouponRejection::Inactive);
        }

        if let Some(start) = coupon.start_date {
            if today < start {
                return Err(CouponRejection::NotYetValid(start));
            }
        }
        if let Some(end) = coupon.end_date {
            if today > end {
                return Err(CouponRejection::Expired(end));
            }
        }

        if let Some(ref scoped_product) = coupon.product_id {
            if scoped_product != product_id {
                return Err(CouponRejection::WrongProduct);
            }
        }
        if let Some(ref scoped_channel) = coupon.channel_id {
            if channel_id.map(str::trim) != Some(scoped_channel.as_str()) {
                return Err(CouponRejection::WrongChannel);
            }
        }

        Ok(())
    }

    /// Discount for a subtotal, never more than the subtotal itself
    ///
    /// Percentages are clamped to 0..=100.
    pub fn discount(coupon: &Coupon, subtotal: Decimal) -> Decimal {
        if subtotal <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let value = coupon.discount_value.max(Decimal::ZERO);
        let discount = match coupon.discount_type {
            DiscountType::Percentage => subtotal * value.min(Decimal::ONE_HUNDRED) / Decimal::ONE_HUNDRED,
            DiscountType::Fixed => value,
        };
        discount.min(subtotal)
    }

    /// Final price after the coupon
    pub fn final_price(coupon: &Coupon, subtotal: Decimal) -> Decimal {
        (subtotal - Self::discount(coupon, subtotal)).max(Decimal::ZERO)
    }

    /// Validate and compute in one step
    pub fn apply(
        coupon: &Coupon,
        subtotal: Decimal,
        product_id: &ProductId,
        channel_id: Option<&str>,
        today: NaiveDate,
    ) -> Result<Decimal, CouponRejection> {
        Self::validate(coupon, product_id, channel_id, today)?;
        Ok(Self::discount(coupon, subtotal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn save10() -> Coupon {
        Coupon {
            code: "SAVE10".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: dec!(10),
            status: CouponStatus::Active,
            product_id: None,
            channel_id: None,
            start_date: Some(date("2025-01-01")),
            end_date: Some(date("2025-12-31")),
        }
    }

    #[test]
    fn test_percentage_discount() {
        let coupon = save10();
        let product = ProductId::new("P-1");
        let discount = CouponValidator::apply(&coupon, dec!(200), &product, None, date("2025-06-01")).unwrap();
        assert_eq!(discount, dec!(20));
        assert_eq!(CouponValidator::final_price(&coupon, dec!(200)), dec!(180));
    }

    #[test]
    fn test_fixed_discount_clamped_to_subtotal() {
        let coupon = Coupon {
            discount_type: DiscountType::Fixed,
            discount_value: dec!(50),
            ..save10()
        };
        assert_eq!(CouponValidator::discount(&coupon, dec!(30)), dec!(30));
        assert_eq!(CouponValidator::final_price(&coupon, dec!(30)), Decimal::ZERO);
        assert_eq!(CouponValidator::final_price(&coupon, dec!(80)), dec!(30));
    }

    #[test]
    fn test_inactive_rejected() {
        let coupon = Coupon {
            status: CouponStatus::Inactive,
            ..save10()
        };
        let result = CouponValidator::validate(&coupon, &ProductId::new("P-1"), None, date("2025-06-01"));
        assert_eq!(result, Err(CouponRejection::Inactive));
    }

    #[test]
    fn test_validity_window_inclusive() {
        let coupon = save10();
        let product = ProductId::new("P-1");
        assert!(CouponValidator::validate(&coupon, &product, None, date("2025-01-01")).is_ok());
        assert!(CouponValidator::validate(&coupon, &product, None, date("2025-12-31")).is_ok());
        assert_eq!(
            CouponValidator::validate(&coupon, &product, None, date("2024-12-31")),
            Err(CouponRejection::NotYetValid(date("2025-01-01")))
        );
        assert_eq!(
            CouponValidator::validate(&coupon, &product, None, date("2026-01-01")),
            Err(CouponRejection::Expired(date("2025-12-31")))
        );
    }

    #[test]
    fn test_product_and_channel_scope() {
        let coupon = Coupon {
            product_id: Some(ProductId::new("P-1")),
            channel_id: Some("web".to_string()),
            ..save10()
        };
        let today = date("2025-06-01");

        assert!(CouponValidator::validate(&coupon, &ProductId::new("P-1"), Some("web"), today).is_ok());
        assert_eq!(
            CouponValidator::validate(&coupon, &ProductId::new("P-2"), Some("web"), today),
            Err(CouponRejection::WrongProduct)
        );
        assert_eq!(
            CouponValidator::validate(&coupon, &ProductId::new("P-1"), Some("ota"), today),
            Err(CouponRejection::WrongChannel)
        );
        assert_eq!(
            CouponValidator::validate(&coupon, &ProductId::new("P-1"), None, today),
            Err(CouponRejection::WrongChannel)
        );
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  save10 "), "SAVE10");
    }
}
