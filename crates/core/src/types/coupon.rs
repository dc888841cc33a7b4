//! Discount coupons.
//!
//! Coupons live in the admin settings document. Lookup is by normalized code
//! (trimmed, upper-cased) against active coupons only, and the first listed
//! match wins; uniqueness is not enforced on write.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::CouponId;

/// How a coupon's `value` is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponKind {
    /// `value` is a percentage of the subtotal (0-100).
    Percentage,
    /// `value` is an absolute amount in the checkout currency.
    Fixed,
}

/// A discount coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: CouponKind,
    pub value: Decimal,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

/// Validation failures for admin-created coupons.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("coupon code must not be empty")]
    EmptyCode,

    #[error("coupon value must not be negative")]
    NegativeValue,

    #[error("percentage coupons cannot exceed 100%")]
    PercentageOutOfRange,
}

/// Normalize user input for coupon matching.
///
/// ```rust
/// use styleswap_core::normalize_code;
///
/// assert_eq!(normalize_code(" love20 "), "LOVE20");
/// ```
#[must_use]
pub fn normalize_code(input: &str) -> String {
    input.trim().to_uppercase()
}

/// Find the first active coupon whose code matches `input` after normalization.
#[must_use]
pub fn find_coupon<'a>(coupons: &'a [Coupon], input: &str) -> Option<&'a Coupon> {
    let code = normalize_code(input);
    if code.is_empty() {
        return None;
    }
    coupons.iter().find(|c| c.is_active && c.code == code)
}

impl Coupon {
    /// Build a new active coupon with a normalized code.
    pub fn new(code: &str, kind: CouponKind, value: Decimal) -> Result<Self, CouponError> {
        let coupon = Self {
            id: CouponId::generate(),
            code: normalize_code(code),
            kind,
            value,
            is_active: true,
        };
        coupon.validate()?;
        Ok(coupon)
    }

    /// Check the invariants the admin surface enforces before saving.
    pub fn validate(&self) -> Result<(), CouponError> {
        if self.code.trim().is_empty() {
            return Err(CouponError::EmptyCode);
        }
        if self.value < Decimal::ZERO {
            return Err(CouponError::NegativeValue);
        }
        if self.kind == CouponKind::Percentage && self.value > Decimal::ONE_HUNDRED {
            return Err(CouponError::PercentageOutOfRange);
        }
        Ok(())
    }

    /// Discount this coupon grants on `subtotal`.
    ///
    /// Always within `0..=subtotal`.
    #[must_use]
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let raw = match self.kind {
            CouponKind::Percentage => subtotal * self.value / Decimal::ONE_HUNDRED,
            CouponKind::Fixed => self.value,
        };
        raw.clamp(Decimal::ZERO, subtotal)
    }
}
