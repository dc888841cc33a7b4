//! Cart and video pricing.
//!
//! All functions here are pure: they take prices and an already-resolved
//! coupon and return a [`PriceQuote`]. Looking the coupon up and deciding what
//! to do with a zero total is the checkout service's job.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::coupon::Coupon;
use super::id::CartLineId;
use super::price::{CurrencyCode, Price};

/// Studio markup applied on top of the configured video base price.
pub const VIDEO_MARKUP: Decimal = Decimal::from_parts(15, 0, 0, false, 1);

/// Surcharge for each premium video option.
pub const VIDEO_OPTION_SURCHARGE: Decimal = Decimal::from_parts(3, 0, 0, false, 1);

/// One priced item in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: CartLineId,
    pub unit_price: Decimal,
    /// Shown on the payment widget and stored with the transaction.
    #[serde(default)]
    pub style_name: String,
}

/// The items a user is checking out. Only the sum matters for pricing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartSelection(Vec<CartLine>);

impl CartSelection {
    #[must_use]
    pub const fn new(lines: Vec<CartLine>) -> Self {
        Self(lines)
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of unit prices. Negative unit prices count as zero.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.0
            .iter()
            .map(|line| line.unit_price.max(Decimal::ZERO))
            .sum()
    }

    /// IDs of every line, in cart order.
    #[must_use]
    pub fn line_ids(&self) -> Vec<CartLineId> {
        self.0.iter().map(|line| line.id.clone()).collect()
    }
}

/// A computed price breakdown.
///
/// `discount` never exceeds `subtotal` and `total` is never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub currency: CurrencyCode,
    /// Normalized code of the applied coupon, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

impl PriceQuote {
    fn new(subtotal: Decimal, coupon: Option<&Coupon>, currency: CurrencyCode) -> Self {
        let discount = coupon.map_or(Decimal::ZERO, |c| c.discount_for(subtotal));
        Self {
            subtotal,
            discount,
            total: (subtotal - discount).max(Decimal::ZERO),
            currency,
            coupon_code: coupon.map(|c| c.code.clone()),
        }
    }

    /// Whether the payment step has to run at all.
    #[must_use]
    pub fn requires_payment(&self) -> bool {
        self.total > Decimal::ZERO
    }

    /// The amount to charge.
    #[must_use]
    pub const fn charge(&self) -> Price {
        Price::new(self.total, self.currency)
    }
}

/// Price a cart with an optional, already-matched coupon.
#[must_use]
pub fn quote(selection: &CartSelection, coupon: Option<&Coupon>, currency: CurrencyCode) -> PriceQuote {
    PriceQuote::new(selection.subtotal(), coupon, currency)
}

/// Clip length of a rendered video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VideoDuration {
    #[default]
    #[serde(rename = "5")]
    Short,
    #[serde(rename = "8")]
    Long,
}

impl VideoDuration {
    /// Duration value the video provider accepts. It only offers 5 and 10
    /// second clips, so the long option renders 10 seconds.
    #[must_use]
    pub const fn provider_value(&self) -> &'static str {
        match self {
            Self::Short => "5",
            Self::Long => "10",
        }
    }
}

/// Output resolution of a rendered video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VideoResolution {
    #[default]
    #[serde(rename = "540P")]
    P540,
    #[serde(rename = "720P")]
    P720,
    #[serde(rename = "1080P")]
    P1080,
}

/// Options that affect video pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoOptions {
    #[serde(default)]
    pub duration: VideoDuration,
    #[serde(default)]
    pub resolution: VideoResolution,
}

impl VideoOptions {
    /// Sum of option surcharges as a fraction of the base price.
    #[must_use]
    pub fn surcharge(&self) -> Decimal {
        let mut surcharge = Decimal::ZERO;
        if self.duration == VideoDuration::Long {
            surcharge += VIDEO_OPTION_SURCHARGE;
        }
        if self.resolution == VideoResolution::P1080 {
            surcharge += VIDEO_OPTION_SURCHARGE;
        }
        surcharge
    }
}

/// `ceil(base × (1 + surcharges) × 1.5)`.
///
/// ```rust
/// use rust_decimal::Decimal;
/// use styleswap_core::{VideoDuration, VideoOptions, VideoResolution, video_unit_price};
///
/// let options = VideoOptions {
///     duration: VideoDuration::Long,
///     resolution: VideoResolution::P1080,
/// };
/// assert_eq!(video_unit_price(Decimal::from(20), options), Decimal::from(48));
/// ```
#[must_use]
pub fn video_unit_price(base: Decimal, options: VideoOptions) -> Decimal {
    (base.max(Decimal::ZERO) * (Decimal::ONE + options.surcharge()) * VIDEO_MARKUP).ceil()
}

/// Price a single video render. The total is rounded up to a whole unit.
#[must_use]
pub fn video_quote(
    base: Decimal,
    options: VideoOptions,
    coupon: Option<&Coupon>,
    currency: CurrencyCode,
) -> PriceQuote {
    let mut quote = PriceQuote::new(video_unit_price(base, options), coupon, currency);
    quote.total = quote.total.ceil();
    quote
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::coupon::CouponKind;
    use crate::types::id::CouponId;

    fn line(id: &str, price: Decimal) -> CartLine {
        CartLine {
            id: CartLineId::new(id),
            unit_price: price,
            style_name: "Cyberpunk Neon".to_string(),
        }
    }

    fn coupon(code: &str, kind: CouponKind, value: Decimal) -> Coupon {
        Coupon {
            id: CouponId::new(code),
            code: code.to_string(),
            kind,
            value,
            is_active: true,
        }
    }

    #[test]
    fn test_percentage_on_hundred() {
        let cart = CartSelection::new(vec![line("a", Decimal::from(100))]);
        let c = coupon("P20", CouponKind::Percentage, Decimal::from(20));
        let q = quote(&cart, Some(&c), CurrencyCode::INR);

        assert_eq!(q.discount, Decimal::from(20));
        assert_eq!(q.total, Decimal::from(80));
        assert!(q.requires_payment());
    }

    #[test]
    fn test_fixed_exceeding_subtotal_is_free() {
        let cart = CartSelection::new(vec![line("a", Decimal::from(30))]);
        let c = coupon("F50", CouponKind::Fixed, Decimal::from(50));
        let q = quote(&cart, Some(&c), CurrencyCode::INR);

        assert_eq!(q.discount, Decimal::from(30));
        assert_eq!(q.total, Decimal::ZERO);
        assert!(!q.requires_payment());
    }

    #[test]
    fn test_three_photos_with_save10() {
        let cart = CartSelection::new(vec![
            line("a", Decimal::from(8)),
            line("b", Decimal::from(8)),
            line("c", Decimal::from(8)),
        ]);
        let c = coupon("SAVE10", CouponKind::Percentage, Decimal::TEN);
        let q = quote(&cart, Some(&c), CurrencyCode::INR);

        assert_eq!(q.subtotal, Decimal::from(24));
        assert_eq!(q.discount, Decimal::new(240, 2));
        assert_eq!(q.total, Decimal::new(2160, 2));
        assert_eq!(q.charge().to_minor_units(), Some(2160));
        assert_eq!(q.charge().currency_code.code(), "INR");
        assert_eq!(q.coupon_code.as_deref(), Some("SAVE10"));
    }

    #[test]
    fn test_no_coupon() {
        let cart = CartSelection::new(vec![line("a", Decimal::new(799, 2))]);
        let q = quote(&cart, None, CurrencyCode::USD);
        assert_eq!(q.discount, Decimal::ZERO);
        assert_eq!(q.total, Decimal::new(799, 2));
        assert!(q.coupon_code.is_none());
    }

    #[test]
    fn test_empty_cart_totals_zero() {
        let q = quote(&CartSelection::default(), None, CurrencyCode::INR);
        assert_eq!(q.total, Decimal::ZERO);
        assert!(!q.requires_payment());
    }

    #[test]
    fn test_video_unit_prices() {
        let base = Decimal::from(20);
        assert_eq!(video_unit_price(base, VideoOptions::default()), Decimal::from(30));

        let long = VideoOptions {
            duration: VideoDuration::Long,
            resolution: VideoResolution::P720,
        };
        assert_eq!(video_unit_price(base, long), Decimal::from(39));

        let odd = VideoOptions {
            duration: VideoDuration::Short,
            resolution: VideoResolution::P1080,
        };
        // 7 × 1.3 × 1.5 = 13.65
        assert_eq!(video_unit_price(Decimal::from(7), odd), Decimal::from(14));
    }

    #[test]
    fn test_video_full_discount_is_free() {
        let options = VideoOptions {
            duration: VideoDuration::Long,
            resolution: VideoResolution::P1080,
        };
        let c = coupon("VID48", CouponKind::Fixed, Decimal::from(48));
        let q = video_quote(Decimal::from(20), options, Some(&c), CurrencyCode::INR);

        assert_eq!(q.subtotal, Decimal::from(48));
        assert_eq!(q.total, Decimal::ZERO);
        assert!(!q.requires_payment());
    }

    #[test]
    fn test_video_total_rounds_up_after_discount() {
        let c = coupon("P15", CouponKind::Percentage, Decimal::from(15));
        let q = video_quote(Decimal::from(20), VideoOptions::default(), Some(&c), CurrencyCode::INR);
        // 30 - 4.5 = 25.5
        assert_eq!(q.total, Decimal::from(26));
    }

    #[test]
    fn test_video_option_wire_names() {
        let options: VideoOptions =
            serde_json::from_str(r#"{"duration":"8","resolution":"1080P"}"#).expect("deserialize");
        assert_eq!(options.duration, VideoDuration::Long);
        assert_eq!(options.duration.provider_value(), "10");
        assert_eq!(options.resolution, VideoResolution::P1080);
    }
}
