//! Core types for StyleSwap.
//!
//! This module provides type-safe wrappers for the storefront's domain concepts.

pub mod coupon;
pub mod credential;
pub mod email;
pub mod id;
pub mod price;
pub mod pricing;
pub mod status;
pub mod style;

pub use coupon::{Coupon, CouponError, CouponKind, find_coupon, normalize_code};
pub use credential::{
    ApiSecret, Credential, CredentialRecord, CredentialStatus, CredentialStatuses,
    MIN_SECRET_LENGTH,
};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use pricing::{
    CartLine, CartSelection, PriceQuote, VideoDuration, VideoOptions, VideoResolution, quote,
    video_quote, video_unit_price,
};
pub use status::*;
pub use style::StyleTemplate;
