//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. StyleSwap IDs are
//! strings: admin-created records use UUIDs, while legacy records and the
//! environment fallback credential carry fixed names such as `legacy-key`.

use chrono::{DateTime, Utc};

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `generate()`, `as_str()`
/// - `From<String>`, `From<&str>` and `Into<String>` implementations
/// - `sqlx` `Type`, `Encode`, and `Decode` implementations (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use styleswap_core::define_id;
/// define_id!(StyleKey);
/// define_id!(SampleKey);
///
/// let style = StyleKey::new("viking-sikh");
/// let sample = SampleKey::new("viking-sikh");
///
/// // These are different types, so this won't compile:
/// // let _: StyleKey = sample;
/// assert_eq!(style.as_str(), sample.as_str());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh random ID (UUID v4).
            #[must_use]
            pub fn generate() -> Self {
                Self(::uuid::Uuid::new_v4().to_string())
            }

            /// Borrow the ID as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <String as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <String as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

define_id!(CredentialId);
define_id!(CouponId);
define_id!(StyleId);
define_id!(CartLineId);
define_id!(TransactionId);
define_id!(OrderId);

impl CredentialId {
    /// ID of the credential supplied through the environment rather than the pool.
    pub const ENV_FALLBACK: &'static str = "env-primary";

    /// ID assigned to a credential migrated from the legacy single-key setting.
    pub const LEGACY: &'static str = "legacy-key";

    /// Whether this is the environment fallback credential.
    #[must_use]
    pub fn is_env_fallback(&self) -> bool {
        self.0 == Self::ENV_FALLBACK
    }
}

impl TransactionId {
    /// Synthetic reference for a cart checkout whose total was discounted to zero.
    #[must_use]
    pub fn free_checkout(now: DateTime<Utc>) -> Self {
        Self::synthetic("coupon_free", now)
    }

    /// Synthetic reference for a video render that cost nothing.
    #[must_use]
    pub fn free_render(now: DateTime<Utc>) -> Self {
        Self::synthetic("free", now)
    }

    /// Synthetic reference for the once-per-session free sample photo.
    #[must_use]
    pub fn free_sample(now: DateTime<Utc>) -> Self {
        Self::synthetic("free_sample", now)
    }

    /// Whether this reference was generated locally instead of by a payment gateway.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.0.starts_with("coupon_free_") || self.0.starts_with("free_")
    }

    // The random suffix keeps references unique within one millisecond;
    // they double as the transaction primary key.
    fn synthetic(prefix: &str, now: DateTime<Utc>) -> Self {
        Self(format!(
            "{prefix}_{}_{}",
            now.timestamp_millis(),
            ::uuid::Uuid::new_v4().simple()
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_synthetic_transaction_ids() {
        let now = Utc.timestamp_millis_opt(1_739_500_000_123).single().expect("valid");

        let checkout = TransactionId::free_checkout(now);
        assert!(checkout.as_str().starts_with("coupon_free_1739500000123_"));
        assert!(TransactionId::free_render(now).as_str().starts_with("free_1739500000123_"));
        assert!(checkout.is_synthetic());
        assert!(TransactionId::free_sample(now).is_synthetic());
        assert!(!TransactionId::new("pay_NQ8v0aXyZ").is_synthetic());
    }

    #[test]
    fn test_synthetic_ids_unique_within_a_millisecond() {
        let now = Utc::now();
        let ids: std::collections::HashSet<_> =
            (0..100).map(|_| TransactionId::free_checkout(now)).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_env_fallback_id() {
        assert!(CredentialId::new(CredentialId::ENV_FALLBACK).is_env_fallback());
        assert!(!CredentialId::new(CredentialId::LEGACY).is_env_fallback());
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(CouponId::generate(), CouponId::generate());
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = StyleId::new("valentine-love");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"valentine-love\"");
    }
}
