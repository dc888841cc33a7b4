//! The admin settings document.
//!
//! Stored as one JSON object. Field names are camelCase so documents written
//! by earlier versions of the studio load unchanged.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use styleswap_core::{
    ApiSecret, Coupon, CredentialId, CredentialRecord, CurrencyCode, CredentialStatus,
};

use crate::config::PaymentDefaults;

/// Key of the legacy single-credential field.
pub const LEGACY_KEY_FIELD: &str = "geminiApiKey";

/// Key of the credential pool field.
pub const KEY_POOL_FIELD: &str = "geminiApiKeys";

/// Global admin settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSettings {
    pub username: String,
    /// Argon2 PHC string. Empty disables admin login.
    #[serde(default)]
    pub password_hash: String,
    /// Image generation credential pool, in priority order.
    #[serde(default)]
    pub gemini_api_keys: Vec<CredentialRecord>,
    #[serde(default)]
    pub coupons: Vec<Coupon>,
    pub payment: PaymentSettings,
    #[serde(default)]
    pub kling_access_key: String,
    #[serde(default)]
    pub kling_secret_key: String,
}

/// Payment gateway and pricing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSettings {
    #[serde(default = "default_gateway")]
    pub gateway: String,
    #[serde(default)]
    pub key_id: String,
    #[serde(default)]
    pub key_secret: String,
    #[serde(default)]
    pub currency: CurrencyCode,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub photo_price: Decimal,
    #[serde(default = "default_video_base_price")]
    pub video_base_price: Decimal,
}

fn default_gateway() -> String {
    "Razorpay".to_string()
}

const fn default_enabled() -> bool {
    true
}

fn default_video_base_price() -> Decimal {
    Decimal::from(20)
}

impl AdminSettings {
    /// Defaults for a fresh install, seeded from environment configuration.
    #[must_use]
    pub fn defaults(payment: &PaymentDefaults) -> Self {
        Self {
            username: "admin".to_string(),
            password_hash: String::new(),
            gemini_api_keys: Vec::new(),
            coupons: Vec::new(),
            payment: PaymentSettings {
                gateway: default_gateway(),
                key_id: payment.razorpay_key_id.clone().unwrap_or_default(),
                key_secret: String::new(),
                currency: payment.currency,
                enabled: true,
                photo_price: payment.photo_price,
                video_base_price: payment.video_base_price,
            },
            kling_access_key: String::new(),
            kling_secret_key: String::new(),
        }
    }

    /// Build settings from a stored document.
    ///
    /// Top-level fields missing from `stored` are taken from `defaults`
    /// (shallow merge). A legacy single `geminiApiKey` is moved into an empty
    /// pool as the `legacy-key` credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the merged document does not match the schema.
    pub fn from_stored(stored: Value, defaults: &Self, now_millis: i64) -> Result<Self, serde_json::Error> {
        let mut merged = match serde_json::to_value(defaults)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let mut legacy_key = None;
        if let Value::Object(stored) = stored {
            for (key, value) in stored {
                if key == LEGACY_KEY_FIELD {
                    legacy_key = value.as_str().map(str::to_owned);
                } else if !value.is_null() {
                    merged.insert(key, value);
                }
            }
        }

        let mut settings: Self = serde_json::from_value(Value::Object(merged))?;

        if settings.gemini_api_keys.is_empty()
            && let Some(key) = legacy_key.filter(|k| !k.trim().is_empty())
        {
            settings.gemini_api_keys.push(CredentialRecord {
                id: CredentialId::new(CredentialId::LEGACY),
                secret: ApiSecret::new(key),
                label: "Default Key".to_string(),
                status: CredentialStatus::Active,
                added_at: now_millis,
            });
        }

        Ok(settings)
    }

    /// Active credential records, in stored order.
    pub fn active_credentials(&self) -> impl Iterator<Item = &CredentialRecord> {
        self.gemini_api_keys.iter().filter(|r| r.is_active())
    }

    /// Whether the video provider has credentials.
    #[must_use]
    pub fn video_configured(&self) -> bool {
        !self.kling_access_key.trim().is_empty() && !self.kling_secret_key.trim().is_empty()
    }
}
