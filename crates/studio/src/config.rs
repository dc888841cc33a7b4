//! Studio configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STUDIO_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STUDIO_BASE_URL` - Public URL for the studio
//! - `STUDIO_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STUDIO_HOST` - Bind address (default: 127.0.0.1)
//! - `STUDIO_PORT` - Listen port (default: 3000)
//! - `GEMINI_API_KEY` - Platform image generation key, used after the admin pool
//!   (falls back to `API_KEY`)
//! - `GEMINI_MODEL` - Image model (default: gemini-2.5-flash-image)
//! - `GEMINI_BASE_URL` - API root (default: <https://generativelanguage.googleapis.com>)
//! - `KLING_BASE_URL` - Video API root (default: <https://api.klingai.com>)
//! - `VIDEO_POLL_INTERVAL_SECS` - Seconds between render polls (default: 10)
//! - `VIDEO_POLL_MAX_ATTEMPTS` - Polls before giving up (default: 120)
//! - `RAZORPAY_KEY_ID` / `RAZORPAY_KEY_SECRET` - Gateway keys used when the admin
//!   settings leave them blank
//! - `RAZORPAY_BASE_URL` - Gateway API root (default: <https://api.razorpay.com>)
//! - `DEFAULT_CURRENCY` - Checkout currency (default: INR)
//! - `PHOTO_PRICE` - Price of one high-res photo (default: 8)
//! - `VIDEO_BASE_PRICE` - Video base price before options and markup (default: 20)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name (default: development)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use styleswap_core::{ApiSecret, CurrencyCode};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Studio application configuration.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Public base URL for the studio
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    pub gemini: GeminiConfig,
    pub video: VideoConfig,
    pub payment: PaymentDefaults,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: String,
}

/// Image generation provider settings.
///
/// Implements `Debug` manually to redact the platform key.
#[derive(Clone)]
pub struct GeminiConfig {
    /// Platform key appended after the admin pool. Never deactivated.
    pub api_key: Option<SecretString>,
    pub model: String,
    pub base_url: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiConfig {
    /// The environment fallback key, if one is configured.
    #[must_use]
    pub fn fallback_secret(&self) -> Option<ApiSecret> {
        self.api_key
            .as_ref()
            .map(|key| ApiSecret::new(key.expose_secret()))
            .filter(ApiSecret::is_plausible)
    }
}

/// Video render polling settings.
#[derive(Debug, Clone)]
pub struct VideoConfig {
    pub kling_base_url: String,
    pub poll_interval: Duration,
    pub poll_max_attempts: u32,
}

/// Payment and pricing defaults used when the admin settings leave a field blank.
///
/// Implements `Debug` manually to redact the gateway secret.
#[derive(Clone)]
pub struct PaymentDefaults {
    pub razorpay_key_id: Option<String>,
    pub razorpay_key_secret: Option<SecretString>,
    pub razorpay_base_url: String,
    pub currency: CurrencyCode,
    pub photo_price: Decimal,
    pub video_base_price: Decimal,
}

impl std::fmt::Debug for PaymentDefaults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentDefaults")
            .field("razorpay_key_id", &self.razorpay_key_id)
            .field(
                "razorpay_key_secret",
                &self.razorpay_key_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("razorpay_base_url", &self.razorpay_base_url)
            .field("currency", &self.currency)
            .field("photo_price", &self.photo_price)
            .field("video_base_price", &self.video_base_price)
            .finish()
    }
}

impl StudioConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STUDIO_DATABASE_URL")?;
        let host = parse_env_or_default::<IpAddr>("STUDIO_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("STUDIO_PORT", "3000")?;
        let base_url = get_required_env("STUDIO_BASE_URL")?;
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("STUDIO_BASE_URL".to_string(), e.to_string()))?;
        let session_secret = get_validated_secret("STUDIO_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STUDIO_SESSION_SECRET")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            gemini: GeminiConfig::from_env(),
            video: VideoConfig::from_env()?,
            payment: PaymentDefaults::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_env_or_default("SENTRY_ENVIRONMENT", "development"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl GeminiConfig {
    fn from_env() -> Self {
        let api_key = get_optional_env("GEMINI_API_KEY")
            .or_else(|| get_optional_env("API_KEY"))
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from);

        Self {
            api_key,
            model: get_env_or_default("GEMINI_MODEL", "gemini-2.5-flash-image"),
            base_url: get_env_or_default(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com",
            ),
        }
    }
}

impl VideoConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let interval_secs = parse_env_or_default::<u64>("VIDEO_POLL_INTERVAL_SECS", "10")?;
        Ok(Self {
            kling_base_url: get_env_or_default("KLING_BASE_URL", "https://api.klingai.com"),
            poll_interval: Duration::from_secs(interval_secs),
            poll_max_attempts: parse_env_or_default("VIDEO_POLL_MAX_ATTEMPTS", "120")?,
        })
    }
}

impl PaymentDefaults {
    /// Load payment defaults alone, for tools that do not need the full config.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for an unparseable currency or price.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            razorpay_key_id: get_optional_env("RAZORPAY_KEY_ID").filter(|v| !v.is_empty()),
            razorpay_key_secret: get_optional_env("RAZORPAY_KEY_SECRET")
                .filter(|v| !v.is_empty())
                .map(SecretString::from),
            razorpay_base_url: get_env_or_default("RAZORPAY_BASE_URL", "https://api.razorpay.com"),
            currency: get_env_or_default("DEFAULT_CURRENCY", "INR")
                .parse::<CurrencyCode>()
                .map_err(|e| ConfigError::InvalidEnvVar("DEFAULT_CURRENCY".to_string(), e))?,
            photo_price: parse_env_or_default("PHOTO_PRICE", "8")?,
            video_base_price: parse_env_or_default("VIDEO_BASE_PRICE", "20")?,
        })
    }
}

impl Default for PaymentDefaults {
    fn default() -> Self {
        Self {
            razorpay_key_id: None,
            razorpay_key_secret: None,
            razorpay_base_url: "https://api.razorpay.com".to_string(),
            currency: CurrencyCode::INR,
            photo_price: Decimal::from(8),
            video_base_price: Decimal::from(20),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
