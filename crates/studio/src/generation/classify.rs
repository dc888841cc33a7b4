//! Provider error classification.
//!
//! Providers report failures as free text. The dispatcher only needs to know
//! which bucket a failure falls into, decided by substring match against the
//! lower-cased message.

/// Substrings marking a credential as unusable (revoked, leaked, invalid).
pub const AUTH_FAILURE_MARKERS: &[&str] = &[
    "leaked",
    "401",
    "403",
    "api_key_invalid",
    "invalid api key",
    "api key not valid",
];

/// Substrings marking a content-policy refusal.
pub const SAFETY_BLOCK_MARKERS: &[&str] = &[
    "safety",
    "blocked",
    "prohibited_content",
    "image_safety",
    "recitation",
];

/// Substrings marking quota or rate limiting.
pub const RATE_LIMIT_MARKERS: &[&str] = &["429", "resource_exhausted", "rate limit", "quota"];

/// Bucket a provider failure falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The credential is bad. Retire it.
    Auth,
    /// The provider refused the content.
    SafetyBlocked,
    RateLimited,
    Other,
}

impl ProviderErrorKind {
    #[must_use]
    pub const fn is_auth(self) -> bool {
        matches!(self, Self::Auth)
    }
}

/// Classify a provider error message. Auth markers take precedence.
#[must_use]
pub fn classify_provider_error(message: &str) -> ProviderErrorKind {
    let message = message.to_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|m| message.contains(m));

    if contains_any(AUTH_FAILURE_MARKERS) {
        ProviderErrorKind::Auth
    } else if contains_any(SAFETY_BLOCK_MARKERS) {
        ProviderErrorKind::SafetyBlocked
    } else if contains_any(RATE_LIMIT_MARKERS) {
        ProviderErrorKind::RateLimited
    } else {
        ProviderErrorKind::Other
    }
}
