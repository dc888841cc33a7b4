//! Generation errors.

use thiserror::Error;

use super::provider::ProviderError;

/// Errors surfaced by image and video generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No candidate credential exists at all.
    #[error("no generation credentials configured")]
    NoCredentials,

    /// Every candidate was tried and none produced a result.
    #[error("all {attempted} credentials failed")]
    AllCredentialsFailed {
        attempted: usize,
        /// Last provider message, for logs only.
        last_error: Option<String>,
    },

    /// The provider refused the content.
    #[error("content blocked by provider safety filters: {0}")]
    SafetyBlocked(String),

    /// A single provider call failed and was not retried.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A video render never reached a terminal state.
    #[error("render did not finish after {attempts} polls")]
    Timeout { attempts: u32 },

    /// A required provider is missing credentials.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// The uploaded image could not be used.
    #[error("invalid image: {0}")]
    InvalidAsset(String),
}

impl GenerationError {
    /// Short message safe to show end users. Provider detail is never included.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::NoCredentials | Self::NotConfigured(_) => {
                "Service unavailable. Please contact support."
            }
            Self::AllCredentialsFailed { .. } | Self::Provider(_) => {
                "Generation failed. Please try again."
            }
            Self::SafetyBlocked(_) => {
                "We couldn't style this photo. Please try a different photo."
            }
            Self::Timeout { .. } => "Rendering is taking too long. Please try again.",
            Self::InvalidAsset(_) => "Please upload a valid image.",
        }
    }

    /// Whether the user can reasonably retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AllCredentialsFailed { .. } | Self::Provider(_) | Self::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_hide_detail() {
        let err = GenerationError::AllCredentialsFailed {
            attempted: 3,
            last_error: Some("HTTP 500: internal key AIza...".to_string()),
        };
        assert!(!err.user_message().contains("AIza"));
        assert!(err.is_retryable());

        let err = GenerationError::SafetyBlocked("IMAGE_SAFETY".to_string());
        assert!(err.user_message().contains("different photo"));
        assert!(!err.is_retryable());

        assert!(GenerationError::NoCredentials.user_message().contains("contact support"));
    }
}
