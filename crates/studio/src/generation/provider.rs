//! Image provider seam.

use async_trait::async_trait;
use thiserror::Error;

use styleswap_core::ApiSecret;

use super::asset::{Artifact, SourceAsset};
use super::classify::{ProviderErrorKind, classify_provider_error};

/// Errors reported by a generation provider.
///
/// The `Display` output is what the dispatcher classifies, so HTTP failures
/// keep the status code and the provider's own message in the text.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider answered with an error status.
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never got a response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider refused the content.
    #[error("blocked: {0}")]
    Blocked(String),

    /// A successful response carried no usable output.
    #[error("AI returned no image data.")]
    EmptyResult,

    /// A long-running task ended in failure.
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// The response body did not match the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// Credentials could not be turned into a request.
    #[error("invalid credentials: {0}")]
    Credentials(String),
}

impl ProviderError {
    /// Classification bucket of this failure.
    #[must_use]
    pub fn kind(&self) -> ProviderErrorKind {
        classify_provider_error(&self.to_string())
    }
}

/// A service that restyles a photo.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generate one image from `asset` and a fully composed `prompt`.
    async fn generate(
        &self,
        secret: &ApiSecret,
        asset: &SourceAsset,
        prompt: &str,
    ) -> Result<Artifact, ProviderError>;
}
