//! Image and video generation.
//!
//! - [`dispatcher`] - credential failover around an [`ImageProvider`]
//! - [`gemini`] - the Gemini image provider
//! - [`video`] - image-to-video rendering with fixed-interval polling
//! - [`classify`] - maps provider error text to failure kinds

pub mod asset;
pub mod classify;
pub mod dispatcher;
pub mod error;
pub mod gemini;
pub mod prompt;
pub mod provider;
pub mod video;

pub use asset::{Artifact, SourceAsset};
pub use classify::{ProviderErrorKind, classify_provider_error};
pub use dispatcher::{CandidateList, CredentialStatusStore, Dispatcher, GenerationRequest};
pub use error::GenerationError;
pub use gemini::GeminiClient;
pub use prompt::compose_prompt;
pub use provider::{ImageProvider, ProviderError};
pub use video::{
    KlingClient, PollPolicy, TaskState, VideoCredentials, VideoProvider, VideoRequest, render_video,
};
