//! Credential failover for image generation.
//!
//! Candidates are tried strictly in order. A credential that fails with an
//! authorization error is retired (`active -> invalid`) and the retirement is
//! persisted once; every other failure moves on to the next candidate without
//! touching the credential. Failures escalate only when the list is exhausted,
//! or immediately when there is a single candidate.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use styleswap_core::{
    ApiSecret, Credential, CredentialId, CredentialRecord, CredentialStatus, CredentialStatuses,
};

use super::asset::{Artifact, SourceAsset};
use super::classify::ProviderErrorKind;
use super::error::GenerationError;
use super::provider::ImageProvider;
use crate::db::RepositoryError;

/// Persistence for credential retirements.
#[async_trait]
pub trait CredentialStatusStore: Send + Sync {
    /// Persist `id` as invalid.
    async fn mark_invalid(&self, id: &CredentialId) -> Result<(), RepositoryError>;
}

/// Ordered candidates for one generation request.
#[derive(Debug, Clone, Default)]
pub struct CandidateList {
    credentials: Vec<Credential>,
    statuses: CredentialStatuses,
}

impl CandidateList {
    /// Active pool records in stored order, then the environment fallback if
    /// no pool record (in any status) already carries the same secret.
    #[must_use]
    pub fn build(pool: &[CredentialRecord], fallback: Option<ApiSecret>) -> Self {
        let mut credentials: Vec<Credential> = pool
            .iter()
            .filter(|r| r.is_active())
            .map(Credential::from)
            .collect();

        if let Some(secret) = fallback
            && !pool.iter().any(|r| r.secret == secret)
        {
            credentials.push(Credential::env_fallback(secret));
        }

        Self {
            credentials,
            statuses: CredentialStatuses::from_records(pool),
        }
    }

    #[must_use]
    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Status of a candidate as tracked during this request.
    #[must_use]
    pub fn status(&self, id: &CredentialId) -> CredentialStatus {
        self.statuses.status(id)
    }
}

/// A fully prepared generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub asset: SourceAsset,
    /// Composed prompt, see [`super::prompt::compose_prompt`].
    pub prompt: String,
}

/// Runs a request against a candidate list.
#[derive(Clone)]
pub struct Dispatcher {
    provider: Arc<dyn ImageProvider>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(provider: Arc<dyn ImageProvider>) -> Self {
        Self { provider }
    }

    /// Try each candidate until one produces an artifact.
    ///
    /// # Errors
    ///
    /// - `NoCredentials` if the list is empty
    /// - the sole candidate's error, unmodified, if the list has one entry
    /// - `SafetyBlocked` on exhaustion when any attempt was refused for content
    /// - `AllCredentialsFailed` on exhaustion otherwise
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn generate<S>(
        &self,
        request: &GenerationRequest,
        candidates: &mut CandidateList,
        store: &S,
    ) -> Result<Artifact, GenerationError>
    where
        S: CredentialStatusStore + ?Sized,
    {
        if candidates.is_empty() {
            tracing::error!("No active API keys available");
            return Err(GenerationError::NoCredentials);
        }

        let sole_candidate = candidates.len() == 1;
        let mut attempted = 0;
        let mut last_error = None;
        let mut safety_block = None;

        for credential in &candidates.credentials {
            if !credential.secret.is_plausible() {
                tracing::debug!(label = %credential.label, "Skipping implausible key");
                continue;
            }

            attempted += 1;
            tracing::info!(label = %credential.label, "Attempting generation");

            let err = match self
                .provider
                .generate(&credential.secret, &request.asset, &request.prompt)
                .await
            {
                Ok(artifact) => {
                    tracing::info!(label = %credential.label, "Generation successful");
                    return Ok(artifact);
                }
                Err(err) => err,
            };

            let kind = err.kind();
            tracing::warn!(label = %credential.label, ?kind, error = %err, "Key failed");

            if sole_candidate {
                return Err(match kind {
                    ProviderErrorKind::SafetyBlocked => GenerationError::SafetyBlocked(err.to_string()),
                    _ => GenerationError::Provider(err),
                });
            }

            match kind {
                ProviderErrorKind::Auth if credential.persisted => {
                    if candidates.statuses.invalidate(&credential.id) {
                        tracing::error!(label = %credential.label, "Permanently disabling key after auth error");
                        if let Err(e) = store.mark_invalid(&credential.id).await {
                            tracing::error!(error = %e, credential_id = %credential.id, "Failed to persist key deactivation");
                        }
                    }
                }
                ProviderErrorKind::SafetyBlocked => safety_block = Some(err.to_string()),
                _ => {}
            }
            last_error = Some(err.to_string());
        }

        if let Some(reason) = safety_block {
            return Err(GenerationError::SafetyBlocked(reason));
        }

        tracing::error!(attempted, last_error = ?last_error, "All available API keys failed");
        Err(GenerationError::AllCredentialsFailed {
            attempted,
            last_error,
        })
    }
}
