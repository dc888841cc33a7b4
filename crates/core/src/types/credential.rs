//! Generation provider credential types.
//!
//! The admin settings document stores an ordered pool of
//! [`CredentialRecord`]s. The generation dispatcher works on the immutable
//! [`Credential`] view of each record and tracks status changes separately in
//! [`CredentialStatuses`], so the only mutation during a request is the
//! one-way `active -> invalid` transition.

use std::collections::HashMap;

use core::fmt;

use serde::{Deserialize, Serialize};

use super::id::CredentialId;

/// Secrets shorter than this are treated as missing.
pub const MIN_SECRET_LENGTH: usize = 10;

/// A provider API key.
///
/// `Debug` never prints the key; use [`ApiSecret::expose`] at the call site
/// that actually needs it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ApiSecret(String);

impl ApiSecret {
    /// Wrap a raw key.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw key.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the key is present and long enough to be worth sending.
    #[must_use]
    pub fn is_plausible(&self) -> bool {
        self.0.trim().len() >= MIN_SECRET_LENGTH
    }

    /// Last four characters, for admin listings.
    #[must_use]
    pub fn masked(&self) -> String {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("••••{tail}")
    }
}

impl fmt::Debug for ApiSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiSecret([REDACTED])")
    }
}

/// Lifecycle status of a pooled credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    /// Eligible for use.
    #[default]
    Active,
    /// Retired after an authorization failure. Terminal.
    Invalid,
}

/// A credential as stored in the admin settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub id: CredentialId,
    #[serde(rename = "key")]
    pub secret: ApiSecret,
    pub label: String,
    #[serde(default)]
    pub status: CredentialStatus,
    /// Unix epoch milliseconds.
    #[serde(default)]
    pub added_at: i64,
}

impl CredentialRecord {
    /// Create a new active record.
    #[must_use]
    pub fn new(id: CredentialId, secret: ApiSecret, label: impl Into<String>, added_at: i64) -> Self {
        Self {
            id,
            secret,
            label: label.into(),
            status: CredentialStatus::Active,
            added_at,
        }
    }

    /// Whether the record may be offered to the dispatcher.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == CredentialStatus::Active
    }
}

/// Immutable view of a credential handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: CredentialId,
    pub secret: ApiSecret,
    pub label: String,
    /// `false` for the environment fallback, which lives outside the pool and
    /// therefore can never be retired.
    pub persisted: bool,
}

impl Credential {
    /// The credential supplied through the environment.
    #[must_use]
    pub fn env_fallback(secret: ApiSecret) -> Self {
        Self {
            id: CredentialId::new(CredentialId::ENV_FALLBACK),
            secret,
            label: "Platform Key".to_string(),
            persisted: false,
        }
    }
}

impl From<&CredentialRecord> for Credential {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            id: record.id.clone(),
            secret: record.secret.clone(),
            label: record.label.clone(),
            persisted: true,
        }
    }
}

/// Status map keyed by credential ID.
///
/// The single mutation is [`CredentialStatuses::invalidate`], which only ever
/// moves a credential from `Active` to `Invalid`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialStatuses {
    statuses: HashMap<CredentialId, CredentialStatus>,
}

impl CredentialStatuses {
    /// Snapshot the statuses of a pool.
    #[must_use]
    pub fn from_records(records: &[CredentialRecord]) -> Self {
        Self {
            statuses: records
                .iter()
                .map(|r| (r.id.clone(), r.status))
                .collect(),
        }
    }

    /// Current status; unknown IDs are reported as active.
    #[must_use]
    pub fn status(&self, id: &CredentialId) -> CredentialStatus {
        self.statuses.get(id).copied().unwrap_or_default()
    }

    /// Retire a credential.
    ///
    /// Returns `true` only when this call performed the `Active -> Invalid`
    /// transition, so callers persist each retirement exactly once.
    pub fn invalidate(&mut self, id: &CredentialId) -> bool {
        let entry = self.statuses.entry(id.clone()).or_default();
        if *entry == CredentialStatus::Invalid {
            return false;
        }
        *entry = CredentialStatus::Invalid;
        true
    }

    /// Write the tracked statuses back onto stored records.
    pub fn apply_to(&self, records: &mut [CredentialRecord]) {
        for record in records {
            if let Some(status) = self.statuses.get(&record.id) {
                record.status = *status;
            }
        }
    }
}
