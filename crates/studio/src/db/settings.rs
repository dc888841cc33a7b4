//! Admin settings persistence.
//!
//! The whole document is read, modified and written back. Concurrent writers
//! race with last-writer-wins semantics, matching how the admin surface and
//! the generation dispatcher share the document.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::instrument;

use styleswap_core::{CredentialId, CredentialStatus};

use super::RepositoryError;
use crate::generation::CredentialStatusStore;
use crate::models::settings::AdminSettings;

/// Row ID of the global settings document.
pub const GLOBAL_SETTINGS_ID: &str = "global";

/// Load and save the admin settings document.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load settings, merged with defaults.
    ///
    /// A missing document yields the defaults.
    async fn load(&self) -> Result<AdminSettings, RepositoryError>;

    /// Replace the stored document.
    async fn save(&self, settings: &AdminSettings) -> Result<(), RepositoryError>;

    /// Load, apply `update`, save. Returns the saved settings.
    async fn update(
        &self,
        update: Box<dyn for<'a> FnOnce(&'a mut AdminSettings) + Send>,
    ) -> Result<AdminSettings, RepositoryError> {
        let mut settings = self.load().await?;
        update(&mut settings);
        self.save(&settings).await?;
        Ok(settings)
    }
}

#[async_trait]
impl<T: SettingsStore + ?Sized> CredentialStatusStore for T {
    async fn mark_invalid(&self, id: &CredentialId) -> Result<(), RepositoryError> {
        let id = id.clone();
        self.update(Box::new(move |settings| {
            for record in &mut settings.gemini_api_keys {
                if record.id == id {
                    record.status = CredentialStatus::Invalid;
                }
            }
        }))
        .await?;
        Ok(())
    }
}

/// `PostgreSQL`-backed settings store.
pub struct PgSettingsStore {
    pool: PgPool,
    defaults: AdminSettings,
}

impl PgSettingsStore {
    #[must_use]
    pub const fn new(pool: PgPool, defaults: AdminSettings) -> Self {
        Self { pool, defaults }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    #[instrument(skip(self))]
    async fn load(&self) -> Result<AdminSettings, RepositoryError> {
        let stored: Option<JsonValue> =
            sqlx::query_scalar("SELECT config FROM settings WHERE id = $1")
                .bind(GLOBAL_SETTINGS_ID)
                .fetch_optional(&self.pool)
                .await?;

        match stored {
            Some(config) => Ok(AdminSettings::from_stored(
                config,
                &self.defaults,
                Utc::now().timestamp_millis(),
            )?),
            None => {
                tracing::info!("No settings document found, writing defaults");
                self.save(&self.defaults).await?;
                Ok(self.defaults.clone())
            }
        }
    }

    #[instrument(skip(self, settings))]
    async fn save(&self, settings: &AdminSettings) -> Result<(), RepositoryError> {
        let config = serde_json::to_value(settings)?;
        sqlx::query(
            r"
            INSERT INTO settings (id, config)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET config = $2, updated_at = NOW()
            ",
        )
        .bind(GLOBAL_SETTINGS_ID)
        .bind(config)
        .execute(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Failed to save settings"))?;

        Ok(())
    }
}

/// In-memory settings store.
///
/// Holds the raw JSON document so the same merge and migration path runs as
/// with the database.
pub struct MemorySettingsStore {
    document: RwLock<Option<JsonValue>>,
    defaults: AdminSettings,
    fail_saves: bool,
}

impl MemorySettingsStore {
    /// Empty store; loads return `defaults`.
    #[must_use]
    pub fn new(defaults: AdminSettings) -> Self {
        Self {
            document: RwLock::new(None),
            defaults,
            fail_saves: false,
        }
    }

    /// Store pre-populated with a raw document.
    #[must_use]
    pub fn with_document(defaults: AdminSettings, document: JsonValue) -> Self {
        Self {
            document: RwLock::new(Some(document)),
            defaults,
            fail_saves: false,
        }
    }

    /// Make every save fail, for exercising error paths.
    #[must_use]
    pub fn failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    /// The raw stored document.
    pub async fn document(&self) -> Option<JsonValue> {
        self.document.read().await.clone()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<AdminSettings, RepositoryError> {
        match self.document.read().await.clone() {
            Some(doc) => Ok(AdminSettings::from_stored(
                doc,
                &self.defaults,
                Utc::now().timestamp_millis(),
            )?),
            None => Ok(self.defaults.clone()),
        }
    }

    async fn save(&self, settings: &AdminSettings) -> Result<(), RepositoryError> {
        if self.fail_saves {
            return Err(RepositoryError::Conflict("settings store is read-only".to_string()));
        }
        *self.document.write().await = Some(serde_json::to_value(settings)?);
        Ok(())
    }
}
