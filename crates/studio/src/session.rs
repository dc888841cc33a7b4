//! Per-visitor session flags.
//!
//! Handlers never reach into the session directly; they take a
//! [`SessionState`] and use the typed helpers below. The production
//! implementation is `tower_sessions::Session`; tests use [`MemorySession`].

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tower_sessions::Session;
use uuid::Uuid;

/// Session keys.
pub mod keys {
    /// Set after a successful admin login.
    pub const ADMIN_LOGGED_IN: &str = "admin_logged_in";

    /// Set once the visitor has used their free high-res photo.
    pub const FREE_SAMPLE_CLAIMED: &str = "free_sample_claimed";

    /// Opaque per-visitor id. Tags log events and owns pending orders.
    pub const VISITOR_ID: &str = "visitor_id";
}

/// Session storage failed.
#[derive(Debug, Error)]
#[error("session error: {0}")]
pub struct SessionError(String);

impl From<tower_sessions::session::Error> for SessionError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self(err.to_string())
    }
}

/// Key-value view of a visitor session.
#[async_trait]
pub trait SessionState: Send + Sync {
    /// A boolean flag; unset reads as `false`.
    async fn get_flag(&self, key: &str) -> Result<bool, SessionError>;

    async fn set_flag(&self, key: &str, value: bool) -> Result<(), SessionError>;

    async fn get_string(&self, key: &str) -> Result<Option<String>, SessionError>;

    async fn set_string(&self, key: &str, value: &str) -> Result<(), SessionError>;

    async fn remove(&self, key: &str) -> Result<(), SessionError>;
}

#[async_trait]
impl SessionState for Session {
    async fn get_flag(&self, key: &str) -> Result<bool, SessionError> {
        Ok(self.get::<bool>(key).await?.unwrap_or(false))
    }

    async fn set_flag(&self, key: &str, value: bool) -> Result<(), SessionError> {
        self.insert(key, value).await?;
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.get::<String>(key).await?)
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.insert(key, value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.remove_value(key).await?;
        Ok(())
    }
}

/// In-memory session for tests and tooling.
#[derive(Debug, Default)]
pub struct MemorySession {
    values: RwLock<HashMap<String, Value>>,
}

impl MemorySession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionState for MemorySession {
    async fn get_flag(&self, key: &str) -> Result<bool, SessionError> {
        Ok(self
            .values
            .read()
            .await
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    async fn set_flag(&self, key: &str, value: bool) -> Result<(), SessionError> {
        self.values
            .write()
            .await
            .insert(key.to_string(), Value::Bool(value));
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self
            .values
            .read()
            .await
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.values
            .write()
            .await
            .insert(key.to_string(), Value::String(value.to_string()));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

// =============================================================================
// Typed helpers
// =============================================================================

/// Whether the visitor is logged in as admin.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn is_admin<S: SessionState + ?Sized>(session: &S) -> Result<bool, SessionError> {
    session.get_flag(keys::ADMIN_LOGGED_IN).await
}

/// Log the admin in or out.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn set_admin<S: SessionState + ?Sized>(
    session: &S,
    logged_in: bool,
) -> Result<(), SessionError> {
    if logged_in {
        session.set_flag(keys::ADMIN_LOGGED_IN, true).await
    } else {
        session.remove(keys::ADMIN_LOGGED_IN).await
    }
}

/// # Errors
///
/// Returns an error if the session store fails.
pub async fn free_sample_claimed<S: SessionState + ?Sized>(
    session: &S,
) -> Result<bool, SessionError> {
    session.get_flag(keys::FREE_SAMPLE_CLAIMED).await
}

/// # Errors
///
/// Returns an error if the session store fails.
pub async fn mark_free_sample_claimed<S: SessionState + ?Sized>(
    session: &S,
) -> Result<(), SessionError> {
    session.set_flag(keys::FREE_SAMPLE_CLAIMED, true).await
}

/// The visitor's id, generated on first use.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn visitor_id<S: SessionState + ?Sized>(session: &S) -> Result<String, SessionError> {
    if let Some(id) = session.get_string(keys::VISITOR_ID).await? {
        return Ok(id);
    }
    let id = Uuid::new_v4().to_string();
    session.set_string(keys::VISITOR_ID, &id).await?;
    Ok(id)
}
