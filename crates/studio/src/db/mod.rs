//! Database operations for the studio `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `settings` - The admin settings document (single row, `id = 'global'`, JSONB)
//! - `styles` - Style templates shown in the picker
//! - `transactions` - Completed checkouts (paid and free) and render progress
//! - `tower_sessions.session` - Session storage
//!
//! Every repository has a `PostgreSQL` implementation and an in-memory one
//! used by tests and local tooling.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/studio/migrations/` and run via:
//! ```bash
//! cargo run -p styleswap-cli -- migrate
//! ```

pub mod settings;
pub mod styles;
pub mod transactions;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use settings::{MemorySettingsStore, PgSettingsStore, SettingsStore};
pub use styles::{MemoryStyleRepository, PgStyleRepository, StyleCatalog, StyleRepository};
pub use transactions::{
    MemoryTransactionStore, PgTransactionStore, TransactionRecord, TransactionStore,
};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate payment reference).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::DataCorruption(err.to_string())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Run the embedded studio migrations.
///
/// # Errors
///
/// Returns an error if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
