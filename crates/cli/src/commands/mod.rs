//! CLI command implementations.

pub mod admin;
pub mod credentials;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use styleswap_studio::auth::AdminAuthError;
use styleswap_studio::config::{ConfigError, PaymentDefaults};
use styleswap_studio::db::{self, PgSettingsStore, RepositoryError};
use styleswap_studio::models::AdminSettings;

/// Errors shared by every command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Auth(#[from] AdminAuthError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Connect to the studio database named by `STUDIO_DATABASE_URL` or `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("STUDIO_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("STUDIO_DATABASE_URL"))?;

    tracing::info!("Connecting to studio database...");
    Ok(db::create_pool(&database_url).await?)
}

/// Settings store seeded with the same environment defaults the server uses.
pub fn settings_store(pool: PgPool) -> Result<PgSettingsStore, CliError> {
    let defaults = AdminSettings::defaults(&PaymentDefaults::from_env()?);
    Ok(PgSettingsStore::new(pool, defaults))
}
