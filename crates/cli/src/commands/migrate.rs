//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! styleswap-cli migrate
//! ```
//!
//! Migrations live in `crates/studio/migrations/` and are embedded in the
//! studio library, so the CLI always applies the set the server expects.

use super::{CliError, connect};

/// Apply pending studio migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running studio migrations...");
    styleswap_studio::db::run_migrations(&pool).await?;

    tracing::info!("Studio migrations complete!");
    Ok(())
}
