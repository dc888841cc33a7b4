//! Seed the style catalog with the built-in templates.
//!
//! The server seeds an empty catalog on first read; this command does it
//! ahead of time, or overwrites the built-ins with `--force`.

use std::sync::Arc;

use tracing::info;

use styleswap_studio::db::{PgStyleRepository, StyleCatalog, StyleRepository};

use super::{CliError, connect};

/// Seed default styles.
///
/// Without `force`, a catalog that already has styles is left alone.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a write fails.
pub async fn styles(force: bool) -> Result<(), CliError> {
    let pool = connect().await?;
    let repository = Arc::new(PgStyleRepository::new(pool));

    let existing = repository.list().await?.len();
    if existing > 0 && !force {
        info!(existing, "Catalog already has styles, skipping (use --force to overwrite defaults)");
        return Ok(());
    }

    let written = StyleCatalog::new(repository).seed_defaults().await?;
    info!(written, "Default styles seeded");
    Ok(())
}
