//! Admin account commands.
//!
//! # Usage
//!
//! ```bash
//! # Set (or reset) the admin password; login is disabled until this runs
//! STUDIO_ADMIN_PASSWORD='...' styleswap-cli admin set-password -u admin
//! ```

use styleswap_studio::auth;
use styleswap_studio::db::SettingsStore;
use styleswap_studio::models::AdminSettings;

use super::{CliError, connect, settings_store};

/// Hash `password` and store it, optionally renaming the admin account.
///
/// # Errors
///
/// Returns `Auth` if the password is too weak, or a database error.
pub async fn set_password(username: Option<&str>, password: &str) -> Result<(), CliError> {
    let password_hash = auth::hash_password(password)?;
    let username = username
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_owned);

    let store = settings_store(connect().await?)?;
    let settings = store
        .update(Box::new(move |settings: &mut AdminSettings| {
            if let Some(username) = username {
                settings.username = username;
            }
            settings.password_hash = password_hash;
        }))
        .await?;

    tracing::info!(username = %settings.username, "Admin password updated");
    Ok(())
}
