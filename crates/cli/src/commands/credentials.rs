//! Image generation credential pool commands.
//!
//! # Usage
//!
//! ```bash
//! styleswap-cli credentials add --key AIza... --label "Team key"
//! styleswap-cli credentials list
//! styleswap-cli credentials remove <id>
//! ```

use chrono::{TimeZone, Utc};

use styleswap_core::{ApiSecret, CredentialId, CredentialRecord};
use styleswap_studio::db::SettingsStore;

use super::{CliError, connect, settings_store};

/// Append a credential to the pool.
///
/// # Errors
///
/// Returns `InvalidInput` for a key that is too short or already pooled.
pub async fn add(key: &str, label: Option<&str>) -> Result<(), CliError> {
    let secret = ApiSecret::new(key.trim());
    if !secret.is_plausible() {
        return Err(CliError::InvalidInput("API key is too short".to_owned()));
    }

    let store = settings_store(connect().await?)?;
    let mut settings = store.load().await?;
    if settings
        .gemini_api_keys
        .iter()
        .any(|r| r.secret.expose() == secret.expose())
    {
        return Err(CliError::InvalidInput("key is already in the pool".to_owned()));
    }

    let label = label
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map_or_else(
            || format!("Key {}", settings.gemini_api_keys.len() + 1),
            str::to_owned,
        );
    let record = CredentialRecord::new(
        CredentialId::generate(),
        secret,
        label,
        Utc::now().timestamp_millis(),
    );
    let id = record.id.clone();
    settings.gemini_api_keys.push(record);
    store.save(&settings).await?;

    tracing::info!(credential_id = %id, "Credential added");
    Ok(())
}

/// Print the pool with keys masked.
///
/// # Errors
///
/// Returns a database error if settings cannot be loaded.
pub async fn list() -> Result<(), CliError> {
    let store = settings_store(connect().await?)?;
    let settings = store.load().await?;

    #[allow(clippy::print_stdout)]
    {
        if settings.gemini_api_keys.is_empty() {
            println!("No credentials in the pool.");
        }
        for record in &settings.gemini_api_keys {
            println!("{}", describe(record));
        }
    }
    Ok(())
}

/// Remove a credential by id.
///
/// # Errors
///
/// Returns `NotFound` if no credential has this id.
pub async fn remove(id: &str) -> Result<(), CliError> {
    let id = CredentialId::new(id);
    let store = settings_store(connect().await?)?;
    let mut settings = store.load().await?;

    let before = settings.gemini_api_keys.len();
    settings.gemini_api_keys.retain(|r| r.id != id);
    if settings.gemini_api_keys.len() == before {
        return Err(CliError::NotFound(format!("credential {id}")));
    }
    store.save(&settings).await?;

    tracing::info!(credential_id = %id, "Credential removed");
    Ok(())
}

/// One listing line: id, label, masked key, status, added date.
fn describe(record: &CredentialRecord) -> String {
    let added = Utc
        .timestamp_millis_opt(record.added_at)
        .single()
        .map_or_else(|| "-".to_owned(), |t| t.format("%Y-%m-%d").to_string());
    let status = format!("{:?}", record.status).to_lowercase();
    format!(
        "{:<38} {:<20} {:<10} {:<8} {}",
        record.id.as_str(),
        record.label,
        record.secret.masked(),
        status,
        added
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_masks_key() {
        let record = CredentialRecord::new(
            CredentialId::new("k1"),
            ApiSecret::new("AIzaSyExample0123456789"),
            "Team key",
            0,
        );
        let line = describe(&record);
        assert!(line.contains("••••6789"));
        assert!(line.contains("1970-01-01"));
        assert!(line.contains("active"));
        assert!(!line.contains("AIzaSy"));
    }
}
