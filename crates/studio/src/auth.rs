//! Admin password handling.
//!
//! The admin account is a single username and Argon2id hash stored in the
//! settings document. An empty hash disables login until a password is set
//! with `styleswap-cli admin set-password`.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

use crate::models::AdminSettings;

/// Minimum admin password length.
pub const MIN_PASSWORD_LENGTH: usize = 12;

#[derive(Debug, Error)]
pub enum AdminAuthError {
    /// Wrong username or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No password has been set yet.
    #[error("admin login is disabled until a password is set")]
    LoginDisabled,

    #[error("password validation failed: {0}")]
    WeakPassword(String),

    #[error("password hashing error")]
    PasswordHash,
}

/// Check a login attempt against the stored admin account.
///
/// # Errors
///
/// Returns `LoginDisabled` if no hash is stored, otherwise
/// `InvalidCredentials` on any mismatch.
pub fn authenticate(
    settings: &AdminSettings,
    username: &str,
    password: &str,
) -> Result<(), AdminAuthError> {
    if settings.password_hash.is_empty() {
        return Err(AdminAuthError::LoginDisabled);
    }
    // Verify even on a username mismatch so both paths cost the same.
    let verified = verify_password(password, &settings.password_hash);
    if username.trim() != settings.username || verified.is_err() {
        return Err(AdminAuthError::InvalidCredentials);
    }
    Ok(())
}

/// Validate password strength.
///
/// # Errors
///
/// Returns `WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AdminAuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AdminAuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `WeakPassword` or `PasswordHash`.
pub fn hash_password(password: &str) -> Result<String, AdminAuthError> {
    validate_password(password)?;
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AdminAuthError::PasswordHash)
}

/// Verify a password against a PHC hash string.
fn verify_password(password: &str, hash: &str) -> Result<(), AdminAuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AdminAuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AdminAuthError::InvalidCredentials)
}
