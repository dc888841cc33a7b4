//! Session middleware configuration.
//!
//! Sessions live in `PostgreSQL` through tower-sessions. They carry the admin
//! login flag, the free-sample flag and the visitor id.

use sqlx::PgPool;
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StudioConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "styleswap_session";

/// Idle sessions expire after 30 days, long enough for the free-sample flag
/// to outlive a browsing session.
const SESSION_IDLE_DAYS: i64 = 30;

/// Create the session layer with a `PostgreSQL` store.
///
/// The `tower_sessions.session` table is created by the studio migrations.
#[must_use]
pub fn create_session_layer(pool: &PgPool, config: &StudioConfig) -> SessionManagerLayer<PostgresStore> {
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::days(SESSION_IDLE_DAYS)))
        .with_secure(config.base_url.starts_with("https://"))
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
