//! HTTP route handlers for the studio.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Liveness
//! GET  /health/ready                - Readiness (database ping)
//!
//! # Studio
//! GET  /api/styles                  - Usable styles, ordered
//! POST /api/generate                - Restyle a photo (rate limited)
//!
//! # Photo checkout
//! POST /api/checkout/quote          - Price a cart with an optional coupon
//! POST /api/checkout                - Begin checkout (free or payment intent)
//! POST /api/checkout/confirm        - Payment widget success callback
//! POST /api/checkout/abandon        - Payment widget failure/dismiss callback
//! POST /api/free-sample             - One free photo per session
//!
//! # Video
//! POST /api/videos/quote            - Price a render
//! POST /api/videos/checkout         - Begin video checkout
//! POST /api/videos/render           - Start a paid render (rate limited)
//! GET  /api/videos/{payment_id}     - Render status
//!
//! # Admin (session flag required, except login)
//! POST /admin/login                 - Log in (rate limited)
//! POST /admin/logout                - Log out
//! GET/POST   /admin/credentials     - List / add image credentials
//! DELETE     /admin/credentials/{id}
//! GET/POST   /admin/coupons         - List / add coupons
//! DELETE     /admin/coupons/{id}
//! GET/POST   /admin/styles          - List / upsert styles
//! DELETE     /admin/styles/{id}
//! GET  /admin/styles/export         - Catalog as JSON
//! POST /admin/styles/import         - Upsert a JSON catalog
//! GET/PUT    /admin/payment         - Payment and video provider settings
//! GET  /admin/transactions          - Recent transactions
//! ```

pub mod admin;
pub mod checkout;
pub mod generate;
pub mod styles;
pub mod videos;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
};

use crate::middleware::{generation_rate_limiter, login_rate_limiter};
use crate::state::AppState;

/// Create the public studio API router.
///
/// With `rate_limit` set, generation and render endpoints are throttled per
/// client address.
pub fn api_routes(rate_limit: bool) -> Router<AppState> {
    let mut expensive = Router::new()
        .route("/generate", post(generate::generate))
        .route("/videos/render", post(videos::render));
    if rate_limit && let Some(layer) = generation_rate_limiter() {
        expensive = expensive.layer(layer);
    }

    Router::new()
        .route("/styles", get(styles::index))
        .route("/checkout/quote", post(checkout::quote))
        .route("/checkout", post(checkout::begin))
        .route("/checkout/confirm", post(checkout::confirm))
        .route("/checkout/abandon", post(checkout::abandon))
        .route("/free-sample", post(checkout::free_sample))
        .route("/videos/quote", post(videos::quote))
        .route("/videos/checkout", post(videos::checkout))
        .route("/videos/{payment_id}", get(videos::status))
        .merge(expensive)
}

/// Create the admin router.
pub fn admin_routes(rate_limit: bool) -> Router<AppState> {
    let mut login = Router::new().route("/login", post(admin::login));
    if rate_limit && let Some(layer) = login_rate_limiter() {
        login = login.layer(layer);
    }

    Router::new()
        .route("/logout", post(admin::logout))
        .route(
            "/credentials",
            get(admin::list_credentials).post(admin::add_credential),
        )
        .route("/credentials/{id}", delete(admin::remove_credential))
        .route("/coupons", get(admin::list_coupons).post(admin::add_coupon))
        .route("/coupons/{id}", delete(admin::remove_coupon))
        .route("/styles", get(admin::list_styles).post(admin::save_style))
        .route("/styles/export", get(admin::export_styles))
        .route("/styles/import", post(admin::import_styles))
        .route("/styles/{id}", delete(admin::remove_style))
        .route(
            "/payment",
            get(admin::payment_settings).put(admin::update_payment_settings),
        )
        .route("/transactions", get(admin::transactions))
        .merge(login)
}

/// Create all routes for the studio.
pub fn routes(rate_limit: bool) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes(rate_limit))
        .nest("/admin", admin_routes(rate_limit))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 if the database is configured but not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = state.pool() else {
        return StatusCode::OK;
    };
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
