//! StyleSwap studio library.
//!
//! This crate provides the studio service as a library, allowing it to be
//! tested and reused. The binary in `main.rs` wires it to Postgres and the
//! real providers; tests build an [`AppState`](state::AppState) from
//! in-memory stores and fakes.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod session;
pub mod state;

use axum::{Router, body::Body, http::Request};
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::state::AppState;

/// Build the full studio application.
///
/// Layers, outermost first: Sentry hub and transaction, HTTP trace span,
/// request id, session.
pub fn router<Store>(
    state: AppState,
    session_layer: SessionManagerLayer<Store>,
    rate_limit: bool,
) -> Router
where
    Store: SessionStore + Clone,
{
    Router::new()
        .merge(routes::routes(rate_limit))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
