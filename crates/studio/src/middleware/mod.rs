//! HTTP middleware stack for the studio.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, outermost)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//! 5. Rate limiting (governor) on generation and login routes

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{AdminRejection, RequireAdmin};
pub use rate_limit::{generation_rate_limiter, login_rate_limiter};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
