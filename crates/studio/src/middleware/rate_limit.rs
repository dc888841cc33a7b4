//! Rate limiting using governor and `tower_governor`.
//!
//! - `generation_rate_limiter`: image generation and video renders, which each
//!   spend provider quota (~6/min per client)
//! - `login_rate_limiter`: admin login attempts (~10/min per client)

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Proxy headers carrying the client address, most trusted first.
const CLIENT_IP_HEADERS: &[&str] = &[
    "cf-connecting-ip",
    "x-forwarded-for",
    "x-real-ip",
    "fly-client-ip",
];

/// Keys requests by the client address reported by the fronting proxy, or the
/// peer address when no proxy header is present.
///
/// `X-Forwarded-For` may hold a chain; its first entry is the client.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl ClientIpKeyExtractor {
    fn client_ip<T>(req: &Request<T>) -> Option<IpAddr> {
        CLIENT_IP_HEADERS.iter().find_map(|name| {
            req.headers()
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        })
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
    }
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        Self::client_ip(req).ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Build a limiter that replenishes one request every `period_secs`, with a burst of `burst`.
///
/// Returns `None` for a zero period or burst, which governor rejects.
fn limiter(period_secs: u64, burst: u32) -> Option<RateLimiterLayer> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(period_secs)
        .burst_size(burst)
        .finish()?;
    Some(GovernorLayer::new(Arc::new(config)))
}

/// Limiter for generation endpoints: one request every 10 seconds, burst of 3.
///
/// `None` only if the constants above are changed to zero.
#[must_use]
pub fn generation_rate_limiter() -> Option<RateLimiterLayer> {
    limiter(10, 3)
}

/// Limiter for admin login: one attempt every 6 seconds, burst of 5.
#[must_use]
pub fn login_rate_limiter() -> Option<RateLimiterLayer> {
    limiter(6, 5)
}
