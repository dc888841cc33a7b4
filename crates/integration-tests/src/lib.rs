//! Integration tests for StyleSwap.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p styleswap-integration-tests
//! ```
//!
//! No database is needed: [`TestApp`] runs the real studio router in-process
//! on in-memory stores, with the real Gemini, Kling and Razorpay clients
//! pointed at a `wiremock` server.
//!
//! # Test Categories
//!
//! - `generation` - credential failover through `POST /api/generate`
//! - `checkout` - pricing, payment confirmation and free paths
//! - `video` - video purchase and background render lifecycle
//! - `admin` - admin session gate and settings management

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use sha2::Sha256;
use tower::ServiceExt;
use tower_sessions::{MemoryStore, SessionManagerLayer};
use wiremock::MockServer;

use styleswap_core::{Coupon, CouponKind};
use styleswap_studio::checkout::RazorpayClient;
use styleswap_studio::config::{GeminiConfig, PaymentDefaults, StudioConfig, VideoConfig};
use styleswap_studio::db::{
    MemorySettingsStore, MemoryStyleRepository, MemoryTransactionStore, StyleCatalog,
};
use styleswap_studio::generation::{GeminiClient, KlingClient};
use styleswap_studio::models::AdminSettings;
use styleswap_studio::state::{AppState, Services};

/// Gateway key pair configured in every test app.
pub const GATEWAY_KEY_ID: &str = "rzp_test_integration";
pub const GATEWAY_SECRET: &str = "integration_gateway_secret";

/// Gemini model name used in mocked endpoint paths.
pub const GEMINI_MODEL: &str = "gemini-test-image";

/// A 1x1 PNG, base64-encoded.
pub const TINY_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Poll bound for background renders in tests.
pub const VIDEO_POLL_ATTEMPTS: u32 = 5;

/// The studio running in-process against mocked providers.
pub struct TestApp {
    router: Router,
    cookie: Mutex<Option<String>>,
    pub settings: Arc<MemorySettingsStore>,
    pub transactions: Arc<MemoryTransactionStore>,
    pub providers: MockServer,
}

/// Settings every test app starts from: gateway keys and three coupons.
#[must_use]
pub fn base_settings() -> AdminSettings {
    let mut settings = AdminSettings::defaults(&PaymentDefaults::default());
    settings.payment.key_id = GATEWAY_KEY_ID.to_string();
    settings.payment.key_secret = GATEWAY_SECRET.to_string();
    settings.coupons = vec![
        Coupon::new("SAVE10", CouponKind::Percentage, Decimal::from(10)).expect("coupon"),
        Coupon::new("LOVE20", CouponKind::Percentage, Decimal::from(20)).expect("coupon"),
        Coupon::new("FREE48", CouponKind::Fixed, Decimal::from(48)).expect("coupon"),
    ];
    settings
}

fn test_config(provider_url: &str, gemini_env_key: Option<&str>) -> StudioConfig {
    StudioConfig {
        database_url: SecretString::from("postgres://unused"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        session_secret: SecretString::from("k8#Qz!2mVw@9Lp$4Rt&7Xn*1Bc^6Hd%3"),
        gemini: GeminiConfig {
            api_key: gemini_env_key.map(SecretString::from),
            model: GEMINI_MODEL.to_string(),
            base_url: provider_url.to_string(),
        },
        video: VideoConfig {
            kling_base_url: provider_url.to_string(),
            poll_interval: Duration::from_millis(10),
            poll_max_attempts: VIDEO_POLL_ATTEMPTS,
        },
        payment: PaymentDefaults {
            razorpay_base_url: provider_url.to_string(),
            ..PaymentDefaults::default()
        },
        sentry_dsn: None,
        sentry_environment: "test".to_string(),
    }
}

impl TestApp {
    /// Start an app whose settings are [`base_settings`] after `configure`.
    pub async fn spawn(configure: impl FnOnce(&mut AdminSettings)) -> Self {
        Self::spawn_with_env_key(None, configure).await
    }

    /// Like [`TestApp::spawn`], with a platform Gemini key in the environment config.
    pub async fn spawn_with_env_key(
        env_key: Option<&str>,
        configure: impl FnOnce(&mut AdminSettings),
    ) -> Self {
        let providers = MockServer::start().await;
        let config = test_config(&providers.uri(), env_key);

        let mut initial = base_settings();
        configure(&mut initial);
        let settings = Arc::new(MemorySettingsStore::new(initial));
        let transactions = Arc::new(MemoryTransactionStore::new());

        let http = reqwest::Client::new();
        let services = Services {
            settings: settings.clone(),
            styles: StyleCatalog::new(Arc::new(MemoryStyleRepository::new())),
            transactions: transactions.clone(),
            image_provider: Arc::new(GeminiClient::new(http.clone(), &config.gemini)),
            video_provider: Arc::new(KlingClient::new(http.clone(), &config.video)),
            gateway: Arc::new(RazorpayClient::new(http, &config.payment.razorpay_base_url)),
        };
        let state = AppState::from_services(config, None, services);

        let session_layer = SessionManagerLayer::new(MemoryStore::default()).with_secure(false);
        let router = styleswap_studio::router(state, session_layer, false);

        Self {
            router,
            cookie: Mutex::new(None),
            settings,
            transactions,
            providers,
        }
    }

    /// Send a request as this app's single visitor, keeping the session cookie.
    pub async fn request(&self, method: Method, uri: &str, body: Option<&Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = self.cookie.lock().expect("cookie").clone() {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();

        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            && let Some(pair) = set_cookie.split(';').next()
        {
            *self.cookie.lock().expect("cookie") = Some(pair.to_string());
        }

        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    /// Forget the session cookie, as a new visitor would.
    pub fn clear_cookies(&self) {
        *self.cookie.lock().expect("cookie") = None;
    }
}

/// Signature the payment widget would return for a completed payment.
#[must_use]
pub fn sign_payment(order_id: &str, payment_id: &str) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(GATEWAY_SECRET.as_bytes()).expect("hmac key");
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Path of the mocked Gemini generate endpoint.
#[must_use]
pub fn gemini_path() -> String {
    format!("/v1beta/models/{GEMINI_MODEL}:generateContent")
}

/// A Gemini response carrying one inline image.
#[must_use]
pub fn gemini_image_response(data: &str) -> Value {
    serde_json::json!({
        "candidates": [{
            "content": { "parts": [{ "inlineData": { "mimeType": "image/png", "data": data } }] },
            "finishReason": "STOP"
        }]
    })
}

/// A Gemini error body.
#[must_use]
pub fn gemini_error_response(code: u16, message: &str, status: &str) -> Value {
    serde_json::json!({ "error": { "code": code, "message": message, "status": status } })
}
