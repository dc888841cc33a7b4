//! Image generation through `POST /api/generate` with credential failover.

#![allow(clippy::expect_used)]

use axum::http::StatusCode;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use styleswap_core::{ApiSecret, CredentialId, CredentialRecord, CredentialStatus};
use styleswap_studio::db::SettingsStore;
use styleswap_studio::models::AdminSettings;
use styleswap_integration_tests::{
    TINY_PNG, TestApp, gemini_error_response, gemini_image_response, gemini_path,
};

const KEY_ONE: &str = "AIzaSyKeyOne00000001";
const KEY_TWO: &str = "AIzaSyKeyTwo00000002";

fn with_pool(settings: &mut AdminSettings) {
    settings.gemini_api_keys = vec![
        CredentialRecord::new(CredentialId::new("k1"), ApiSecret::new(KEY_ONE), "First", 1),
        CredentialRecord::new(CredentialId::new("k2"), ApiSecret::new(KEY_TWO), "Second", 2),
    ];
}

fn generate_body() -> serde_json::Value {
    json!({
        "image": format!("data:image/png;base64,{TINY_PNG}"),
        "styleId": "valentine-love",
    })
}

#[tokio::test]
async fn test_revoked_key_is_retired_and_next_key_succeeds() {
    let app = TestApp::spawn(with_pool).await;

    Mock::given(method("POST"))
        .and(path(gemini_path()))
        .and(header("x-goog-api-key", KEY_ONE))
        .respond_with(ResponseTemplate::new(400).set_body_json(gemini_error_response(
            400,
            "API key not valid. Please pass a valid API key.",
            "INVALID_ARGUMENT",
        )))
        .expect(1)
        .mount(&app.providers)
        .await;
    Mock::given(method("POST"))
        .and(path(gemini_path()))
        .and(header("x-goog-api-key", KEY_TWO))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_image_response("b3V0")))
        .expect(1)
        .mount(&app.providers)
        .await;

    let (status, body) = app.post("/api/generate", &generate_body()).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["image"], "data:image/png;base64,b3V0");

    let settings = app.settings.load().await.expect("settings");
    assert_eq!(settings.gemini_api_keys[0].status, CredentialStatus::Invalid);
    assert_eq!(settings.gemini_api_keys[1].status, CredentialStatus::Active);
}

#[tokio::test]
async fn test_retired_key_is_skipped_on_next_request() {
    let app = TestApp::spawn(|settings| {
        with_pool(settings);
        settings.gemini_api_keys[0].status = CredentialStatus::Invalid;
    })
    .await;

    Mock::given(method("POST"))
        .and(path(gemini_path()))
        .and(header("x-goog-api-key", KEY_ONE))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&app.providers)
        .await;
    Mock::given(method("POST"))
        .and(path(gemini_path()))
        .and(header("x-goog-api-key", KEY_TWO))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_image_response("b3V0")))
        .expect(1)
        .mount(&app.providers)
        .await;

    let (status, _) = app.post("/api/generate", &generate_body()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_every_key_failing_is_bad_gateway() {
    let app = TestApp::spawn(with_pool).await;

    Mock::given(method("POST"))
        .and(path(gemini_path()))
        .respond_with(ResponseTemplate::new(500).set_body_json(gemini_error_response(
            500,
            "Internal error encountered.",
            "INTERNAL",
        )))
        .expect(2)
        .mount(&app.providers)
        .await;

    let (status, body) = app.post("/api/generate", &generate_body()).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["retryable"], true);
    assert!(!body["error"].as_str().unwrap_or_default().contains("Internal error"));

    // Server errors never retire a credential.
    let settings = app.settings.load().await.expect("settings");
    assert!(settings.gemini_api_keys.iter().all(CredentialRecord::is_active));
}

#[tokio::test]
async fn test_safety_refusal_is_unprocessable() {
    let app = TestApp::spawn(with_pool).await;

    Mock::given(method("POST"))
        .and(path(gemini_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [] }, "finishReason": "IMAGE_SAFETY" }]
        })))
        .mount(&app.providers)
        .await;

    let (status, body) = app.post("/api/generate", &generate_body()).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn test_environment_key_is_used_when_pool_is_empty() {
    let app = TestApp::spawn_with_env_key(Some(KEY_ONE), |_| {}).await;

    Mock::given(method("POST"))
        .and(path(gemini_path()))
        .and(header("x-goog-api-key", KEY_ONE))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_image_response("b3V0")))
        .expect(1)
        .mount(&app.providers)
        .await;

    let (status, _) = app
        .post(
            "/api/generate",
            &json!({ "image": TINY_PNG, "prompt": "A watercolor portrait" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_no_credentials_is_service_unavailable() {
    let app = TestApp::spawn(|_| {}).await;

    let (status, body) = app.post("/api/generate", &generate_body()).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Service unavailable. Please contact support.");
}

#[tokio::test]
async fn test_unknown_style_is_not_found() {
    let app = TestApp::spawn(with_pool).await;

    let (status, _) = app
        .post(
            "/api/generate",
            &json!({ "image": TINY_PNG, "styleId": "no-such-style" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_style_and_prompt_is_bad_request() {
    let app = TestApp::spawn(with_pool).await;

    let (status, _) = app.post("/api/generate", &json!({ "image": TINY_PNG })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/generate", &json!({ "image": "", "prompt": "Oil painting" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_style_list_is_seeded() {
    let app = TestApp::spawn(|_| {}).await;

    let (status, body) = app.get("/api/styles").await;

    assert_eq!(status, StatusCode::OK);
    let styles = body.as_array().expect("array");
    assert!(!styles.is_empty());
    assert_eq!(styles[0]["id"], "valentine-love");
}
