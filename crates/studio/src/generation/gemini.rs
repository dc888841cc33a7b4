//! Gemini image generation client.
//!
//! Calls the `generateContent` endpoint with the source image as inline data
//! followed by the composed prompt, and returns the first inline image of the
//! first candidate.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use styleswap_core::ApiSecret;

use super::asset::{Artifact, SourceAsset};
use super::provider::{ImageProvider, ProviderError};
use crate::config::GeminiConfig;

/// Finish reasons that mean the provider refused to produce an image.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "IMAGE_SAFETY",
    "PROHIBITED_CONTENT",
    "RECITATION",
    "BLOCKLIST",
    "SPII",
];

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    inner: Arc<GeminiClientInner>,
}

struct GeminiClientInner {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl GeminiClient {
    /// Create a client sharing `client`'s connection pool.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &GeminiConfig) -> Self {
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );

        Self {
            inner: Arc::new(GeminiClientInner {
                client,
                endpoint,
                model: config.model.clone(),
            }),
        }
    }

    /// Handle an error status code.
    async fn handle_error_status(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => {
                let message = serde_json::from_str::<ApiErrorResponse>(&body)
                    .map(|e| match e.error.status {
                        Some(code) if !e.error.message.contains(&code) => {
                            format!("{} ({code})", e.error.message)
                        }
                        _ => e.error.message,
                    })
                    .unwrap_or(body);
                ProviderError::Api { status, message }
            }
            Err(e) => ProviderError::Transport(e),
        }
    }
}

#[async_trait]
impl ImageProvider for GeminiClient {
    #[instrument(skip_all, fields(model = %self.inner.model, prompt_len = prompt.len()))]
    async fn generate(
        &self,
        secret: &ApiSecret,
        asset: &SourceAsset,
        prompt: &str,
    ) -> Result<Artifact, ProviderError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: asset.mime_type().to_string(),
                            data: asset.base64().to_string(),
                        },
                    },
                    RequestPart::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
        };

        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .header("x-goog-api-key", secret.expose())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error_status(response).await);
        }

        let body = response.text().await?;
        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Parse(format!("Failed to parse response: {e}")))?;

        extract_image(parsed)
    }
}

/// Pick the first inline image out of a response.
fn extract_image(response: GenerateResponse) -> Result<Artifact, ProviderError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ProviderError::Blocked(reason));
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(ProviderError::EmptyResult);
    };

    let image = candidate
        .content
        .into_iter()
        .flat_map(|c| c.parts)
        .find_map(|part| part.inline_data);

    match image {
        Some(inline) => Ok(Artifact::Image {
            mime_type: inline.mime_type,
            data: inline.data,
        }),
        None => match candidate.finish_reason {
            Some(reason) if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) => {
                Err(ProviderError::Blocked(reason))
            }
            _ => Err(ProviderError::EmptyResult),
        },
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default = "default_mime")]
    mime_type: String,
    data: String,
}

fn default_mime() -> String {
    super::asset::DEFAULT_MIME_TYPE.to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Error body returned by Google APIs.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::generation::classify::ProviderErrorKind;

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new(
            reqwest::Client::new(),
            &GeminiConfig {
                api_key: None,
                model: "gemini-2.5-flash-image".to_string(),
                base_url: server.uri(),
            },
        )
    }

    fn asset() -> SourceAsset {
        SourceAsset::parse("data:image/jpeg;base64,aGVsbG8=").expect("asset")
    }

    const PATH: &str = "/v1beta/models/gemini-2.5-flash-image:generateContent";

    #[tokio::test]
    async fn test_returns_first_inline_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH))
            .and(header("x-goog-api-key", "AIzaSyTestKey0123456"))
            .and(body_partial_json(json!({
                "contents": [{ "parts": [
                    { "inlineData": { "mimeType": "image/jpeg", "data": "aGVsbG8=" } },
                    { "text": "make it neon" }
                ]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "parts": [
                        { "text": "Here you go" },
                        { "inlineData": { "mimeType": "image/png", "data": "b3V0" } }
                    ]},
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let artifact = client(&server)
            .generate(&ApiSecret::new("AIzaSyTestKey0123456"), &asset(), "make it neon")
            .await
            .expect("generate");

        assert_eq!(artifact.to_data_url(), "data:image/png;base64,b3V0");
    }

    #[tokio::test]
    async fn test_invalid_key_classifies_as_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": 400,
                    "message": "API key not valid. Please pass a valid API key.",
                    "status": "INVALID_ARGUMENT"
                }
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .generate(&ApiSecret::new("AIzaSyRevoked012345"), &asset(), "p")
            .await
            .expect_err("should fail");

        assert!(matches!(err, ProviderError::Api { status: 400, .. }));
        assert_eq!(err.kind(), ProviderErrorKind::Auth);
    }

    #[tokio::test]
    async fn test_forbidden_status_classifies_as_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let err = client(&server)
            .generate(&ApiSecret::new("AIzaSyRevoked012345"), &asset(), "p")
            .await
            .expect_err("should fail");

        assert_eq!(err.to_string(), "HTTP 403: forbidden");
        assert_eq!(err.kind(), ProviderErrorKind::Auth);
    }

    #[tokio::test]
    async fn test_prompt_block_is_safety() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": { "blockReason": "PROHIBITED_CONTENT" }
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .generate(&ApiSecret::new("AIzaSyTestKey0123456"), &asset(), "p")
            .await
            .expect_err("should fail");

        assert_eq!(err.kind(), ProviderErrorKind::SafetyBlocked);
    }

    #[test]
    fn test_text_only_candidate() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "no" }] }, "finishReason": "STOP" }]
        }))
        .expect("parse");
        assert!(matches!(extract_image(response), Err(ProviderError::EmptyResult)));

        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{ "finishReason": "IMAGE_SAFETY" }]
        }))
        .expect("parse");
        assert!(matches!(extract_image(response), Err(ProviderError::Blocked(r)) if r == "IMAGE_SAFETY"));
    }
}
