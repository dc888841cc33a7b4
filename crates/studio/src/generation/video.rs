//! Image-to-video rendering.
//!
//! A render is a submitted task that is polled at a fixed interval until the
//! provider reports `succeed` or `failed`. Polls that error out are logged and
//! retried on the next tick; running out of attempts is a [`GenerationError::Timeout`].

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::instrument;

use styleswap_core::{ApiSecret, VideoOptions, VideoResolution};

use super::asset::{Artifact, SourceAsset};
use super::error::GenerationError;
use super::provider::ProviderError;
use crate::config::VideoConfig;
use crate::models::settings::AdminSettings;

const MODEL_NAME: &str = "kling-v1";
const DEFAULT_PROMPT: &str = "cinematic masterpiece animation";
const DEFAULT_NEGATIVE_PROMPT: &str = "blurry, low quality, distorted";

/// Lifetime of a signed request token, in seconds.
const TOKEN_TTL_SECS: u64 = 1800;

/// Access/secret key pair for the video provider.
#[derive(Debug, Clone)]
pub struct VideoCredentials {
    pub access_key: String,
    pub secret_key: ApiSecret,
}

impl VideoCredentials {
    /// Credentials from the admin settings, if both halves are present.
    #[must_use]
    pub fn from_settings(settings: &AdminSettings) -> Option<Self> {
        if !settings.video_configured() {
            return None;
        }
        Some(Self {
            access_key: settings.kling_access_key.trim().to_string(),
            secret_key: ApiSecret::new(settings.kling_secret_key.trim()),
        })
    }
}

/// What to animate.
#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub asset: SourceAsset,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub options: VideoOptions,
}

/// Provider-side state of a render task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Submitted or processing.
    Pending,
    Succeeded { url: String },
    Failed { reason: String },
}

/// A service that renders video from a still image.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Submit a render and return the provider task id.
    async fn submit(
        &self,
        credentials: &VideoCredentials,
        request: &VideoRequest,
    ) -> Result<String, ProviderError>;

    /// Current state of a task.
    async fn poll(
        &self,
        credentials: &VideoCredentials,
        task_id: &str,
    ) -> Result<TaskState, ProviderError>;
}

/// Fixed-interval polling bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 120,
        }
    }
}

impl PollPolicy {
    /// Longest a render can take: the submission slot plus every poll.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts.saturating_add(1))
    }
}

impl From<&VideoConfig> for PollPolicy {
    fn from(config: &VideoConfig) -> Self {
        Self {
            interval: config.poll_interval,
            max_attempts: config.poll_max_attempts,
        }
    }
}

/// Submit a render and poll it to completion.
///
/// # Errors
///
/// - `Provider` if submission fails or the task ends in `failed`
/// - `Timeout` if no terminal state is seen within `policy.max_attempts` polls
#[instrument(skip_all, fields(max_attempts = policy.max_attempts))]
pub async fn render_video(
    provider: &dyn VideoProvider,
    credentials: &VideoCredentials,
    request: &VideoRequest,
    policy: PollPolicy,
) -> Result<Artifact, GenerationError> {
    let task_id = provider.submit(credentials, request).await?;
    tracing::info!(%task_id, "Video task created");

    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;

        match provider.poll(credentials, &task_id).await {
            Ok(TaskState::Pending) => {
                tracing::debug!(%task_id, attempt, "Video still rendering");
            }
            Ok(TaskState::Succeeded { url }) => {
                tracing::info!(%task_id, attempt, "Video render complete");
                return Ok(Artifact::Video { url });
            }
            Ok(TaskState::Failed { reason }) => {
                tracing::warn!(%task_id, %reason, "Video render failed");
                return Err(ProviderError::TaskFailed(reason).into());
            }
            Err(e) => {
                tracing::warn!(%task_id, attempt, error = %e, "Polling glitch");
            }
        }
    }

    tracing::error!(%task_id, "Render process timed out");
    Err(GenerationError::Timeout {
        attempts: policy.max_attempts,
    })
}

// =============================================================================
// Kling
// =============================================================================

/// Kling image-to-video client.
#[derive(Clone)]
pub struct KlingClient {
    inner: Arc<KlingClientInner>,
}

struct KlingClientInner {
    client: reqwest::Client,
    base_url: String,
}

impl KlingClient {
    #[must_use]
    pub fn new(client: reqwest::Client, config: &VideoConfig) -> Self {
        Self {
            inner: Arc::new(KlingClientInner {
                client,
                base_url: config.kling_base_url.trim_end_matches('/').to_string(),
            }),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/videos/image2video{path}", self.inner.base_url)
    }

    async fn read_envelope(
        response: reqwest::Response,
    ) -> Result<TaskData, ProviderError> {
        let status = response.status();
        let body = response.text().await?;

        let envelope: Envelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(ProviderError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }
            Err(e) => return Err(ProviderError::Parse(format!("Failed to parse response: {e}"))),
        };

        if envelope.code != 0 || !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: format!(
                    "Kling API: {}",
                    envelope.message.unwrap_or_else(|| "Unknown Error".to_string())
                ),
            });
        }

        envelope
            .data
            .ok_or_else(|| ProviderError::Parse("response carried no data".to_string()))
    }
}

#[async_trait]
impl VideoProvider for KlingClient {
    #[instrument(skip_all)]
    async fn submit(
        &self,
        credentials: &VideoCredentials,
        request: &VideoRequest,
    ) -> Result<String, ProviderError> {
        let token = sign_token(credentials, unix_now())?;
        let mode = match request.options.resolution {
            VideoResolution::P1080 => "pro",
            VideoResolution::P540 | VideoResolution::P720 => "std",
        };
        let payload = SubmitRequest {
            model_name: MODEL_NAME,
            image: request.asset.base64(),
            prompt: request
                .prompt
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(DEFAULT_PROMPT),
            negative_prompt: request
                .negative_prompt
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(DEFAULT_NEGATIVE_PROMPT),
            cfg_scale: if mode == "pro" { 0.7 } else { 0.5 },
            mode,
            duration: request.options.duration.provider_value(),
        };

        let response = self
            .inner
            .client
            .post(self.endpoint(""))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;

        let data = Self::read_envelope(response).await?;
        data.task_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::Parse("response carried no task id".to_string()))
    }

    #[instrument(skip(self, credentials))]
    async fn poll(
        &self,
        credentials: &VideoCredentials,
        task_id: &str,
    ) -> Result<TaskState, ProviderError> {
        let token = sign_token(credentials, unix_now())?;
        let response = self
            .inner
            .client
            .get(self.endpoint(&format!("/{task_id}")))
            .bearer_auth(token)
            .send()
            .await?;

        let data = Self::read_envelope(response).await?;
        Ok(data.into_state())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Sign a short-lived HS256 token: `iss` is the access key.
fn sign_token(credentials: &VideoCredentials, now: u64) -> Result<String, ProviderError> {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = serde_json::to_vec(&Claims {
        iss: &credentials.access_key,
        exp: now + TOKEN_TTL_SECS,
        nbf: now.saturating_sub(5),
    })
    .map_err(|e| ProviderError::Credentials(e.to_string()))?;
    let signing_input = format!("{header}.{}", URL_SAFE_NO_PAD.encode(claims));

    let mut mac = Hmac::<Sha256>::new_from_slice(credentials.secret_key.expose().as_bytes())
        .map_err(|e| ProviderError::Credentials(e.to_string()))?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature}"))
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    exp: u64,
    nbf: u64,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    model_name: &'a str,
    image: &'a str,
    prompt: &'a str,
    negative_prompt: &'a str,
    cfg_scale: f32,
    mode: &'a str,
    duration: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    message: Option<String>,
    data: Option<TaskData>,
}

#[derive(Debug, Deserialize)]
struct TaskData {
    task_id: Option<String>,
    task_status: Option<String>,
    task_status_msg: Option<String>,
    task_result: Option<TaskResult>,
}

#[derive(Debug, Deserialize)]
struct TaskResult {
    #[serde(default)]
    videos: Vec<VideoResource>,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    url: String,
}

impl TaskData {
    fn into_state(self) -> TaskState {
        match self.task_status.as_deref() {
            Some("succeed") => {
                match self
                    .task_result
                    .and_then(|r| r.videos.into_iter().next())
                    .map(|v| v.url)
                {
                    Some(url) => TaskState::Succeeded { url },
                    None => TaskState::Failed {
                        reason: "Video link not provided by API.".to_string(),
                    },
                }
            }
            Some("failed") => TaskState::Failed {
                reason: self
                    .task_status_msg
                    .unwrap_or_else(|| "Rejected".to_string()),
            },
            _ => TaskState::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use styleswap_core::VideoDuration;

    fn credentials() -> VideoCredentials {
        VideoCredentials {
            access_key: "ak-test".to_string(),
            secret_key: ApiSecret::new("sk-test-0123456789"),
        }
    }

    fn request() -> VideoRequest {
        VideoRequest {
            asset: SourceAsset::parse("aGVsbG8=").expect("asset"),
            prompt: None,
            negative_prompt: None,
            options: VideoOptions {
                duration: VideoDuration::Long,
                resolution: VideoResolution::P1080,
            },
        }
    }

    /// Provider that reports `Pending` a fixed number of times, then `last`.
    struct CountingProvider {
        pending_polls: u32,
        last: Option<TaskState>,
        polls: AtomicU32,
        glitch_on: Mutex<Vec<u32>>,
    }

    impl CountingProvider {
        fn new(pending_polls: u32, last: Option<TaskState>) -> Self {
            Self {
                pending_polls,
                last,
                polls: AtomicU32::new(0),
                glitch_on: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VideoProvider for CountingProvider {
        async fn submit(
            &self,
            _credentials: &VideoCredentials,
            _request: &VideoRequest,
        ) -> Result<String, ProviderError> {
            Ok("task-1".to_string())
        }

        async fn poll(
            &self,
            _credentials: &VideoCredentials,
            _task_id: &str,
        ) -> Result<TaskState, ProviderError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.glitch_on.lock().expect("lock").contains(&n) {
                return Err(ProviderError::Parse("glitch".to_string()));
            }
            if n <= self.pending_polls {
                return Ok(TaskState::Pending);
            }
            Ok(self.last.clone().unwrap_or(TaskState::Pending))
        }
    }

    fn policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(10),
            max_attempts,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_terminal_times_out() {
        let provider = CountingProvider::new(u32::MAX, None);
        let started = tokio::time::Instant::now();

        let result = render_video(&provider, &credentials(), &request(), policy(120)).await;

        assert!(matches!(result, Err(GenerationError::Timeout { attempts: 120 })));
        assert_eq!(provider.polls.load(Ordering::SeqCst), 120);
        assert_eq!(started.elapsed(), Duration::from_secs(1200));
    }

    #[test]
    fn test_budget_covers_every_poll() {
        assert_eq!(policy(120).budget(), Duration::from_secs(1210));
        assert_eq!(PollPolicy::default().budget(), Duration::from_secs(1210));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_pending_polls() {
        let provider = CountingProvider::new(
            3,
            Some(TaskState::Succeeded {
                url: "https://cdn.example/v.mp4".to_string(),
            }),
        );

        let artifact = render_video(&provider, &credentials(), &request(), policy(10))
            .await
            .expect("render");

        assert_eq!(
            artifact,
            Artifact::Video {
                url: "https://cdn.example/v.mp4".to_string()
            }
        );
        assert_eq!(provider.polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_task_is_terminal() {
        let provider = CountingProvider::new(
            0,
            Some(TaskState::Failed {
                reason: "Rejected".to_string(),
            }),
        );

        let result = render_video(&provider, &credentials(), &request(), policy(10)).await;

        assert!(matches!(
            result,
            Err(GenerationError::Provider(ProviderError::TaskFailed(_)))
        ));
        assert_eq!(provider.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_keep_polling() {
        let provider = CountingProvider::new(
            0,
            Some(TaskState::Succeeded {
                url: "https://cdn.example/v.mp4".to_string(),
            }),
        );
        provider.glitch_on.lock().expect("lock").extend([1, 2]);

        render_video(&provider, &credentials(), &request(), policy(5))
            .await
            .expect("third poll succeeds");
        assert_eq!(provider.polls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_token_shape_and_signature() {
        let token = sign_token(&credentials(), 1_700_000_000).expect("token");
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).expect("b64")).expect("json");
        assert_eq!(claims["iss"], "ak-test");
        assert_eq!(claims["exp"], 1_700_001_800);
        assert_eq!(claims["nbf"], 1_699_999_995);

        let mut mac = Hmac::<Sha256>::new_from_slice(b"sk-test-0123456789").expect("mac");
        mac.update(format!("{}.{}", parts[0], parts[1]).as_bytes());
        let expected = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        assert_eq!(parts[2], expected);
    }

    fn kling(server: &MockServer) -> KlingClient {
        KlingClient::new(
            reqwest::Client::new(),
            &VideoConfig {
                kling_base_url: server.uri(),
                poll_interval: Duration::from_millis(1),
                poll_max_attempts: 3,
            },
        )
    }

    #[tokio::test]
    async fn test_kling_submit_and_poll() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/videos/image2video"))
            .and(header_exists("authorization"))
            .and(wiremock::matchers::body_partial_json(json!({
                "model_name": "kling-v1",
                "image": "aGVsbG8=",
                "duration": "10",
                "mode": "pro"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "message": "SUCCEED",
                "data": { "task_id": "task-42", "task_status": "submitted" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/videos/image2video/task-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {
                    "task_id": "task-42",
                    "task_status": "succeed",
                    "task_result": { "videos": [{ "id": "v1", "url": "https://cdn.example/42.mp4" }] }
                }
            })))
            .mount(&server)
            .await;

        let client = kling(&server);
        let task_id = client.submit(&credentials(), &request()).await.expect("submit");
        assert_eq!(task_id, "task-42");

        let state = client.poll(&credentials(), &task_id).await.expect("poll");
        assert_eq!(
            state,
            TaskState::Succeeded {
                url: "https://cdn.example/42.mp4".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_kling_nonzero_code_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 1102,
                "message": "Account balance not enough"
            })))
            .mount(&server)
            .await;

        let err = kling(&server)
            .submit(&credentials(), &request())
            .await
            .expect_err("should fail");
        assert_eq!(err.to_string(), "HTTP 200: Kling API: Account balance not enough");
    }

    #[test]
    fn test_failed_status_carries_reason() {
        let data: TaskData = serde_json::from_value(json!({
            "task_status": "failed",
            "task_status_msg": "Image contains prohibited content"
        }))
        .expect("parse");
        assert_eq!(
            data.into_state(),
            TaskState::Failed {
                reason: "Image contains prohibited content".to_string()
            }
        );

        let data: TaskData =
            serde_json::from_value(json!({ "task_status": "processing" })).expect("parse");
        assert_eq!(data.into_state(), TaskState::Pending);
    }
}
