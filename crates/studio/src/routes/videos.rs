//! Video purchase and render endpoints.
//!
//! A render is tied to a recorded video transaction. Starting it flips the
//! transaction to `rendering` and hands the submit-and-poll loop to a
//! background task, which writes the final status and video URL back to the
//! same row. Clients poll `GET /api/videos/{payment_id}`.
//!
//! A row left in `rendering` longer than the polling budget has lost its task
//! (usually to a restart) and may be started again.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{Instrument, instrument};

use styleswap_core::{RenderStatus, TransactionId, VideoOptions};

use super::checkout::parse_optional_email;
use crate::checkout::{CheckoutOutcome, CheckoutQuote, VideoCheckoutRequest};
use crate::db::{TransactionRecord, TransactionStore};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::generation::{
    GenerationError, PollPolicy, SourceAsset, VideoCredentials, VideoProvider, VideoRequest,
    render_video,
};
use crate::session;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoQuoteRequest {
    #[serde(default)]
    pub options: VideoOptions,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoBeginRequest {
    #[serde(default)]
    pub options: VideoOptions,
    pub coupon_code: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub payment_id: TransactionId,
    /// Raw base64 or a `data:` URL of the image to animate.
    pub image: String,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderStatusResponse {
    pub payment_id: TransactionId,
    pub render_status: RenderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// What to tell the visitor when the render did not produce a video.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl RenderStatusResponse {
    fn new(payment_id: TransactionId, status: RenderStatus, video_url: Option<String>) -> Self {
        let error = match status {
            RenderStatus::Failed => Some("Video generation failed. Please try again."),
            RenderStatus::TimedOut => Some("Rendering is taking too long. Please try again."),
            _ => None,
        };
        Self {
            payment_id,
            render_status: status,
            video_url,
            error,
        }
    }
}

/// Price a render.
///
/// POST /api/videos/quote
pub async fn quote(
    State(state): State<AppState>,
    Json(body): Json<VideoQuoteRequest>,
) -> Result<Json<CheckoutQuote>> {
    let quote = state
        .checkout()
        .quote_video(body.options, body.coupon_code.as_deref())
        .await?;
    Ok(Json(quote))
}

/// Begin a video checkout.
///
/// POST /api/videos/checkout
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<VideoBeginRequest>,
) -> Result<Json<CheckoutOutcome>> {
    let email = parse_optional_email(body.email.as_deref())?;
    add_breadcrumb("checkout", "Video checkout started", None);

    let outcome = state
        .checkout()
        .begin_video_checkout(VideoCheckoutRequest {
            visitor: session::visitor_id(&session).await?,
            options: body.options,
            coupon_code: body.coupon_code,
            email,
        })
        .await?;
    Ok(Json(outcome))
}

/// Start rendering a purchased video.
///
/// POST /api/videos/render
///
/// Responds 202 once the render is handed off. A render that failed, timed
/// out or stalled may be started again; one that is running or finished may not.
///
/// # Errors
///
/// - 404 if the payment is unknown or not a video purchase
/// - 409 if the render already started
/// - 503 if the video provider has no credentials
#[instrument(skip_all, fields(payment_id = %body.payment_id))]
pub async fn render(
    State(state): State<AppState>,
    Json(body): Json<RenderRequest>,
) -> Result<(StatusCode, Json<RenderStatusResponse>)> {
    let record = find_video(state.transactions().as_ref(), &body.payment_id).await?;
    let policy = PollPolicy::from(&state.config().video);
    match record.render_status {
        Some(status) if status.can_start() => {}
        Some(_) if stalled(&record, policy) => {
            tracing::warn!(since = %record.updated_at, "Restarting stalled render");
        }
        Some(status) => {
            return Err(AppError::Conflict(format!("render is already {status}")));
        }
        None => return Err(AppError::NotFound(format!("video {}", body.payment_id))),
    }

    let settings = state.settings().load().await?;
    let credentials = VideoCredentials::from_settings(&settings)
        .ok_or(GenerationError::NotConfigured("video provider"))?;

    let options = record
        .items
        .iter()
        .find_map(|item| item.video_options)
        .unwrap_or_default();
    let request = VideoRequest {
        asset: SourceAsset::parse(&body.image)?,
        prompt: body.prompt.filter(|p| !p.trim().is_empty()),
        negative_prompt: body.negative_prompt.filter(|p| !p.trim().is_empty()),
        options,
    };

    state
        .transactions()
        .update_render(&body.payment_id, RenderStatus::Rendering, None)
        .await?;

    let job = RenderJob {
        payment_id: body.payment_id.clone(),
        provider: Arc::clone(state.video_provider()),
        transactions: Arc::clone(state.transactions()),
        credentials,
        request,
        policy,
    };
    tokio::spawn(job.run().in_current_span());

    Ok((
        StatusCode::ACCEPTED,
        Json(RenderStatusResponse::new(
            body.payment_id,
            RenderStatus::Rendering,
            None,
        )),
    ))
}

/// Render status of a video purchase.
///
/// GET /api/videos/{payment_id}
pub async fn status(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<RenderStatusResponse>> {
    let payment_id = TransactionId::new(payment_id);
    let record = find_video(state.transactions().as_ref(), &payment_id).await?;

    Ok(Json(RenderStatusResponse::new(
        payment_id,
        record.render_status.unwrap_or_default(),
        record.artifact_url,
    )))
}

fn stalled(record: &TransactionRecord, policy: PollPolicy) -> bool {
    chrono::Duration::from_std(policy.budget())
        .is_ok_and(|budget| record.render_stalled(budget, Utc::now()))
}

async fn find_video(
    transactions: &dyn TransactionStore,
    payment_id: &TransactionId,
) -> Result<TransactionRecord> {
    transactions
        .get(payment_id)
        .await?
        .filter(|r| r.render_status.is_some())
        .ok_or_else(|| AppError::NotFound(format!("video {payment_id}")))
}

/// A render running detached from the request that started it.
struct RenderJob {
    payment_id: TransactionId,
    provider: Arc<dyn VideoProvider>,
    transactions: Arc<dyn TransactionStore>,
    credentials: VideoCredentials,
    request: VideoRequest,
    policy: PollPolicy,
}

impl RenderJob {
    async fn run(self) {
        let outcome = render_video(
            self.provider.as_ref(),
            &self.credentials,
            &self.request,
            self.policy,
        )
        .await;

        let (status, url) = match outcome {
            Ok(artifact) => (RenderStatus::Completed, Some(artifact.to_data_url())),
            Err(e @ GenerationError::Timeout { .. }) => {
                tracing::warn!(error = %e, "Video render timed out");
                (RenderStatus::TimedOut, None)
            }
            Err(e) => {
                tracing::error!(error = %e, "Video render failed");
                (RenderStatus::Failed, None)
            }
        };

        if let Err(e) = self
            .transactions
            .update_render(&self.payment_id, status, url.as_deref())
            .await
        {
            tracing::error!(error = %e, %status, "Could not record render outcome");
        }
    }
}
