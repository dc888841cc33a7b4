//! Image generation endpoint.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use styleswap_core::StyleId;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::generation::{CandidateList, GenerationRequest, SourceAsset, compose_prompt};
use crate::session;
use crate::state::AppState;

/// Request body for a generation.
///
/// Either `style_id` names a catalog style, or `prompt` carries a free-form
/// style prompt. `refinement` is appended to whichever is used.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Raw base64 or a `data:` URL.
    pub image: String,
    pub style_id: Option<StyleId>,
    pub prompt: Option<String>,
    pub refinement: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    /// `data:` URL of the generated image.
    pub image: String,
}

/// Restyle an uploaded photo.
///
/// POST /api/generate
///
/// # Errors
///
/// - 400 if the image is malformed or no style was given
/// - 404 if `styleId` is unknown
/// - 503 if no credential is configured
/// - 502 / 422 if every credential failed or the result was safety-blocked
#[instrument(skip_all, fields(style_id))]
pub async fn generate(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>> {
    let style_prompt = match (&body.style_id, body.prompt.as_deref()) {
        (Some(id), _) => {
            tracing::Span::current().record("style_id", id.as_str());
            let style = state.styles().get(id).await?;
            if !style.is_usable() {
                return Err(AppError::BadRequest(format!("style {id} has no prompt")));
            }
            style.prompt
        }
        (None, Some(prompt)) if !prompt.trim().is_empty() => prompt.to_string(),
        _ => return Err(AppError::BadRequest("a style or prompt is required".to_string())),
    };

    let asset = SourceAsset::parse(&body.image)?;
    let request = GenerationRequest {
        asset,
        prompt: compose_prompt(&style_prompt, body.refinement.as_deref()),
    };

    let settings = state.settings().load().await?;
    let mut candidates =
        CandidateList::build(&settings.gemini_api_keys, state.config().gemini.fallback_secret());

    let visitor = session::visitor_id(&session).await?;
    add_breadcrumb("generation", "Generation requested", Some(&[("visitor", &visitor)]));
    tracing::info!(%visitor, candidates = candidates.len(), "Generating image");

    let artifact = state
        .dispatcher()
        .generate(&request, &mut candidates, state.settings().as_ref())
        .await?;

    Ok(Json(GenerateResponse {
        image: artifact.to_data_url(),
    }))
}
