//! Public style listing.

use axum::{Json, extract::State};

use styleswap_core::StyleTemplate;

use crate::error::Result;
use crate::state::AppState;

/// List the styles a visitor can pick, in display order.
///
/// GET /api/styles
///
/// Templates without a name or prompt are left out.
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<StyleTemplate>>> {
    let styles = state.styles().list().await?;
    Ok(Json(
        styles.iter().filter(|s| s.is_usable()).cloned().collect(),
    ))
}
