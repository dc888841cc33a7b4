//! Admin authentication extractor.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_sessions::Session;

use crate::session;

/// Extractor that requires an admin session.
///
/// ```rust,ignore
/// async fn list_coupons(_: RequireAdmin, State(state): State<AppState>) -> Result<Json<Vec<Coupon>>> {
///     // ...
/// }
/// ```
pub struct RequireAdmin;

/// Why an admin request was turned away.
#[derive(Debug)]
pub enum AdminRejection {
    /// No session layer ran for this request.
    MissingSession,
    /// The session is not logged in as admin.
    NotLoggedIn,
}

impl IntoResponse for AdminRejection {
    fn into_response(self) -> Response {
        match self {
            Self::MissingSession => {
                tracing::error!("Admin route reached without a session layer");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            Self::NotLoggedIn => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Admin login required", "retryable": false })),
            )
                .into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AdminRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AdminRejection::MissingSession)?;

        match session::is_admin(session).await {
            Ok(true) => Ok(Self),
            Ok(false) => Err(AdminRejection::NotLoggedIn),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read admin flag");
                Err(AdminRejection::NotLoggedIn)
            }
        }
    }
}
