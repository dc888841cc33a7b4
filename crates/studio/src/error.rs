//! Unified error handling with Sentry integration.
//!
//! Every route handler returns `Result<T, AppError>`. Server-side failures are
//! captured to Sentry and logged with full detail; clients only ever receive a
//! short message as `{ "error": ..., "retryable": ... }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AdminAuthError;
use crate::checkout::CheckoutError;
use crate::db::RepositoryError;
use crate::generation::GenerationError;
use crate::session::SessionError;

/// Application-level error type for the studio.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Auth error: {0}")]
    Auth(#[from] AdminAuthError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Generation(err) => match err {
                GenerationError::NoCredentials | GenerationError::NotConfigured(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                GenerationError::AllCredentialsFailed { .. } | GenerationError::Provider(_) => {
                    StatusCode::BAD_GATEWAY
                }
                GenerationError::SafetyBlocked(_) => StatusCode::UNPROCESSABLE_ENTITY,
                GenerationError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                GenerationError::InvalidAsset(_) => StatusCode::BAD_REQUEST,
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart | CheckoutError::SignatureMismatch => {
                    StatusCode::BAD_REQUEST
                }
                CheckoutError::PaymentFailed(_) | CheckoutError::PaymentDismissed => {
                    StatusCode::PAYMENT_REQUIRED
                }
                CheckoutError::PaymentNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                CheckoutError::FreeSampleClaimed => StatusCode::CONFLICT,
                CheckoutError::Gateway(_) => StatusCode::BAD_GATEWAY,
                CheckoutError::Repository(_) | CheckoutError::Session(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Auth(err) => match err {
                AdminAuthError::InvalidCredentials | AdminAuthError::LoginDisabled => {
                    StatusCode::UNAUTHORIZED
                }
                AdminAuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
                AdminAuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message shown to the client. Provider and database detail never leaks.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Generation(err) => err.user_message().to_string(),
            Self::Checkout(err) => err.user_message().to_string(),
            Self::Auth(AdminAuthError::InvalidCredentials) => "Invalid credentials".to_string(),
            Self::Auth(AdminAuthError::LoginDisabled) => "Admin login is disabled".to_string(),
            Self::Auth(AdminAuthError::WeakPassword(msg)) => msg.clone(),
            Self::Auth(AdminAuthError::PasswordHash) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Generation(err) => err.is_retryable(),
            Self::Checkout(err) => err.is_recoverable(),
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, %status, "Request rejected");
        }

        let body = json!({
            "error": self.public_message(),
            "retryable": self.retryable(),
        });
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for visitor actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;
    use crate::generation::ProviderError;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body(err: AppError) -> serde_json::Value {
        let bytes = to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Generation(GenerationError::NoCredentials)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Generation(GenerationError::SafetyBlocked(
                "SAFETY".to_string()
            ))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Generation(GenerationError::Timeout { attempts: 120 })),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::PaymentDismissed)),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict("dup".to_string()))),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_provider_detail_is_hidden() {
        let err = AppError::Generation(GenerationError::Provider(ProviderError::Api {
            status: 500,
            message: "backend exploded with key AIzaSy...".to_string(),
        }));

        let json = body(err).await;
        assert_eq!(json["error"], "Generation failed. Please try again.");
        assert_eq!(json["retryable"], true);
    }

    #[tokio::test]
    async fn test_client_errors_keep_message() {
        let json = body(AppError::BadRequest("style not found".to_string())).await;
        assert_eq!(json["error"], "Bad request: style not found");
        assert_eq!(json["retryable"], false);
    }
}
