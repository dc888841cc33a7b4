//! Admin route handlers.
//!
//! Everything except login requires the admin session flag. Secrets never
//! leave the server: credentials and payment keys are returned masked.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use styleswap_core::{
    ApiSecret, Coupon, CouponId, CouponKind, CredentialId, CredentialRecord, CredentialStatus,
    CurrencyCode, StyleId, StyleTemplate,
};

use crate::auth;
use crate::db::TransactionRecord;
use crate::db::styles::parse_import;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{AdminSettings, PaymentSettings};
use crate::session;
use crate::state::AppState;

/// Default and maximum page size for the transaction listing.
const DEFAULT_TRANSACTION_LIMIT: i64 = 50;
const MAX_TRANSACTION_LIMIT: i64 = 500;

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /admin/login
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>> {
    let settings = state.settings().load().await?;
    if let Err(e) = auth::authenticate(&settings, &body.username, &body.password) {
        tracing::warn!(error = %e, "Admin login rejected");
        return Err(e.into());
    }

    // Fresh session id on privilege change.
    session
        .cycle_id()
        .await
        .map_err(|e| AppError::Session(e.into()))?;
    session::set_admin(&session, true).await?;

    tracing::info!("Admin logged in");
    Ok(Json(json!({ "ok": true })))
}

/// POST /admin/logout
pub async fn logout(session: Session) -> Result<StatusCode> {
    session::set_admin(&session, false).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Credentials
// =============================================================================

/// A pooled credential as shown to the admin.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialView {
    pub id: CredentialId,
    pub label: String,
    pub masked_key: String,
    pub status: CredentialStatus,
    pub added_at: i64,
}

impl From<&CredentialRecord> for CredentialView {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            id: record.id.clone(),
            label: record.label.clone(),
            masked_key: record.secret.masked(),
            status: record.status,
            added_at: record.added_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddCredentialRequest {
    pub key: String,
    #[serde(default)]
    pub label: String,
}

/// GET /admin/credentials
pub async fn list_credentials(
    _: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<CredentialView>>> {
    let settings = state.settings().load().await?;
    Ok(Json(
        settings.gemini_api_keys.iter().map(CredentialView::from).collect(),
    ))
}

/// POST /admin/credentials
#[instrument(skip_all)]
pub async fn add_credential(
    _: RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<AddCredentialRequest>,
) -> Result<(StatusCode, Json<CredentialView>)> {
    let secret = ApiSecret::new(body.key.trim());
    if !secret.is_plausible() {
        return Err(AppError::BadRequest("API key is too short".to_string()));
    }

    let mut settings = state.settings().load().await?;
    if settings
        .gemini_api_keys
        .iter()
        .any(|r| r.secret.expose() == secret.expose())
    {
        return Err(AppError::Conflict("this key is already in the pool".to_string()));
    }

    let label = match body.label.trim() {
        "" => format!("Key {}", settings.gemini_api_keys.len() + 1),
        label => label.to_string(),
    };
    let record = CredentialRecord::new(
        CredentialId::generate(),
        secret,
        label,
        Utc::now().timestamp_millis(),
    );
    let view = CredentialView::from(&record);
    settings.gemini_api_keys.push(record);
    state.settings().save(&settings).await?;

    tracing::info!(credential_id = %view.id, "Credential added");
    Ok((StatusCode::CREATED, Json(view)))
}

/// DELETE /admin/credentials/{id}
pub async fn remove_credential(
    _: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = CredentialId::new(id);
    let mut settings = state.settings().load().await?;
    let before = settings.gemini_api_keys.len();
    settings.gemini_api_keys.retain(|r| r.id != id);
    if settings.gemini_api_keys.len() == before {
        return Err(AppError::NotFound(format!("credential {id}")));
    }
    state.settings().save(&settings).await?;

    tracing::info!(credential_id = %id, "Credential removed");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Coupons
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AddCouponRequest {
    pub code: String,
    #[serde(rename = "type")]
    pub kind: CouponKind,
    pub value: Decimal,
}

/// GET /admin/coupons
pub async fn list_coupons(_: RequireAdmin, State(state): State<AppState>) -> Result<Json<Vec<Coupon>>> {
    let settings = state.settings().load().await?;
    Ok(Json(settings.coupons))
}

/// POST /admin/coupons
///
/// Codes are normalized but not checked for uniqueness; lookups use the
/// first active match.
pub async fn add_coupon(
    _: RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<AddCouponRequest>,
) -> Result<(StatusCode, Json<Coupon>)> {
    let coupon = Coupon::new(&body.code, body.kind, body.value)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let saved = coupon.clone();
    state
        .settings()
        .update(Box::new(move |settings: &mut AdminSettings| {
            settings.coupons.push(saved);
        }))
        .await?;

    tracing::info!(code = %coupon.code, "Coupon added");
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// DELETE /admin/coupons/{id}
pub async fn remove_coupon(
    _: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = CouponId::new(id);
    let mut settings = state.settings().load().await?;
    let before = settings.coupons.len();
    settings.coupons.retain(|c| c.id != id);
    if settings.coupons.len() == before {
        return Err(AppError::NotFound(format!("coupon {id}")));
    }
    state.settings().save(&settings).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Styles
// =============================================================================

/// GET /admin/styles
///
/// Unlike the public listing, this includes unusable templates.
pub async fn list_styles(
    _: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<StyleTemplate>>> {
    let styles = state.styles().list().await?;
    Ok(Json(styles.as_ref().clone()))
}

/// POST /admin/styles
///
/// Upserts by id. An empty id creates a new style.
pub async fn save_style(
    _: RequireAdmin,
    State(state): State<AppState>,
    Json(mut style): Json<StyleTemplate>,
) -> Result<Json<StyleTemplate>> {
    if !style.is_usable() {
        return Err(AppError::BadRequest("a style needs a name and a prompt".to_string()));
    }
    if style.id.as_str().trim().is_empty() {
        style.id = StyleId::generate();
    }
    state.styles().save(&style).await?;
    Ok(Json(style))
}

/// DELETE /admin/styles/{id}
pub async fn remove_style(
    _: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.styles().delete(&StyleId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /admin/styles/export
pub async fn export_styles(
    _: RequireAdmin,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    let body = state.styles().export().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"styles.json\"",
            ),
        ],
        body,
    ))
}

/// POST /admin/styles/import
///
/// Body is an exported catalog. Existing styles with the same id are replaced.
pub async fn import_styles(
    _: RequireAdmin,
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Value>> {
    let styles = parse_import(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid style catalog: {e}")))?;
    let imported = state.styles().import(&styles).await?;

    tracing::info!(imported, "Styles imported");
    Ok(Json(json!({ "imported": imported })))
}

// =============================================================================
// Payment and video provider settings
// =============================================================================

/// Payment settings with secrets reduced to a hint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub gateway: String,
    pub key_id: String,
    pub key_secret_set: bool,
    pub currency: CurrencyCode,
    pub enabled: bool,
    pub photo_price: Decimal,
    pub video_base_price: Decimal,
    pub kling_access_key: String,
    pub kling_secret_key_set: bool,
}

impl From<&AdminSettings> for PaymentView {
    fn from(settings: &AdminSettings) -> Self {
        let payment = &settings.payment;
        Self {
            gateway: payment.gateway.clone(),
            key_id: payment.key_id.clone(),
            key_secret_set: !payment.key_secret.trim().is_empty(),
            currency: payment.currency,
            enabled: payment.enabled,
            photo_price: payment.photo_price,
            video_base_price: payment.video_base_price,
            kling_access_key: settings.kling_access_key.clone(),
            kling_secret_key_set: !settings.kling_secret_key.trim().is_empty(),
        }
    }
}

/// Partial update; absent fields are left alone.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdate {
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
    pub currency: Option<CurrencyCode>,
    pub enabled: Option<bool>,
    pub photo_price: Option<Decimal>,
    pub video_base_price: Option<Decimal>,
    pub kling_access_key: Option<String>,
    pub kling_secret_key: Option<String>,
}

impl PaymentUpdate {
    fn validate(&self) -> Result<()> {
        let negative = [self.photo_price, self.video_base_price]
            .into_iter()
            .flatten()
            .any(|p| p < Decimal::ZERO);
        if negative {
            return Err(AppError::BadRequest("prices must not be negative".to_string()));
        }
        Ok(())
    }

    fn apply(self, settings: &mut AdminSettings) {
        let PaymentSettings {
            key_id,
            key_secret,
            currency,
            enabled,
            photo_price,
            video_base_price,
            ..
        } = &mut settings.payment;

        if let Some(v) = self.key_id {
            *key_id = v.trim().to_string();
        }
        if let Some(v) = self.key_secret {
            *key_secret = v.trim().to_string();
        }
        if let Some(v) = self.currency {
            *currency = v;
        }
        if let Some(v) = self.enabled {
            *enabled = v;
        }
        if let Some(v) = self.photo_price {
            *photo_price = v;
        }
        if let Some(v) = self.video_base_price {
            *video_base_price = v;
        }
        if let Some(v) = self.kling_access_key {
            settings.kling_access_key = v.trim().to_string();
        }
        if let Some(v) = self.kling_secret_key {
            settings.kling_secret_key = v.trim().to_string();
        }
    }
}

/// GET /admin/payment
pub async fn payment_settings(
    _: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<PaymentView>> {
    let settings = state.settings().load().await?;
    Ok(Json(PaymentView::from(&settings)))
}

/// PUT /admin/payment
pub async fn update_payment_settings(
    _: RequireAdmin,
    State(state): State<AppState>,
    Json(update): Json<PaymentUpdate>,
) -> Result<Json<PaymentView>> {
    update.validate()?;
    let settings = state
        .settings()
        .update(Box::new(move |settings: &mut AdminSettings| update.apply(settings)))
        .await?;

    tracing::info!(
        enabled = settings.payment.enabled,
        video = settings.video_configured(),
        "Payment settings updated"
    );
    Ok(Json(PaymentView::from(&settings)))
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub limit: Option<i64>,
}

/// A transaction row as the admin sees it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    #[serde(flatten)]
    pub record: TransactionRecord,
    /// Paid through the gateway, as opposed to a locally issued free reference.
    pub via_gateway: bool,
}

impl From<TransactionRecord> for TransactionView {
    fn from(record: TransactionRecord) -> Self {
        Self {
            via_gateway: !record.payment_id.is_synthetic(),
            record,
        }
    }
}

/// GET /admin/transactions
pub async fn transactions(
    _: RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<TransactionView>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TRANSACTION_LIMIT)
        .clamp(1, MAX_TRANSACTION_LIMIT);
    let records = state.transactions().list_recent(limit).await?;
    Ok(Json(records.into_iter().map(TransactionView::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaymentDefaults;

    fn settings() -> AdminSettings {
        AdminSettings::defaults(&PaymentDefaults::default())
    }

    #[test]
    fn test_payment_view_hides_secrets() {
        let mut settings = settings();
        settings.payment.key_secret = "rzp_secret_value".to_string();
        settings.kling_secret_key = "kling_secret_value".to_string();

        let json = serde_json::to_value(PaymentView::from(&settings)).expect("serialize");
        let text = json.to_string();
        assert!(!text.contains("rzp_secret_value"));
        assert!(!text.contains("kling_secret_value"));
        assert_eq!(json["keySecretSet"], true);
        assert_eq!(json["klingSecretKeySet"], true);
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let mut settings = settings();
        let before = settings.payment.video_base_price;
        PaymentUpdate {
            photo_price: Some(Decimal::from(12)),
            kling_access_key: Some("  ak_123  ".to_string()),
            ..PaymentUpdate::default()
        }
        .apply(&mut settings);

        assert_eq!(settings.payment.photo_price, Decimal::from(12));
        assert_eq!(settings.payment.video_base_price, before);
        assert_eq!(settings.kling_access_key, "ak_123");
    }

    #[test]
    fn test_negative_price_rejected() {
        let update = PaymentUpdate {
            video_base_price: Some(Decimal::from(-1)),
            ..PaymentUpdate::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_credential_view_masks_key() {
        let record = CredentialRecord::new(
            CredentialId::new("k1"),
            ApiSecret::new("AIzaSyExample0123456789"),
            "Primary",
            7,
        );
        let view = CredentialView::from(&record);
        assert_eq!(view.masked_key, "••••6789");
        assert_eq!(view.status, CredentialStatus::Active);
    }
}
