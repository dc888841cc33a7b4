//! Photo checkout endpoints.
//!
//! Prices are always computed server-side from the admin settings; the
//! client only says which photos it wants and which coupon it typed.

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;

use styleswap_core::{Email, OrderId};

use crate::checkout::{
    AbandonReason, CartCheckoutRequest, CheckoutOutcome, CheckoutQuote, PaymentConfirmation,
    PhotoLine, Receipt,
};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::session;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub items: Vec<PhotoLine>,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginRequest {
    pub items: Vec<PhotoLine>,
    pub coupon_code: Option<String>,
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonRequest {
    pub order_id: OrderId,
    #[serde(flatten)]
    pub reason: AbandonReason,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeSampleRequest {
    pub item: PhotoLine,
    pub email: Option<String>,
}

/// Parse an email, treating an empty string as absent.
pub(crate) fn parse_optional_email(input: Option<&str>) -> Result<Option<Email>> {
    input
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Email::parse)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Price a cart.
///
/// POST /api/checkout/quote
pub async fn quote(
    State(state): State<AppState>,
    Json(body): Json<QuoteRequest>,
) -> Result<Json<CheckoutQuote>> {
    let quote = state
        .checkout()
        .quote_cart(&body.items, body.coupon_code.as_deref())
        .await?;
    Ok(Json(quote))
}

/// Begin a photo checkout.
///
/// POST /api/checkout
///
/// Responds with `{"outcome": "free", ...}` when the total is zero, otherwise
/// `{"outcome": "payment_required", ...}` carrying the widget parameters.
pub async fn begin(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<BeginRequest>,
) -> Result<Json<CheckoutOutcome>> {
    let email = Email::parse(&body.email).map_err(|e| AppError::BadRequest(e.to_string()))?;
    add_breadcrumb("checkout", "Checkout started", None);

    let outcome = state
        .checkout()
        .begin_checkout(CartCheckoutRequest {
            visitor: session::visitor_id(&session).await?,
            items: body.items,
            coupon_code: body.coupon_code,
            email,
        })
        .await?;
    Ok(Json(outcome))
}

/// Payment widget success callback.
///
/// POST /api/checkout/confirm
pub async fn confirm(
    State(state): State<AppState>,
    Json(body): Json<PaymentConfirmation>,
) -> Result<Json<Receipt>> {
    let receipt = state.checkout().confirm_payment(body).await?;
    Ok(Json(receipt))
}

/// Payment widget failure or dismissal callback.
///
/// POST /api/checkout/abandon
///
/// 200 with the message to show and whether the visitor may simply try
/// again. Only the visitor that opened the order can drop it.
pub async fn abandon(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<AbandonRequest>,
) -> Result<Json<Value>> {
    let visitor = session::visitor_id(&session).await?;
    let err = state
        .checkout()
        .abandon(&visitor, &body.order_id, body.reason)
        .await;
    Ok(Json(json!({
        "error": err.user_message(),
        "retryable": err.is_recoverable(),
    })))
}

/// Unlock one photo for free, once per visitor session.
///
/// POST /api/free-sample
pub async fn free_sample(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<FreeSampleRequest>,
) -> Result<Json<Receipt>> {
    let email = parse_optional_email(body.email.as_deref())?;
    let receipt = state
        .checkout()
        .claim_free_sample(&session, body.item, email)
        .await?;
    Ok(Json(receipt))
}
