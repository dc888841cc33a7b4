//! Coupon-priced checkout.
//!
//! A checkout is priced server-side from the admin settings, then either
//! completes immediately (total of zero) or creates a gateway order the
//! client widget pays. Orders awaiting payment are held in memory until the
//! widget reports back through [`CheckoutService::confirm_payment`] or
//! [`CheckoutService::abandon`]. Each pending order belongs to the visitor
//! that opened it; only that visitor can abandon it.
//!
//! Every completed checkout, paid or free, writes one [`TransactionRecord`].

pub mod error;
pub mod gateway;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use styleswap_core::{
    CartLine, CartLineId, CartSelection, Coupon, CurrencyCode, Email, OrderId, PaymentStatus,
    PriceQuote, RenderStatus, TransactionId, VideoOptions, find_coupon, quote, video_quote,
};

use crate::config::PaymentDefaults;
use crate::db::transactions::TransactionItem;
use crate::db::{SettingsStore, TransactionRecord, TransactionStore};
use crate::models::AdminSettings;
use crate::session::{self, SessionState};

pub use error::CheckoutError;
pub use gateway::{
    GatewayCredentials, GatewayError, GatewayOrder, PaymentGateway, RazorpayClient,
    verify_payment_signature,
};

/// How long an unpaid order is remembered.
const PENDING_ORDER_TTL: Duration = Duration::from_secs(60 * 60);

/// Item id recorded for a video purchase.
const VIDEO_ITEM_ID: &str = "video";

/// A photo the visitor wants unlocked. Prices come from settings, never the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoLine {
    pub id: CartLineId,
    #[serde(default)]
    pub style_name: String,
}

/// A quote plus whether a supplied coupon code was rejected.
///
/// A rejected code is not an error: the quote simply carries no discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutQuote {
    #[serde(flatten)]
    pub quote: PriceQuote,
    pub coupon_invalid: bool,
}

#[derive(Debug, Clone)]
pub struct CartCheckoutRequest {
    /// Session visitor id; owns the pending order.
    pub visitor: String,
    pub items: Vec<PhotoLine>,
    pub coupon_code: Option<String>,
    pub email: Email,
}

#[derive(Debug, Clone)]
pub struct VideoCheckoutRequest {
    pub visitor: String,
    pub options: VideoOptions,
    pub coupon_code: Option<String>,
    pub email: Option<Email>,
}

/// Everything the client widget needs to take a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub key_id: String,
    pub order_id: OrderId,
    /// Integer minor units.
    pub amount: i64,
    pub currency: CurrencyCode,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    pub quote: PriceQuote,
}

/// A completed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub payment_id: TransactionId,
    pub quote: PriceQuote,
    pub items: Vec<TransactionItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_status: Option<RenderStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// Total was zero; the purchase is already recorded.
    Free(Receipt),
    /// Open the payment widget with this intent.
    PaymentRequired(PaymentIntent),
}

/// Completion callback data from the payment widget.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    pub order_id: OrderId,
    pub payment_id: String,
    pub signature: String,
}

/// Why a payment did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbandonReason {
    Failed {
        #[serde(default)]
        description: Option<String>,
    },
    Dismissed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PurchaseKind {
    Photos,
    Video,
}

impl PurchaseKind {
    const fn initial_render_status(self) -> Option<RenderStatus> {
        match self {
            Self::Photos => None,
            Self::Video => Some(RenderStatus::Pending),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingCheckout {
    visitor: String,
    quote: PriceQuote,
    items: Vec<TransactionItem>,
    email: Option<Email>,
    kind: PurchaseKind,
}

/// Checkout orchestration.
#[derive(Clone)]
pub struct CheckoutService {
    settings: Arc<dyn SettingsStore>,
    transactions: Arc<dyn TransactionStore>,
    gateway: Arc<dyn PaymentGateway>,
    defaults: PaymentDefaults,
    pending: Cache<OrderId, PendingCheckout>,
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        transactions: Arc<dyn TransactionStore>,
        gateway: Arc<dyn PaymentGateway>,
        defaults: PaymentDefaults,
    ) -> Self {
        Self {
            settings,
            transactions,
            gateway,
            defaults,
            pending: Cache::builder().time_to_live(PENDING_ORDER_TTL).build(),
        }
    }

    /// Price a photo cart.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCart` for an empty selection, or a repository error if
    /// settings cannot be loaded.
    pub async fn quote_cart(
        &self,
        items: &[PhotoLine],
        coupon_code: Option<&str>,
    ) -> Result<CheckoutQuote, CheckoutError> {
        let settings = self.settings.load().await?;
        let (_, quote) = price_cart(&settings, items, coupon_code)?;
        Ok(quote)
    }

    /// Start a photo checkout.
    ///
    /// # Errors
    ///
    /// - `EmptyCart` if nothing is selected
    /// - `PaymentNotConfigured` if a charge is due and the gateway has no keys
    /// - `Gateway` if the order cannot be created
    #[instrument(skip_all, fields(items = request.items.len()))]
    pub async fn begin_checkout(
        &self,
        request: CartCheckoutRequest,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let settings = self.settings.load().await?;
        let (selection, priced) = price_cart(&settings, &request.items, request.coupon_code.as_deref())?;

        let items = selection
            .lines()
            .iter()
            .map(|line| TransactionItem {
                id: line.id.to_string(),
                description: photo_description(line),
                unit_price: line.unit_price,
                video_options: None,
            })
            .collect();
        let description = format!("Get {} High-Quality Photos", selection.len());

        self.settle(
            &settings,
            PendingCheckout {
                visitor: request.visitor,
                quote: priced.quote,
                items,
                email: Some(request.email),
                kind: PurchaseKind::Photos,
            },
            description,
            TransactionId::free_checkout,
        )
        .await
    }

    /// Price a video render.
    ///
    /// # Errors
    ///
    /// Returns a repository error if settings cannot be loaded.
    pub async fn quote_video(
        &self,
        options: VideoOptions,
        coupon_code: Option<&str>,
    ) -> Result<CheckoutQuote, CheckoutError> {
        let settings = self.settings.load().await?;
        Ok(price_video(&settings, options, coupon_code))
    }

    /// Start a video checkout. A free video is recorded with a pending render.
    ///
    /// # Errors
    ///
    /// Same as [`Self::begin_checkout`], minus `EmptyCart`.
    #[instrument(skip_all)]
    pub async fn begin_video_checkout(
        &self,
        request: VideoCheckoutRequest,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let settings = self.settings.load().await?;
        let priced = price_video(&settings, request.options, request.coupon_code.as_deref());

        let items = vec![TransactionItem {
            id: VIDEO_ITEM_ID.to_string(),
            description: "Video Render (kling)".to_string(),
            unit_price: priced.quote.subtotal,
            video_options: Some(request.options),
        }];

        self.settle(
            &settings,
            PendingCheckout {
                visitor: request.visitor,
                quote: priced.quote,
                items,
                email: request.email,
                kind: PurchaseKind::Video,
            },
            "AI Video Render".to_string(),
            TransactionId::free_render,
        )
        .await
    }

    /// Record a completed payment.
    ///
    /// # Errors
    ///
    /// - `PaymentFailed` if the order is unknown or expired
    /// - `SignatureMismatch` if the gateway signature does not verify
    /// - `PaymentNotConfigured` if the merchant keys disappeared meanwhile
    #[instrument(skip_all, fields(order_id = %confirmation.order_id))]
    pub async fn confirm_payment(
        &self,
        confirmation: PaymentConfirmation,
    ) -> Result<Receipt, CheckoutError> {
        let Some(pending) = self.pending.get(&confirmation.order_id).await else {
            tracing::warn!("Confirmation for unknown order");
            return Err(CheckoutError::PaymentFailed("unknown order".to_string()));
        };

        let settings = self.settings.load().await?;
        let credentials = GatewayCredentials::resolve(&settings.payment, &self.defaults)
            .ok_or(CheckoutError::PaymentNotConfigured)?;

        if !self.gateway.verify_signature(
            &credentials,
            &confirmation.order_id,
            &confirmation.payment_id,
            &confirmation.signature,
        ) {
            tracing::error!("Payment signature mismatch");
            return Err(CheckoutError::SignatureMismatch);
        }

        self.pending.invalidate(&confirmation.order_id).await;
        let receipt = self
            .record(
                TransactionId::new(confirmation.payment_id),
                pending,
                settings.payment.currency,
                PaymentStatus::Success,
            )
            .await?;

        tracing::info!(payment_id = %receipt.payment_id, "Payment confirmed");
        Ok(receipt)
    }

    /// Forget an order the widget reported as failed or dismissed, and return
    /// the error to show the visitor.
    ///
    /// An order opened by a different visitor is left in place.
    pub async fn abandon(
        &self,
        visitor: &str,
        order_id: &OrderId,
        reason: AbandonReason,
    ) -> CheckoutError {
        match self.pending.get(order_id).await {
            Some(pending) if pending.visitor == visitor => {
                self.pending.invalidate(order_id).await;
            }
            Some(_) => tracing::warn!(%order_id, "Abandon for another visitor's order ignored"),
            None => {}
        }
        match reason {
            AbandonReason::Failed { description } => {
                let description = description.unwrap_or_else(|| "payment failed".to_string());
                tracing::warn!(%order_id, %description, "Payment failed");
                CheckoutError::PaymentFailed(description)
            }
            AbandonReason::Dismissed => {
                tracing::info!(%order_id, "Payment dismissed");
                CheckoutError::PaymentDismissed
            }
        }
    }

    /// Unlock one photo for free, once per session.
    ///
    /// # Errors
    ///
    /// Returns `FreeSampleClaimed` if this session already used its sample.
    #[instrument(skip_all)]
    pub async fn claim_free_sample<S>(
        &self,
        session: &S,
        line: PhotoLine,
        email: Option<Email>,
    ) -> Result<Receipt, CheckoutError>
    where
        S: SessionState + ?Sized,
    {
        if session::free_sample_claimed(session).await? {
            return Err(CheckoutError::FreeSampleClaimed);
        }

        let settings = self.settings.load().await?;
        let currency = settings.payment.currency;
        let pending = PendingCheckout {
            visitor: session::visitor_id(session).await?,
            quote: PriceQuote {
                subtotal: Decimal::ZERO,
                discount: Decimal::ZERO,
                total: Decimal::ZERO,
                currency,
                coupon_code: None,
            },
            items: vec![TransactionItem {
                id: line.id.to_string(),
                description: format!("Free sample: {}", display_style(&line.style_name)),
                unit_price: Decimal::ZERO,
                video_options: None,
            }],
            email,
            kind: PurchaseKind::Photos,
        };

        let receipt = self
            .record(TransactionId::free_sample(Utc::now()), pending, currency, PaymentStatus::Free)
            .await?;
        session::mark_free_sample_claimed(session).await?;
        Ok(receipt)
    }

    /// Either record a free purchase or open a gateway order for it.
    async fn settle(
        &self,
        settings: &AdminSettings,
        pending: PendingCheckout,
        description: String,
        free_id: fn(chrono::DateTime<Utc>) -> TransactionId,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let currency = settings.payment.currency;

        if !pending.quote.requires_payment() {
            tracing::info!(coupon = ?pending.quote.coupon_code, "Zero total, skipping payment");
            let receipt = self
                .record(free_id(Utc::now()), pending, currency, PaymentStatus::Free)
                .await?;
            return Ok(CheckoutOutcome::Free(receipt));
        }

        let credentials = GatewayCredentials::resolve(&settings.payment, &self.defaults)
            .ok_or(CheckoutError::PaymentNotConfigured)?;

        let receipt_ref = format!("rcpt_{}", Utc::now().timestamp_millis());
        let order = self
            .gateway
            .create_order(&credentials, &pending.quote.charge(), &receipt_ref)
            .await?;

        let intent = PaymentIntent {
            key_id: credentials.key_id,
            order_id: order.id.clone(),
            amount: order.amount,
            currency,
            description,
            email: pending.email.clone(),
            quote: pending.quote.clone(),
        };
        self.pending.insert(order.id, pending).await;

        Ok(CheckoutOutcome::PaymentRequired(intent))
    }

    async fn record(
        &self,
        payment_id: TransactionId,
        pending: PendingCheckout,
        currency: CurrencyCode,
        status: PaymentStatus,
    ) -> Result<Receipt, CheckoutError> {
        let render_status = pending.kind.initial_render_status();
        let now = Utc::now();
        let record = TransactionRecord {
            payment_id: payment_id.clone(),
            user_email: pending.email,
            amount: pending.quote.total,
            currency,
            items: pending.items.clone(),
            status,
            render_status,
            artifact_url: None,
            created_at: now,
            updated_at: now,
        };
        self.transactions.insert(&record).await?;
        tracing::info!(%payment_id, ?status, amount = %record.amount, "Transaction recorded");

        Ok(Receipt {
            payment_id,
            quote: pending.quote,
            items: pending.items,
            render_status,
        })
    }
}

/// Look up a coupon. An unknown or inactive code yields `(None, true)`.
fn resolve_coupon<'a>(settings: &'a AdminSettings, code: Option<&str>) -> (Option<&'a Coupon>, bool) {
    match code.map(str::trim).filter(|c| !c.is_empty()) {
        None => (None, false),
        Some(code) => match find_coupon(&settings.coupons, code) {
            Some(coupon) => (Some(coupon), false),
            None => {
                tracing::debug!(code, "Invalid coupon code");
                (None, true)
            }
        },
    }
}

fn price_cart(
    settings: &AdminSettings,
    items: &[PhotoLine],
    coupon_code: Option<&str>,
) -> Result<(CartSelection, CheckoutQuote), CheckoutError> {
    if items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let selection = CartSelection::new(
        items
            .iter()
            .map(|item| CartLine {
                id: item.id.clone(),
                unit_price: settings.payment.photo_price,
                style_name: item.style_name.clone(),
            })
            .collect(),
    );
    let (coupon, coupon_invalid) = resolve_coupon(settings, coupon_code);
    let quote = quote(&selection, coupon, settings.payment.currency);

    Ok((selection, CheckoutQuote { quote, coupon_invalid }))
}

fn price_video(settings: &AdminSettings, options: VideoOptions, coupon_code: Option<&str>) -> CheckoutQuote {
    let (coupon, coupon_invalid) = resolve_coupon(settings, coupon_code);
    CheckoutQuote {
        quote: video_quote(
            settings.payment.video_base_price,
            options,
            coupon,
            settings.payment.currency,
        ),
        coupon_invalid,
    }
}

fn photo_description(line: &CartLine) -> String {
    format!("High-res photo: {}", display_style(&line.style_name))
}

fn display_style(name: &str) -> &str {
    if name.trim().is_empty() { "Custom" } else { name }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use styleswap_core::{CouponKind, Price, VideoDuration, VideoResolution};

    use super::*;
    use crate::db::{MemorySettingsStore, MemoryTransactionStore};
    use crate::session::MemorySession;

    const SECRET: &str = "secret_xyz";
    const VISITOR: &str = "visitor-1";

    /// Gateway that hands out sequential order ids and checks real signatures.
    #[derive(Default)]
    struct FakeGateway {
        charges: Mutex<Vec<Price>>,
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_order(
            &self,
            _credentials: &GatewayCredentials,
            charge: &Price,
            _receipt: &str,
        ) -> Result<GatewayOrder, GatewayError> {
            let mut charges = self.charges.lock().expect("lock");
            charges.push(*charge);
            Ok(GatewayOrder {
                id: OrderId::new(format!("order_{}", charges.len())),
                amount: charge.to_minor_units().expect("minor units"),
            })
        }

        fn verify_signature(
            &self,
            credentials: &GatewayCredentials,
            order_id: &OrderId,
            payment_id: &str,
            signature: &str,
        ) -> bool {
            verify_payment_signature(
                credentials.key_secret.expose(),
                order_id.as_str(),
                payment_id,
                signature,
            )
        }
    }

    struct Harness {
        service: CheckoutService,
        transactions: Arc<MemoryTransactionStore>,
        gateway: Arc<FakeGateway>,
    }

    async fn harness(configure: impl FnOnce(&mut AdminSettings)) -> Harness {
        let defaults = PaymentDefaults::default();
        let mut settings = AdminSettings::defaults(&defaults);
        settings.payment.key_id = "rzp_test_abc".to_string();
        settings.payment.key_secret = SECRET.to_string();
        settings.coupons = vec![
            Coupon::new("SAVE10", CouponKind::Percentage, Decimal::from(10)).expect("coupon"),
            Coupon::new("LOVE20", CouponKind::Percentage, Decimal::from(20)).expect("coupon"),
            Coupon::new("FREE48", CouponKind::Fixed, Decimal::from(48)).expect("coupon"),
        ];
        configure(&mut settings);

        let store = MemorySettingsStore::new(AdminSettings::defaults(&defaults));
        store.save(&settings).await.expect("save settings");

        let transactions = Arc::new(MemoryTransactionStore::new());
        let gateway = Arc::new(FakeGateway::default());
        Harness {
            service: CheckoutService::new(
                Arc::new(store),
                transactions.clone(),
                gateway.clone(),
                defaults,
            ),
            transactions,
            gateway,
        }
    }

    fn photos(n: usize) -> Vec<PhotoLine> {
        (1..=n)
            .map(|i| PhotoLine {
                id: CartLineId::new(format!("line-{i}")),
                style_name: "Cyberpunk Neon".to_string(),
            })
            .collect()
    }

    fn email() -> Email {
        "guest@example.com".parse().expect("email")
    }

    #[tokio::test]
    async fn test_save10_on_three_photos() {
        let h = harness(|_| {}).await;

        let outcome = h
            .service
            .begin_checkout(CartCheckoutRequest {
                visitor: VISITOR.to_string(),
                items: photos(3),
                coupon_code: Some(" save10 ".to_string()),
                email: email(),
            })
            .await
            .expect("checkout");

        let CheckoutOutcome::PaymentRequired(intent) = outcome else {
            panic!("expected payment intent");
        };
        assert_eq!(intent.quote.subtotal, Decimal::from(24));
        assert_eq!(intent.quote.discount, Decimal::new(240, 2));
        assert_eq!(intent.quote.total, Decimal::new(2160, 2));
        assert_eq!(intent.amount, 2160);
        assert_eq!(intent.currency, CurrencyCode::INR);
        assert_eq!(intent.key_id, "rzp_test_abc");
        assert_eq!(intent.description, "Get 3 High-Quality Photos");
        assert!(h.transactions.list_recent(10).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_invalid_coupon_falls_back_to_full_price() {
        let h = harness(|_| {}).await;
        let quote = h
            .service
            .quote_cart(&photos(2), Some("NOPE"))
            .await
            .expect("quote");
        assert!(quote.coupon_invalid);
        assert_eq!(quote.quote.total, Decimal::from(16));
        assert_eq!(quote.quote.discount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_inactive_coupon_is_invalid() {
        let h = harness(|s| {
            if let Some(c) = s.coupons.first_mut() {
                c.is_active = false;
            }
        })
        .await;
        let quote = h
            .service
            .quote_cart(&photos(1), Some("SAVE10"))
            .await
            .expect("quote");
        assert!(quote.coupon_invalid);
    }

    #[tokio::test]
    async fn test_empty_cart() {
        let h = harness(|_| {}).await;
        let result = h
            .service
            .begin_checkout(CartCheckoutRequest {
                visitor: VISITOR.to_string(),
                items: vec![],
                coupon_code: None,
                email: email(),
            })
            .await;
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_fixed_coupon_over_subtotal_is_free() {
        let h = harness(|s| {
            s.coupons
                .push(Coupon::new("FLAT50", CouponKind::Fixed, Decimal::from(50)).expect("coupon"));
            s.payment.photo_price = Decimal::from(30);
        })
        .await;

        let outcome = h
            .service
            .begin_checkout(CartCheckoutRequest {
                visitor: VISITOR.to_string(),
                items: photos(1),
                coupon_code: Some("flat50".to_string()),
                email: email(),
            })
            .await
            .expect("checkout");

        let CheckoutOutcome::Free(receipt) = outcome else {
            panic!("expected free checkout");
        };
        assert_eq!(receipt.quote.discount, Decimal::from(30));
        assert_eq!(receipt.quote.total, Decimal::ZERO);
        assert!(receipt.payment_id.as_str().starts_with("coupon_free_"));
        assert!(h.gateway.charges.lock().expect("lock").is_empty());

        let stored = h
            .transactions
            .get(&receipt.payment_id)
            .await
            .expect("get")
            .expect("recorded");
        assert_eq!(stored.status, PaymentStatus::Free);
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.render_status, None);
    }

    #[tokio::test]
    async fn test_payment_not_configured() {
        let h = harness(|s| {
            s.payment.key_id.clear();
            s.payment.key_secret.clear();
        })
        .await;

        let result = h
            .service
            .begin_checkout(CartCheckoutRequest {
                visitor: VISITOR.to_string(),
                items: photos(1),
                coupon_code: None,
                email: email(),
            })
            .await;
        assert!(matches!(result, Err(CheckoutError::PaymentNotConfigured)));
    }

    #[tokio::test]
    async fn test_confirm_records_transaction_once() {
        let h = harness(|_| {}).await;
        let CheckoutOutcome::PaymentRequired(intent) = h
            .service
            .begin_checkout(CartCheckoutRequest {
                visitor: VISITOR.to_string(),
                items: photos(2),
                coupon_code: Some("LOVE20".to_string()),
                email: email(),
            })
            .await
            .expect("checkout")
        else {
            panic!("expected payment intent");
        };

        let signature =
            gateway::tests::sign(SECRET, intent.order_id.as_str(), "pay_abc");
        let receipt = h
            .service
            .confirm_payment(PaymentConfirmation {
                order_id: intent.order_id.clone(),
                payment_id: "pay_abc".to_string(),
                signature: signature.clone(),
            })
            .await
            .expect("confirm");

        assert_eq!(receipt.payment_id, TransactionId::new("pay_abc"));
        let stored = h
            .transactions
            .get(&receipt.payment_id)
            .await
            .expect("get")
            .expect("recorded");
        assert_eq!(stored.amount, Decimal::new(1280, 2));
        assert_eq!(stored.status, PaymentStatus::Success);
        assert_eq!(stored.user_email, Some(email()));

        let again = h
            .service
            .confirm_payment(PaymentConfirmation {
                order_id: intent.order_id,
                payment_id: "pay_abc".to_string(),
                signature,
            })
            .await;
        assert!(matches!(again, Err(CheckoutError::PaymentFailed(_))));
    }

    #[tokio::test]
    async fn test_bad_signature_is_rejected() {
        let h = harness(|_| {}).await;
        let CheckoutOutcome::PaymentRequired(intent) = h
            .service
            .begin_checkout(CartCheckoutRequest {
                visitor: VISITOR.to_string(),
                items: photos(1),
                coupon_code: None,
                email: email(),
            })
            .await
            .expect("checkout")
        else {
            panic!("expected payment intent");
        };

        let result = h
            .service
            .confirm_payment(PaymentConfirmation {
                order_id: intent.order_id,
                payment_id: "pay_abc".to_string(),
                signature: gateway::tests::sign("wrong", "order_1", "pay_abc"),
            })
            .await;
        assert!(matches!(result, Err(CheckoutError::SignatureMismatch)));
        assert!(h.transactions.list_recent(10).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_abandon_forgets_order() {
        let h = harness(|_| {}).await;
        let CheckoutOutcome::PaymentRequired(intent) = h
            .service
            .begin_checkout(CartCheckoutRequest {
                visitor: VISITOR.to_string(),
                items: photos(1),
                coupon_code: None,
                email: email(),
            })
            .await
            .expect("checkout")
        else {
            panic!("expected payment intent");
        };

        let err = h
            .service
            .abandon(VISITOR, &intent.order_id, AbandonReason::Dismissed)
            .await;
        assert!(matches!(err, CheckoutError::PaymentDismissed));
        assert!(err.is_recoverable());

        let result = h
            .service
            .confirm_payment(PaymentConfirmation {
                order_id: intent.order_id.clone(),
                payment_id: "pay_late".to_string(),
                signature: gateway::tests::sign(SECRET, intent.order_id.as_str(), "pay_late"),
            })
            .await;
        assert!(matches!(result, Err(CheckoutError::PaymentFailed(_))));
    }

    #[tokio::test]
    async fn test_abandon_by_other_visitor_keeps_order() {
        let h = harness(|_| {}).await;
        let CheckoutOutcome::PaymentRequired(intent) = h
            .service
            .begin_checkout(CartCheckoutRequest {
                visitor: VISITOR.to_string(),
                items: photos(1),
                coupon_code: None,
                email: email(),
            })
            .await
            .expect("checkout")
        else {
            panic!("expected payment intent");
        };

        let err = h
            .service
            .abandon("someone-else", &intent.order_id, AbandonReason::Dismissed)
            .await;
        assert!(matches!(err, CheckoutError::PaymentDismissed));

        let receipt = h
            .service
            .confirm_payment(PaymentConfirmation {
                order_id: intent.order_id.clone(),
                payment_id: "pay_kept".to_string(),
                signature: gateway::tests::sign(SECRET, intent.order_id.as_str(), "pay_kept"),
            })
            .await
            .expect("order still pending");
        assert_eq!(receipt.payment_id, TransactionId::new("pay_kept"));
    }

    #[tokio::test]
    async fn test_back_to_back_free_checkouts_all_record() {
        let h = harness(|s| {
            s.coupons
                .push(Coupon::new("ALLFREE", CouponKind::Percentage, Decimal::from(100)).expect("coupon"));
        })
        .await;

        for _ in 0..50 {
            let outcome = h
                .service
                .begin_checkout(CartCheckoutRequest {
                    visitor: VISITOR.to_string(),
                    items: photos(2),
                    coupon_code: Some("ALLFREE".to_string()),
                    email: email(),
                })
                .await
                .expect("free checkout");
            assert!(matches!(outcome, CheckoutOutcome::Free(_)));
        }

        let recorded = h.transactions.list_recent(100).await.expect("list");
        assert_eq!(recorded.len(), 50);
        assert!(recorded.iter().all(|r| r.payment_id.is_synthetic()));
    }

    #[tokio::test]
    async fn test_video_quote_and_free_render() {
        let h = harness(|_| {}).await;
        let options = VideoOptions {
            duration: VideoDuration::Long,
            resolution: VideoResolution::P1080,
        };

        let quote = h.service.quote_video(options, None).await.expect("quote");
        assert_eq!(quote.quote.total, Decimal::from(48));

        let outcome = h
            .service
            .begin_video_checkout(VideoCheckoutRequest {
                visitor: VISITOR.to_string(),
                options,
                coupon_code: Some("FREE48".to_string()),
                email: None,
            })
            .await
            .expect("checkout");
        let CheckoutOutcome::Free(receipt) = outcome else {
            panic!("expected free render");
        };
        assert!(receipt.payment_id.as_str().starts_with("free_"));
        assert_eq!(receipt.render_status, Some(RenderStatus::Pending));

        let stored = h
            .transactions
            .get(&receipt.payment_id)
            .await
            .expect("get")
            .expect("recorded");
        assert_eq!(stored.render_status, Some(RenderStatus::Pending));
    }

    #[tokio::test]
    async fn test_free_sample_once_per_session() {
        let h = harness(|_| {}).await;
        let session = MemorySession::new();
        let line = photos(1).remove(0);

        let receipt = h
            .service
            .claim_free_sample(&session, line.clone(), None)
            .await
            .expect("first claim");
        assert!(receipt.payment_id.as_str().starts_with("free_sample_"));

        let again = h.service.claim_free_sample(&session, line, None).await;
        assert!(matches!(again, Err(CheckoutError::FreeSampleClaimed)));
    }
}
