//! Checkout errors.

use thiserror::Error;

use super::gateway::GatewayError;
use crate::db::RepositoryError;
use crate::session::SessionError;

/// Errors surfaced by the checkout flow.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    /// The gateway reported a failed payment, or the order is unknown.
    #[error("payment failed: {0}")]
    PaymentFailed(String),

    /// The visitor closed the payment widget.
    #[error("payment dismissed")]
    PaymentDismissed,

    /// Payments are disabled or the merchant keys are missing.
    #[error("payment gateway is not configured")]
    PaymentNotConfigured,

    /// The completion signature did not verify.
    #[error("payment signature mismatch")]
    SignatureMismatch,

    #[error("free sample already claimed in this session")]
    FreeSampleClaimed,

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl CheckoutError {
    /// Short message safe to show end users.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyCart => "Select at least one photo.",
            Self::PaymentFailed(_) => "Payment failed. Try again.",
            Self::PaymentDismissed => "Payment was cancelled. You can try again.",
            Self::PaymentNotConfigured => "Something is wrong with payment. Contact support.",
            Self::SignatureMismatch => "We couldn't confirm your payment. Contact support.",
            Self::FreeSampleClaimed => "You have already used your free photo.",
            Self::Gateway(_) | Self::Repository(_) | Self::Session(_) => {
                "Something went wrong. Try again."
            }
        }
    }

    /// Whether the visitor can retry the payment.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PaymentFailed(_) | Self::PaymentDismissed | Self::Gateway(_)
        )
    }
}
