//! Status enums for recorded transactions.

use serde::{Deserialize, Serialize};

/// Outcome of the payment step of a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Paid through the gateway and signature-verified.
    #[default]
    Success,
    /// Total was zero after discounts; no gateway involved.
    Free,
    /// Customer asked for their money back.
    RefundRequested,
}

impl PaymentStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Free => "free",
            Self::RefundRequested => "refund_requested",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a video render attached to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "render_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    /// Paid for, not yet submitted.
    #[default]
    Pending,
    /// Submitted to the video provider and being polled.
    Rendering,
    Completed,
    /// The provider reported failure.
    Failed,
    /// Polling gave up before the provider finished. Safe to start again.
    TimedOut,
}

impl RenderStatus {
    /// Whether the render has reached a final state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }

    /// Whether a new render may be started from this state.
    #[must_use]
    pub const fn can_start(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed | Self::TimedOut)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Rendering => "rendering",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for RenderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RenderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "rendering" => Ok(Self::Rendering),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "timed_out" => Ok(Self::TimedOut),
            _ => Err(format!("invalid render status: {s}")),
        }
    }
}
