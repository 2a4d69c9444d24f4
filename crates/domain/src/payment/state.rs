//! Payment state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The lifecycle status of a payment record.
///
/// ```text
/// Pending ──process──► Processing ──settle──► Completed ──refund(full)──► Refunded
///    │                     │
///    └─────────────────────┴──override──► Failed | Cancelled
/// ```
///
/// Partial refunds keep a payment in `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentState {
    pub const ALL: [PaymentState; 6] = [
        PaymentState::Pending,
        PaymentState::Processing,
        PaymentState::Completed,
        PaymentState::Failed,
        PaymentState::Cancelled,
        PaymentState::Refunded,
    ];

    /// Returns true if processing can start in this state.
    pub fn can_process(&self) -> bool {
        matches!(self, PaymentState::Pending)
    }

    /// Returns true if settlement may complete the payment in this state.
    pub fn can_settle(&self) -> bool {
        matches!(self, PaymentState::Processing)
    }

    /// Returns true if refunds are accepted in this state.
    pub fn can_refund(&self) -> bool {
        matches!(self, PaymentState::Completed)
    }

    /// Returns true if an admin may force this state to `target`.
    pub fn can_override_to(&self, target: PaymentState) -> bool {
        matches!(self, PaymentState::Pending | PaymentState::Processing)
            && matches!(target, PaymentState::Failed | PaymentState::Cancelled)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentState::Failed | PaymentState::Cancelled | PaymentState::Refunded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "pending",
            PaymentState::Processing => "processing",
            PaymentState::Completed => "completed",
            PaymentState::Failed => "failed",
            PaymentState::Cancelled => "cancelled",
            PaymentState::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown payment status: {s}"))
    }
}
