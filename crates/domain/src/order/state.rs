//! Order and order-payment state machines.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Confirmed ──► Processing ──► Shipped ──► Delivered
///           └────────────────────►┘
///
/// any non-terminal ──► Cancelled | Refunded
/// ```
///
/// `Pending → Processing` is legal because payment settlement advances an
/// order straight from pending. Skipping to `Shipped` is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order placed, awaiting confirmation or payment.
    #[default]
    Pending,

    /// Order confirmed by the merchant.
    Confirmed,

    /// Payment received, order is being fulfilled.
    Processing,

    /// Handed to the carrier.
    Shipped,

    /// Received by the buyer (terminal state).
    Delivered,

    /// Order was cancelled (terminal state).
    Cancelled,

    /// Order was refunded (terminal state).
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    /// Returns the statuses reachable from this one in a single step.
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Processing, Cancelled, Refunded],
            Confirmed => &[Processing, Cancelled, Refunded],
            Processing => &[Shipped, Cancelled, Refunded],
            Shipped => &[Delivered, Cancelled, Refunded],
            Delivered | Cancelled | Refunded => &[],
        }
    }

    /// Returns true if the table allows moving from this status to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Returns true if the buyer may cancel the order in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Returns the status name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

/// Payment status as tracked on the order.
///
/// ```text
/// Pending ──┬──► Paid ──► Refunded
///           └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    /// Returns true if the table allows moving from this status to `next`.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Paid)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Paid, PaymentStatus::Refunded)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown payment status: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
    }

    #[test]
    fn test_forward_path() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_settlement_shortcut_is_legal() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
    }

    #[test]
    fn test_skipping_to_shipped_is_rejected() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_no_backwards_moves() {
        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Confirmed));
    }

    #[test]
    fn test_cancel_and_refund_from_every_non_terminal_status() {
        for status in OrderStatus::ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert!(status.can_transition_to(OrderStatus::Cancelled), "{status}");
            assert!(status.can_transition_to(OrderStatus::Refunded), "{status}");
        }
    }

    #[test]
    fn test_only_pending_can_be_cancelled_by_buyer() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(!OrderStatus::Confirmed.can_cancel());
        assert!(!OrderStatus::Processing.can_cancel());
        assert!(!OrderStatus::Shipped.can_cancel());
        assert!(!OrderStatus::Delivered.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
        assert!(!OrderStatus::Refunded.can_cancel());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Confirmed.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
    }

    #[test]
    fn test_payment_status_table() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Paid));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Failed));
        assert!(PaymentStatus::Paid.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Refunded.can_transition_to(PaymentStatus::Paid));
    }

    #[test]
    fn test_wire_names_roundtrip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!("Shipped".parse::<OrderStatus>().is_err());
        assert_eq!("paid".parse::<PaymentStatus>().unwrap(), PaymentStatus::Paid);
    }
}
