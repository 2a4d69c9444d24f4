//! Payment record and settlement lifecycle.

mod record;
mod service;
mod state;

pub use record::{
    Currency, GatewayRefs, NewPayment, Payment, generate_payment_id, generate_refund_id,
};
pub use service::{PaymentFilter, PaymentService, SettlementOutcome};
pub use state::PaymentState;

use common::Money;
use thiserror::Error;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Amount must be positive and within [`Money::MAX`].
    #[error("Payment amount must be positive and at most {max}, got {0}", max = Money::MAX)]
    InvalidAmount(Money),

    /// Processing requires a pending payment.
    #[error("Payment cannot be processed in {current} status")]
    NotPending { current: PaymentState },

    /// Settlement requires a processing payment.
    #[error("Payment cannot be settled in {current} status")]
    NotProcessing { current: PaymentState },

    /// Refunds require a completed payment.
    #[error("Only completed payments can be refunded (current: {current})")]
    NotCompleted { current: PaymentState },

    /// Refund amount must be positive.
    #[error("Valid refund amount is required")]
    InvalidRefundAmount,

    /// The refund would push the refunded total past the payment amount.
    #[error("Refund amount {requested} exceeds refundable amount {refundable}")]
    RefundExceedsAmount { requested: Money, refundable: Money },

    /// The override is not one of the allowed edges.
    #[error("Cannot override payment from {from} to {to}")]
    InvalidOverride { from: PaymentState, to: PaymentState },
}

impl PaymentError {
    /// Returns true for rejected state transitions, as opposed to bad amounts.
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            PaymentError::NotPending { .. }
                | PaymentError::NotProcessing { .. }
                | PaymentError::NotCompleted { .. }
                | PaymentError::InvalidOverride { .. }
        )
    }
}
