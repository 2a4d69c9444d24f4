//! Payment record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{Money, RecordId, UserId};
use document_store::Document;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PaymentError, PaymentState};
use crate::order::PaymentMethod;

/// Settlement currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Pln,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Pln => "PLN",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "PLN" => Ok(Currency::Pln),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

/// Optional references handed back by a payment gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayRefs {
    pub gateway_intent_id: Option<String>,
    pub transaction_id: Option<String>,
}

/// Input for a new payment. The order reference is assumed validated.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: RecordId,
    pub amount: Money,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub metadata: BTreeMap<String, String>,
}

/// Generates a payment id: `PAY-<yyyymmdd>-<hhmmss>-<6 random chars>`.
pub fn generate_payment_id(now: DateTime<Utc>) -> String {
    format!("PAY-{}-{}", now.format("%Y%m%d-%H%M%S"), random_suffix())
}

/// Generates a refund id: `REF-<unix millis>-<6 random chars>`.
pub fn generate_refund_id(now: DateTime<Utc>) -> String {
    format!("REF-{}-{}", now.timestamp_millis(), random_suffix())
}

fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..6].to_uppercase()
}

/// A monetary transaction tied to one order.
///
/// `refund_amount` never exceeds `amount`; the record becomes `Refunded`
/// exactly when the two meet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    id: RecordId,
    payment_id: String,
    order_id: RecordId,
    user_id: UserId,
    amount: Money,
    currency: Currency,
    status: PaymentState,
    method: PaymentMethod,
    gateway_intent_id: Option<String>,
    transaction_id: Option<String>,
    refund_id: Option<String>,
    refund_amount: Money,
    refund_reason: Option<String>,
    failure_reason: Option<String>,
    settle_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Document for Payment {
    const COLLECTION: &'static str = "payments";

    fn id(&self) -> RecordId {
        self.id
    }

    fn before_save(&mut self) {
        self.updated_at = Utc::now();
    }
}

// Query methods
impl Payment {
    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn payment_id(&self) -> &str {
        &self.payment_id
    }

    pub fn order_id(&self) -> RecordId {
        self.order_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn status(&self) -> PaymentState {
        self.status
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn gateway_intent_id(&self) -> Option<&str> {
        self.gateway_intent_id.as_deref()
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn refund_id(&self) -> Option<&str> {
        self.refund_id.as_deref()
    }

    pub fn refund_amount(&self) -> Money {
        self.refund_amount
    }

    pub fn refund_reason(&self) -> Option<&str> {
        self.refund_reason.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// When settlement is due, while the payment is processing.
    pub fn settle_at(&self) -> Option<DateTime<Utc>> {
        self.settle_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Amount still available for refunds.
    pub fn refundable(&self) -> Money {
        self.amount - self.refund_amount
    }
}

// Lifecycle methods
impl Payment {
    /// Creates a pending payment.
    pub fn create(
        id: RecordId,
        payment_id: String,
        user_id: UserId,
        new: NewPayment,
        now: DateTime<Utc>,
    ) -> Result<Self, PaymentError> {
        if !new.amount.is_positive() || !new.amount.is_within_bounds() {
            return Err(PaymentError::InvalidAmount(new.amount));
        }

        Ok(Self {
            id,
            payment_id,
            order_id: new.order_id,
            user_id,
            amount: new.amount,
            currency: new.currency,
            status: PaymentState::Pending,
            method: new.method,
            gateway_intent_id: None,
            transaction_id: None,
            refund_id: None,
            refund_amount: Money::zero(),
            refund_reason: None,
            failure_reason: None,
            settle_at: None,
            completed_at: None,
            metadata: new.metadata,
            created_at: now,
            updated_at: now,
        })
    }

    /// Moves a pending payment to processing with a settlement deadline.
    pub fn start_processing(
        &mut self,
        refs: GatewayRefs,
        settle_at: DateTime<Utc>,
    ) -> Result<(), PaymentError> {
        if !self.status.can_process() {
            return Err(PaymentError::NotPending {
                current: self.status,
            });
        }
        self.status = PaymentState::Processing;
        self.settle_at = Some(settle_at);
        if refs.gateway_intent_id.is_some() {
            self.gateway_intent_id = refs.gateway_intent_id;
        }
        if refs.transaction_id.is_some() {
            self.transaction_id = refs.transaction_id;
        }
        Ok(())
    }

    /// Completes a processing payment.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), PaymentError> {
        if !self.status.can_settle() {
            return Err(PaymentError::NotProcessing {
                current: self.status,
            });
        }
        self.status = PaymentState::Completed;
        self.completed_at = Some(now);
        self.settle_at = None;
        Ok(())
    }

    /// Records a partial or full refund.
    pub fn refund(
        &mut self,
        amount: Money,
        reason: Option<String>,
        refund_id: String,
    ) -> Result<(), PaymentError> {
        if !self.status.can_refund() {
            return Err(PaymentError::NotCompleted {
                current: self.status,
            });
        }
        if !amount.is_positive() {
            return Err(PaymentError::InvalidRefundAmount);
        }
        if amount > self.refundable() {
            return Err(PaymentError::RefundExceedsAmount {
                requested: amount,
                refundable: self.refundable(),
            });
        }

        self.refund_amount += amount;
        self.refund_id = Some(refund_id);
        if reason.is_some() {
            self.refund_reason = reason;
        }
        if self.refund_amount >= self.amount {
            self.status = PaymentState::Refunded;
        }
        Ok(())
    }

    /// Forces a pending or processing payment to failed or cancelled.
    pub fn override_status(
        &mut self,
        target: PaymentState,
        reason: Option<String>,
    ) -> Result<(), PaymentError> {
        if !self.status.can_override_to(target) {
            return Err(PaymentError::InvalidOverride {
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.settle_at = None;
        if reason.is_some() {
            self.failure_reason = reason;
        }
        Ok(())
    }
}
