//! Order aggregate.

use chrono::{DateTime, NaiveDate, Utc};
use common::{Money, RecordId, UserId};
use document_store::Document;
use serde::{Deserialize, Serialize};

use super::{
    Buyer, OrderError, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress,
};

/// Orders totalling less than this pay [`FLAT_SHIPPING_COST`].
pub const FREE_SHIPPING_THRESHOLD: Money = Money::from_cents(10_000);

/// Shipping charged below [`FREE_SHIPPING_THRESHOLD`].
pub const FLAT_SHIPPING_COST: Money = Money::from_cents(1_500);

pub const MAX_NOTES_LEN: usize = 500;
pub const MAX_CANCEL_REASON_LEN: usize = 300;

/// Returns the shipping cost for an order total.
pub fn shipping_cost_for(total: Money) -> Money {
    if total < FREE_SHIPPING_THRESHOLD {
        FLAT_SHIPPING_COST
    } else {
        Money::zero()
    }
}

/// Formats an order number from the placement date and the per-day sequence.
///
/// `ORD-20240315-0007`. Sequences past 9999 simply widen.
pub fn format_order_number(date: NaiveDate, sequence: i64) -> String {
    format!("ORD-{}-{:04}", date.format("%Y%m%d"), sequence)
}

/// Name of the per-day sequence order numbers are drawn from.
pub fn order_sequence_name(date: NaiveDate) -> String {
    format!("order-number:{}", date.format("%Y%m%d"))
}

/// Everything needed to place an order, with item prices already resolved.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub buyer: Buyer,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

impl OrderDraft {
    /// Checks items, address and notes without building an order.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        let mut total = Some(FLAT_SHIPPING_COST);
        for item in &self.items {
            item.validate()?;
            total = total.and_then(|sum| sum.checked_add(item.checked_subtotal()?));
        }
        if total.is_none() {
            return Err(OrderError::AmountOutOfRange("Order total".to_string()));
        }
        self.shipping_address.validate()?;
        if let Some(notes) = &self.notes {
            check_length("notes", notes, MAX_NOTES_LEN)?;
        }
        Ok(())
    }
}

/// A requested status change with its optional details.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
}

impl StatusUpdate {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }
}

/// Order aggregate.
///
/// Totals are derived: [`Document::before_save`] recomputes every subtotal,
/// `total_amount` and `final_amount` before each write, so a stored order
/// always satisfies `final = sum(subtotals) + shipping - discount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: RecordId,
    order_number: String,
    user_id: UserId,
    user_email: String,
    items: Vec<OrderItem>,
    total_amount: Money,
    shipping_cost: Money,
    discount_amount: Money,
    final_amount: Money,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_method: PaymentMethod,
    shipping_address: ShippingAddress,
    notes: Option<String>,
    tracking_number: Option<String>,
    estimated_delivery: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Document for Order {
    const COLLECTION: &'static str = "orders";

    fn id(&self) -> RecordId {
        self.id
    }

    fn before_save(&mut self) {
        self.recompute_totals();
        self.updated_at = Utc::now();
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn shipping_cost(&self) -> Money {
        self.shipping_cost
    }

    pub fn discount_amount(&self) -> Money {
        self.discount_amount
    }

    pub fn final_amount(&self) -> Money {
        self.final_amount
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn estimated_delivery(&self) -> Option<DateTime<Utc>> {
        self.estimated_delivery
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// Lifecycle methods
impl Order {
    /// Places a new order in `pending/pending`.
    ///
    /// Validates the draft, computes totals and applies the shipping rule.
    pub fn place(
        id: RecordId,
        order_number: String,
        draft: OrderDraft,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        draft.validate()?;
        let notes = draft.notes.filter(|n| !n.trim().is_empty());

        let mut order = Self {
            id,
            order_number,
            user_id: draft.buyer.user_id,
            user_email: draft.buyer.email,
            items: draft.items,
            total_amount: Money::zero(),
            shipping_cost: Money::zero(),
            discount_amount: Money::zero(),
            final_amount: Money::zero(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: draft.payment_method,
            shipping_address: draft.shipping_address,
            notes,
            tracking_number: None,
            estimated_delivery: None,
            delivered_at: None,
            cancelled_at: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };
        order.recompute_totals();
        order.shipping_cost = shipping_cost_for(order.total_amount);
        order.recompute_totals();
        Ok(order)
    }

    /// Applies a status change through the transition table.
    ///
    /// Returns `Ok(false)` when the order is already in the requested status;
    /// the optional details are still recorded in that case.
    pub fn apply_status(
        &mut self,
        update: &StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<bool, OrderError> {
        if let Some(reason) = &update.cancel_reason {
            check_length("cancel reason", reason, MAX_CANCEL_REASON_LEN)?;
        }

        let changed = update.status != self.status;
        if changed && !self.status.can_transition_to(update.status) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: update.status,
            });
        }

        if let Some(tracking) = &update.tracking_number {
            self.tracking_number = Some(tracking.clone());
        }
        if let Some(eta) = update.estimated_delivery {
            self.estimated_delivery = Some(eta);
        }

        if changed {
            self.status = update.status;
            match update.status {
                OrderStatus::Delivered => self.delivered_at = Some(now),
                OrderStatus::Cancelled => {
                    self.cancelled_at = Some(now);
                    self.cancel_reason = update.cancel_reason.clone();
                }
                _ => {}
            }
        }
        Ok(changed)
    }

    /// Cancels the order on behalf of the buyer. Only pending orders qualify.
    pub fn cancel(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.status.can_cancel() {
            return Err(OrderError::CannotCancel {
                current: self.status,
            });
        }
        if let Some(reason) = &reason {
            check_length("cancel reason", reason, MAX_CANCEL_REASON_LEN)?;
        }

        self.status = OrderStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancel_reason = reason;
        Ok(())
    }

    /// Moves the payment status through its table. Same-status is a no-op.
    pub fn apply_payment_status(&mut self, next: PaymentStatus) -> Result<bool, OrderError> {
        if next == self.payment_status {
            return Ok(false);
        }
        if !self.payment_status.can_transition_to(next) {
            return Err(OrderError::InvalidPaymentTransition {
                from: self.payment_status,
                to: next,
            });
        }
        self.payment_status = next;
        Ok(true)
    }

    fn recompute_totals(&mut self) {
        for item in &mut self.items {
            item.recompute_subtotal();
        }
        self.total_amount = self.items.iter().map(|i| i.subtotal).sum();
        self.final_amount = self.total_amount + self.shipping_cost - self.discount_amount;
    }
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), OrderError> {
    if value.chars().count() > max {
        return Err(OrderError::TooLong { field, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buyer() -> Buyer {
        Buyer {
            user_id: UserId::new(),
            email: "buyer@example.com".to_string(),
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress::new("Main 1", "Warsaw", "00-001", None)
    }

    fn draft(items: Vec<OrderItem>) -> OrderDraft {
        OrderDraft {
            buyer: buyer(),
            items,
            shipping_address: address(),
            payment_method: PaymentMethod::Card,
            notes: None,
        }
    }

    fn place(items: Vec<OrderItem>) -> Order {
        Order::place(
            RecordId::new(),
            "ORD-20240101-0001".into(),
            draft(items),
            Utc::now(),
        )
        .unwrap()
    }

    fn item(id: &str, major: i64, qty: u32) -> OrderItem {
        OrderItem::new(id, format!("Product {id}"), Money::from_cents(major * 100), qty)
    }

    #[test]
    fn test_free_shipping_at_threshold() {
        let order = place(vec![item("A", 40, 1), item("B", 70, 1)]);
        assert_eq!(order.total_amount(), Money::from_cents(110_00));
        assert_eq!(order.shipping_cost(), Money::zero());
        assert_eq!(order.final_amount(), Money::from_cents(110_00));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);

        let exact = place(vec![item("A", 100, 1)]);
        assert_eq!(exact.shipping_cost(), Money::zero());
    }

    #[test]
    fn test_flat_shipping_below_threshold() {
        let order = place(vec![item("A", 30, 1)]);
        assert_eq!(order.total_amount(), Money::from_cents(30_00));
        assert_eq!(order.shipping_cost(), Money::from_cents(15_00));
        assert_eq!(order.final_amount(), Money::from_cents(45_00));
    }

    #[test]
    fn test_before_save_repairs_tampered_totals() {
        let mut order = place(vec![item("A", 20, 2)]);
        order.items[0].subtotal = Money::from_cents(1);
        order.total_amount = Money::from_cents(999_999);
        order.final_amount = Money::zero();

        order.before_save();

        assert_eq!(order.items()[0].subtotal, Money::from_cents(40_00));
        assert_eq!(order.total_amount(), Money::from_cents(40_00));
        assert_eq!(order.final_amount(), Money::from_cents(55_00));
    }

    #[test]
    fn test_place_rejects_amounts_past_max() {
        let huge = OrderItem::new("P-1", "Yacht", Money::from_major(1e17), 1);
        assert!(matches!(
            Order::place(RecordId::new(), "ORD-1".into(), draft(vec![huge]), Utc::now()),
            Err(OrderError::AmountOutOfRange(_))
        ));

        let bulk = OrderItem::new("P-2", "Bolt", Money::from_cents(1_000_000_00), u32::MAX);
        assert!(matches!(
            Order::place(RecordId::new(), "ORD-2".into(), draft(vec![bulk]), Utc::now()),
            Err(OrderError::AmountOutOfRange(_))
        ));

        let half = Money::from_cents(Money::MAX.cents() / 2);
        let pair = vec![OrderItem::new("P-3", "A", half, 1), OrderItem::new("P-4", "B", half, 1)];
        assert!(matches!(
            Order::place(RecordId::new(), "ORD-3".into(), draft(pair), Utc::now()),
            Err(OrderError::AmountOutOfRange(_))
        ));
    }

    #[test]
    fn test_place_rejects_empty_and_invalid() {
        let now = Utc::now();
        let empty = Order::place(RecordId::new(), "N".into(), draft(vec![]), now);
        assert!(matches!(empty, Err(OrderError::NoItems)));

        let zero = Order::place(RecordId::new(), "N".into(), draft(vec![item("A", 1, 0)]), now);
        assert!(matches!(zero, Err(OrderError::InvalidQuantity { .. })));

        let mut long_notes = draft(vec![item("A", 1, 1)]);
        long_notes.notes = Some("x".repeat(MAX_NOTES_LEN + 1));
        let result = Order::place(RecordId::new(), "N".into(), long_notes, now);
        assert!(matches!(result, Err(OrderError::TooLong { field: "notes", .. })));
    }

    #[test]
    fn test_apply_status_follows_table_and_stamps_delivery() {
        let mut order = place(vec![item("A", 10, 1)]);
        let now = Utc::now();

        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
        ] {
            assert!(order.apply_status(&StatusUpdate::to(status), now).unwrap());
        }
        assert!(order.delivered_at().is_none());

        assert!(order.apply_status(&StatusUpdate::to(OrderStatus::Delivered), now).unwrap());
        assert_eq!(order.delivered_at(), Some(now));

        let result = order.apply_status(&StatusUpdate::to(OrderStatus::Cancelled), now);
        assert!(matches!(
            result,
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Cancelled
            })
        ));
    }

    #[test]
    fn test_apply_status_rejects_skip_to_shipped() {
        let mut order = place(vec![item("A", 10, 1)]);
        let result = order.apply_status(&StatusUpdate::to(OrderStatus::Shipped), Utc::now());
        assert!(matches!(result, Err(OrderError::InvalidTransition { .. })));
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[test]
    fn test_same_status_is_noop_but_records_tracking() {
        let mut order = place(vec![item("A", 10, 1)]);
        let now = Utc::now();
        order
            .apply_status(&StatusUpdate::to(OrderStatus::Processing), now)
            .unwrap();

        let update = StatusUpdate {
            status: OrderStatus::Processing,
            tracking_number: Some("TRK-1".into()),
            ..Default::default()
        };
        assert!(!order.apply_status(&update, now).unwrap());
        assert_eq!(order.tracking_number(), Some("TRK-1"));
    }

    #[test]
    fn test_cancel_only_from_pending() {
        let now = Utc::now();
        let mut pending = place(vec![item("A", 10, 1)]);
        pending.cancel(Some("changed my mind".into()), now).unwrap();
        assert_eq!(pending.status(), OrderStatus::Cancelled);
        assert_eq!(pending.cancel_reason(), Some("changed my mind"));
        assert_eq!(pending.cancelled_at(), Some(now));

        let mut confirmed = place(vec![item("A", 10, 1)]);
        confirmed
            .apply_status(&StatusUpdate::to(OrderStatus::Confirmed), now)
            .unwrap();
        assert!(matches!(
            confirmed.cancel(None, now),
            Err(OrderError::CannotCancel {
                current: OrderStatus::Confirmed
            })
        ));
    }

    #[test]
    fn test_cancel_reason_length() {
        let mut order = place(vec![item("A", 10, 1)]);
        let result = order.cancel(Some("x".repeat(MAX_CANCEL_REASON_LEN + 1)), Utc::now());
        assert!(matches!(result, Err(OrderError::TooLong { .. })));
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[test]
    fn test_payment_status_moves() {
        let mut order = place(vec![item("A", 10, 1)]);
        assert!(order.apply_payment_status(PaymentStatus::Paid).unwrap());
        assert!(!order.apply_payment_status(PaymentStatus::Paid).unwrap());
        assert!(matches!(
            order.apply_payment_status(PaymentStatus::Failed),
            Err(OrderError::InvalidPaymentTransition { .. })
        ));
        assert!(order.apply_payment_status(PaymentStatus::Refunded).unwrap());
    }

    #[test]
    fn test_order_number_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(format_order_number(date, 7), "ORD-20240315-0007");
        assert_eq!(format_order_number(date, 12345), "ORD-20240315-12345");
        assert_eq!(order_sequence_name(date), "order-number:20240315");
    }

    #[test]
    fn test_serialization_roundtrip() {
        let order = place(vec![item("A", 10, 2)]);
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["total_amount"], 2000);
        let back: Order = serde_json::from_value(json).unwrap();
        assert_eq!(back, order);
    }
}
