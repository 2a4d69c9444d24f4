//! Order service: every order mutation goes through here.

use chrono::Utc;
use common::{RecordId, Requester};
use document_store::{DocumentStore, DocumentStoreExt};
use serde_json::{Map, Value, json};

use crate::error::DomainError;
use crate::pagination::{Page, PageRequest};

use super::{
    Order, OrderDraft, OrderStatus, PaymentStatus, StatusUpdate, format_order_number,
    order_sequence_name,
};

/// Filters for listing orders.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

/// Outcome of a status update.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub order: Order,
    pub previous: OrderStatus,
    pub status_changed: bool,
    pub payment_status_changed: bool,
}

impl StatusChange {
    /// Returns true if this update moved the order into `status`.
    ///
    /// A repeated update to the status the order already has returns false,
    /// which keeps entry side effects from running twice.
    pub fn entered(&self, status: OrderStatus) -> bool {
        self.status_changed && self.order.status() == status
    }
}

/// Service for managing orders.
///
/// Mutations are atomic read-modify-writes on the order document; the
/// transition checks run against the freshly read state on every attempt.
#[derive(Clone)]
pub struct OrderService<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Places an order whose item prices have already been resolved.
    ///
    /// The order number is drawn from an atomic per-day sequence, so
    /// concurrent placements never share a number.
    #[tracing::instrument(skip(self, draft), fields(user_id = %draft.buyer.user_id))]
    pub async fn place(&self, draft: OrderDraft) -> Result<Order, DomainError> {
        draft.validate()?;

        let now = Utc::now();
        let today = now.date_naive();
        let sequence = self.store.next_sequence(&order_sequence_name(today)).await?;
        let number = format_order_number(today, sequence);

        let mut order = Order::place(RecordId::new(), number, draft, now)?;
        self.store.insert_doc(&mut order).await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(
            order_id = %order.id(),
            order_number = order.order_number(),
            final_amount = %order.final_amount(),
            "order placed"
        );
        Ok(order)
    }

    /// Loads an order without access checks.
    pub async fn get(&self, id: RecordId) -> Result<Option<Order>, DomainError> {
        Ok(self.store.load::<Order>(id).await?.map(|v| v.into_inner()))
    }

    /// Loads an order the requester owns (or any order, for admins).
    #[tracing::instrument(skip(self))]
    pub async fn get_for(&self, id: RecordId, requester: &Requester) -> Result<Order, DomainError> {
        let order = self
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", id))?;
        ensure_access(&order, requester)?;
        Ok(order)
    }

    /// Lists the requester's orders, newest first. Admins see every order.
    #[tracing::instrument(skip(self))]
    pub async fn list_for(
        &self,
        requester: &Requester,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<Page<Order>, DomainError> {
        let mut query = Map::new();
        if !requester.is_admin() {
            query.insert("user_id".into(), json!(requester.user_id));
        }
        if let Some(status) = filter.status {
            query.insert("status".into(), json!(status));
        }
        if let Some(payment_status) = filter.payment_status {
            query.insert("payment_status".into(), json!(payment_status));
        }

        let mut orders: Vec<Order> = self.store.find_docs(Value::Object(query)).await?;
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(page.paginate(orders))
    }

    /// Owner or admin status update, validated against the transition table.
    ///
    /// Entry side effects (delivery sync) are the caller's job; see
    /// [`StatusChange::entered`].
    #[tracing::instrument(skip(self, update), fields(status = %update.status))]
    pub async fn update_status(
        &self,
        id: RecordId,
        requester: &Requester,
        update: StatusUpdate,
    ) -> Result<StatusChange, DomainError> {
        let mut previous = OrderStatus::default();
        let mut status_changed = false;
        let order = self
            .store
            .update_with(id, |order: &mut Order| {
                ensure_access(order, requester)?;
                previous = order.status();
                status_changed = order.apply_status(&update, Utc::now())?;
                Ok::<_, DomainError>(())
            })
            .await
            .map_err(|e| missing_as_not_found(e, id))?;

        if status_changed {
            record_transition(&order);
        }
        Ok(StatusChange {
            order,
            previous,
            status_changed,
            payment_status_changed: false,
        })
    }

    /// Cancels a pending order.
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel(
        &self,
        id: RecordId,
        requester: &Requester,
        reason: Option<String>,
    ) -> Result<Order, DomainError> {
        let order = self
            .store
            .update_with(id, |order: &mut Order| {
                ensure_access(order, requester)?;
                order.cancel(reason.clone(), Utc::now())?;
                Ok::<_, DomainError>(())
            })
            .await
            .map_err(|e| missing_as_not_found(e, id))?;

        record_transition(&order);
        Ok(order)
    }

    /// Trusted status update used by internal callers.
    ///
    /// Applies the status (and optionally the payment status) through the
    /// transition tables. Repeating the current status is a no-op that
    /// reports `status_changed = false`.
    #[tracing::instrument(skip(self))]
    pub async fn system_update_status(
        &self,
        id: RecordId,
        status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) -> Result<StatusChange, DomainError> {
        let mut previous = OrderStatus::default();
        let mut status_changed = false;
        let mut payment_status_changed = false;

        let order = self
            .store
            .update_with(id, |order: &mut Order| {
                previous = order.status();
                status_changed = order.apply_status(&StatusUpdate::to(status), Utc::now())?;
                payment_status_changed = match payment_status {
                    Some(next) => order.apply_payment_status(next)?,
                    None => false,
                };
                Ok::<_, DomainError>(())
            })
            .await
            .map_err(|e| missing_as_not_found(e, id))?;

        if status_changed {
            record_transition(&order);
        } else {
            tracing::debug!(order_id = %id, %status, "status unchanged");
        }

        Ok(StatusChange {
            order,
            previous,
            status_changed,
            payment_status_changed,
        })
    }
}

fn ensure_access(order: &Order, requester: &Requester) -> Result<(), DomainError> {
    if requester.can_access(order.user_id()) {
        Ok(())
    } else {
        Err(DomainError::Forbidden(
            "Not authorized to access this order".to_string(),
        ))
    }
}

fn missing_as_not_found(err: DomainError, id: RecordId) -> DomainError {
    if matches!(err, DomainError::Store(document_store::StoreError::NotFound { .. })) {
        DomainError::not_found("Order", id)
    } else {
        err
    }
}

fn record_transition(order: &Order) {
    metrics::counter!("order_status_transitions_total", "to" => order.status().as_str())
        .increment(1);
    tracing::info!(
        order_id = %order.id(),
        status = %order.status(),
        payment_status = %order.payment_status(),
        "order status changed"
    );
}
