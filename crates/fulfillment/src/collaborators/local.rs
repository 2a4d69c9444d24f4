//! In-process collaborators for services that share one process.

use async_trait::async_trait;
use common::{ProductId, RecordId, Requester};
use document_store::DocumentStore;
use domain::{DomainError, InventoryLedger, OrderStatus, PaymentStatus};

use super::{InventoryGateway, OrderGateway, OrderSummary};
use crate::error::{FulfillmentError, Result};
use crate::order_coordinator::OrderCoordinator;

/// Order gateway calling straight into an [`OrderCoordinator`].
///
/// System updates go through the coordinator, so delivery sync runs exactly
/// as it would behind the HTTP endpoint.
#[derive(Clone)]
pub struct LocalOrderGateway<S: DocumentStore> {
    coordinator: OrderCoordinator<S>,
}

impl<S: DocumentStore> LocalOrderGateway<S> {
    pub fn new(coordinator: OrderCoordinator<S>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl<S: DocumentStore> OrderGateway for LocalOrderGateway<S> {
    async fn fetch_order(&self, id: RecordId, requester: &Requester) -> Result<OrderSummary> {
        let order = self
            .coordinator
            .orders()
            .get_for(id, requester)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => FulfillmentError::OrderNotFound(id),
                DomainError::Forbidden(message) => FulfillmentError::Forbidden(message),
                other => other.into(),
            })?;

        Ok(OrderSummary {
            id: order.id(),
            user_id: order.user_id(),
            final_amount: order.final_amount(),
            status: order.status(),
            payment_status: order.payment_status(),
        })
    }

    async fn system_update_status(
        &self,
        id: RecordId,
        status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) -> Result<()> {
        self.coordinator
            .system_update_status(id, status, payment_status)
            .await?;
        Ok(())
    }
}

/// Inventory gateway over a local [`InventoryLedger`].
#[derive(Clone)]
pub struct LocalInventoryGateway<S: DocumentStore> {
    ledger: InventoryLedger<S>,
}

impl<S: DocumentStore> LocalInventoryGateway<S> {
    pub fn new(ledger: InventoryLedger<S>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl<S: DocumentStore> InventoryGateway for LocalInventoryGateway<S> {
    async fn deliver(
        &self,
        product_id: &ProductId,
        quantity: u32,
        warehouse_id: &str,
    ) -> Result<()> {
        self.ledger.deliver(product_id, quantity, warehouse_id).await?;
        Ok(())
    }
}
