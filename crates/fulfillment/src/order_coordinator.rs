//! Order placement with live pricing, and status changes with their
//! cross-service side effects.

use std::sync::Arc;
use std::time::Instant;

use common::{ProductId, RecordId, Requester};
use document_store::DocumentStore;
use domain::{
    Buyer, Order, OrderDraft, OrderItem, OrderService, OrderStatus, PaymentMethod, PaymentStatus,
    ShippingAddress, StatusChange, StatusUpdate, Warehouse,
};

use crate::collaborators::{InventoryGateway, ProductCatalog};
use crate::error::{FulfillmentError, Result};
use crate::reconciliation::{ReconciliationEntry, ReconciliationKind, ReconciliationLog};

/// A line the buyer asked for; price and name come from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// An order request as submitted by a buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    pub items: Vec<RequestedItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

/// What happened to each line when an order was delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliverySyncReport {
    pub items: usize,
    pub inventory_failures: usize,
    pub product_failures: usize,
}

impl DeliverySyncReport {
    pub fn is_clean(&self) -> bool {
        self.inventory_failures == 0 && self.product_failures == 0
    }
}

/// Result of a status update made through the coordinator.
#[derive(Debug, Clone)]
pub struct StatusUpdateOutcome {
    pub change: StatusChange,
    /// Present only when this update moved the order into `delivered`.
    pub delivery: Option<DeliverySyncReport>,
}

impl StatusUpdateOutcome {
    pub fn order(&self) -> &Order {
        &self.change.order
    }
}

/// Coordinates the order service with the product and inventory services.
#[derive(Clone)]
pub struct OrderCoordinator<S: DocumentStore> {
    orders: OrderService<S>,
    products: Arc<dyn ProductCatalog>,
    inventory: Arc<dyn InventoryGateway>,
    reconciliation: ReconciliationLog<S>,
}

impl<S: DocumentStore + Clone> OrderCoordinator<S> {
    pub fn new(
        store: S,
        products: Arc<dyn ProductCatalog>,
        inventory: Arc<dyn InventoryGateway>,
    ) -> Self {
        Self {
            orders: OrderService::new(store.clone()),
            reconciliation: ReconciliationLog::new(store),
            products,
            inventory,
        }
    }
}

impl<S: DocumentStore> OrderCoordinator<S> {
    /// The underlying order service, for reads and user-facing updates.
    pub fn orders(&self) -> &OrderService<S> {
        &self.orders
    }

    pub fn reconciliation(&self) -> &ReconciliationLog<S> {
        &self.reconciliation
    }

    /// Prices every line from the catalog and places the order.
    ///
    /// Nothing is persisted unless every product lookup succeeds.
    #[tracing::instrument(
        skip(self, requester, request),
        fields(user_id = %requester.user_id, items = request.items.len())
    )]
    pub async fn place_order(&self, requester: &Requester, request: PlaceOrder) -> Result<Order> {
        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let product = self
                .products
                .get_product(&line.product_id)
                .await
                .map_err(|e| {
                    tracing::warn!(
                        product_id = %line.product_id,
                        error = %e,
                        "product lookup failed"
                    );
                    FulfillmentError::ProductNotFound(line.product_id.clone())
                })?;
            items.push(OrderItem::new(
                line.product_id.clone(),
                product.name,
                product.price,
                line.quantity,
            ));
        }

        let draft = OrderDraft {
            buyer: Buyer {
                user_id: requester.user_id,
                email: requester.email.clone(),
            },
            items,
            shipping_address: request.shipping_address,
            payment_method: request.payment_method,
            notes: request.notes,
        };
        Ok(self.orders.place(draft).await?)
    }

    /// Owner or admin status update.
    ///
    /// Entering `delivered` this way runs the same delivery sync as the
    /// trusted path.
    #[tracing::instrument(skip(self, requester, update), fields(status = %update.status))]
    pub async fn update_status(
        &self,
        id: RecordId,
        requester: &Requester,
        update: StatusUpdate,
    ) -> Result<StatusUpdateOutcome> {
        let change = self.orders.update_status(id, requester, update).await?;
        Ok(self.after_change(change).await)
    }

    /// Trusted status update.
    ///
    /// Entering `delivered` runs the delivery sync for every line before
    /// returning. Sync failures are recorded for reconciliation and never
    /// undo the status change.
    #[tracing::instrument(skip(self))]
    pub async fn system_update_status(
        &self,
        id: RecordId,
        status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) -> Result<StatusUpdateOutcome> {
        let change = self
            .orders
            .system_update_status(id, status, payment_status)
            .await?;
        Ok(self.after_change(change).await)
    }

    async fn after_change(&self, change: StatusChange) -> StatusUpdateOutcome {
        let delivery = if change.entered(OrderStatus::Delivered) {
            Some(self.sync_delivery(&change.order).await)
        } else {
            None
        };
        StatusUpdateOutcome { change, delivery }
    }

    async fn sync_delivery(&self, order: &Order) -> DeliverySyncReport {
        let started = Instant::now();
        let mut report = DeliverySyncReport::default();

        for item in order.items() {
            report.items += 1;

            if let Err(e) = self
                .inventory
                .deliver(&item.product_id, item.quantity, Warehouse::DEFAULT_ID)
                .await
            {
                report.inventory_failures += 1;
                self.reconciliation
                    .record_quietly(
                        ReconciliationEntry::new(ReconciliationKind::InventoryDeliver, e)
                            .order(order.id())
                            .product(item.product_id.clone(), item.quantity),
                    )
                    .await;
            }

            if let Err(e) = self.sync_product_stock(&item.product_id, item.quantity).await {
                report.product_failures += 1;
                self.reconciliation
                    .record_quietly(
                        ReconciliationEntry::new(ReconciliationKind::ProductStockSync, e)
                            .order(order.id())
                            .product(item.product_id.clone(), item.quantity),
                    )
                    .await;
            }
        }

        metrics::histogram!("delivery_sync_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        if report.is_clean() {
            tracing::info!(order_id = %order.id(), items = report.items, "delivery synced");
        } else {
            tracing::warn!(
                order_id = %order.id(),
                inventory_failures = report.inventory_failures,
                product_failures = report.product_failures,
                "delivery sync incomplete"
            );
        }
        report
    }

    async fn sync_product_stock(&self, product_id: &ProductId, delivered: u32) -> Result<()> {
        let product = self.products.get_product(product_id).await?;
        self.products
            .set_system_stock(product_id, product.stock.saturating_sub(delivered))
            .await
    }
}
