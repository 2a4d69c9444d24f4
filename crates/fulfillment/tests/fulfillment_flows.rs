//! End-to-end fulfillment flows with every service wired in-process over
//! one shared in-memory store.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use common::{Money, ProductId, Requester, Role, UserId};
use document_store::InMemoryDocumentStore;
use domain::{
    Currency, GatewayRefs, InventoryLedger, NewInventoryItem, NewPayment, OrderStatus,
    PaymentMethod, PaymentState, PaymentStatus, ShippingAddress, StatusUpdate, Warehouse,
};
use fulfillment::{
    LocalInventoryGateway, LocalOrderGateway, NewProduct, OrderCoordinator, PaymentCoordinator,
    PlaceOrder, ReconciliationKind, RequestedItem, SettlementConfig, StoreProductCatalog,
};

struct System {
    catalog: Arc<StoreProductCatalog<InMemoryDocumentStore>>,
    ledger: InventoryLedger<InMemoryDocumentStore>,
    orders: OrderCoordinator<InMemoryDocumentStore>,
    payments: PaymentCoordinator<InMemoryDocumentStore>,
    buyer: Requester,
}

fn system() -> System {
    let store = InMemoryDocumentStore::new();
    let catalog = Arc::new(StoreProductCatalog::new(store.clone()));
    let ledger = InventoryLedger::new(store.clone());
    let orders = OrderCoordinator::new(
        store.clone(),
        catalog.clone(),
        Arc::new(LocalInventoryGateway::new(ledger.clone())),
    );
    let payments = PaymentCoordinator::new(
        store,
        Arc::new(LocalOrderGateway::new(orders.clone())),
        SettlementConfig {
            delay: Duration::from_millis(2000),
        },
    );
    System {
        catalog,
        ledger,
        orders,
        payments,
        buyer: Requester::new(UserId::new(), "buyer@example.com", Role::User),
    }
}

async fn seed_product(sys: &System, price_cents: i64, stock: u32) -> ProductId {
    let product = sys
        .catalog
        .create(NewProduct {
            name: "Standing desk".into(),
            price: Money::from_cents(price_cents),
            stock,
            ..Default::default()
        })
        .await
        .unwrap();
    product.product_id()
}

fn order_for(product_id: &ProductId, quantity: u32) -> PlaceOrder {
    PlaceOrder {
        items: vec![RequestedItem {
            product_id: product_id.clone(),
            quantity,
        }],
        shipping_address: ShippingAddress::new("1 Main St", "Warsaw", "00-001", None),
        payment_method: PaymentMethod::Card,
        notes: None,
    }
}

mod settlement {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn processed_payment_settles_and_advances_order() {
        let sys = system();
        let product = seed_product(&sys, 10_000, 5).await;
        let order = sys
            .orders
            .place_order(&sys.buyer, order_for(&product, 1))
            .await
            .unwrap();

        let payment = sys
            .payments
            .create_payment(
                &sys.buyer,
                NewPayment {
                    order_id: order.id(),
                    amount: Money::from_cents(10_000),
                    currency: Currency::Usd,
                    method: PaymentMethod::Card,
                    metadata: BTreeMap::new(),
                },
            )
            .await
            .unwrap();

        let processing = sys
            .payments
            .process_payment(payment.id(), GatewayRefs::default())
            .await
            .unwrap();
        assert_eq!(processing.status(), PaymentState::Processing);
        assert!(processing.settle_at().is_some());

        tokio::time::sleep(Duration::from_millis(2100)).await;

        let settled = sys.payments.payments().get(payment.id()).await.unwrap().unwrap();
        assert_eq!(settled.status(), PaymentState::Completed);
        assert!(settled.settle_at().is_none());

        let order = sys.orders.orders().get(order.id()).await.unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::Processing);
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn payment_for_someone_elses_order_is_forbidden() {
        let sys = system();
        let product = seed_product(&sys, 3_000, 5).await;
        let order = sys
            .orders
            .place_order(&sys.buyer, order_for(&product, 1))
            .await
            .unwrap();

        let stranger = Requester::new(UserId::new(), "other@example.com", Role::User);
        let result = sys
            .payments
            .create_payment(
                &stranger,
                NewPayment {
                    order_id: order.id(),
                    amount: Money::from_cents(4_500),
                    currency: Currency::Usd,
                    method: PaymentMethod::Card,
                    metadata: BTreeMap::new(),
                },
            )
            .await;
        assert!(matches!(result, Err(fulfillment::FulfillmentError::Forbidden(_))));
    }
}

mod delivery {
    use super::*;

    async fn deliver(sys: &System, order_id: common::RecordId) -> fulfillment::StatusUpdateOutcome {
        let mut last = None;
        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            last = Some(
                sys.orders
                    .system_update_status(order_id, status, None)
                    .await
                    .unwrap(),
            );
        }
        last.unwrap()
    }

    #[tokio::test]
    async fn delivered_order_confirms_inventory_and_syncs_product_stock() {
        let sys = system();
        let product = seed_product(&sys, 2_000, 10).await;
        sys.ledger
            .create_item(NewInventoryItem {
                product_id: product.clone(),
                sku: "DESK-1".into(),
                name: "Standing desk".into(),
                quantity: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        sys.ledger
            .reserve_stock(&product, 3, Warehouse::DEFAULT_ID)
            .await
            .unwrap();

        let order = sys
            .orders
            .place_order(&sys.buyer, order_for(&product, 3))
            .await
            .unwrap();
        let outcome = deliver(&sys, order.id()).await;

        assert_eq!(outcome.order().status(), OrderStatus::Delivered);
        assert!(outcome.delivery.unwrap().is_clean());

        let record = sys
            .ledger
            .get_by_product(&product, Warehouse::DEFAULT_ID)
            .await
            .unwrap();
        assert_eq!(record.quantity(), 7);
        assert_eq!(record.reserved_quantity(), 0);

        let stored = sys.catalog.find(&product).await.unwrap().unwrap();
        assert_eq!(stored.stock, 7);
    }

    #[tokio::test]
    async fn owner_delivery_then_system_delivery_syncs_exactly_once() {
        let sys = system();
        let product = seed_product(&sys, 2_000, 10).await;
        sys.ledger
            .create_item(NewInventoryItem {
                product_id: product.clone(),
                sku: "DESK-1".into(),
                name: "Standing desk".into(),
                quantity: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        sys.ledger
            .reserve_stock(&product, 3, Warehouse::DEFAULT_ID)
            .await
            .unwrap();
        let order = sys
            .orders
            .place_order(&sys.buyer, order_for(&product, 3))
            .await
            .unwrap();

        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            sys.orders
                .update_status(order.id(), &sys.buyer, StatusUpdate::to(status))
                .await
                .unwrap();
        }
        let repeated = sys
            .orders
            .system_update_status(order.id(), OrderStatus::Delivered, None)
            .await
            .unwrap();
        assert!(repeated.delivery.is_none());

        let record = sys
            .ledger
            .get_by_product(&product, Warehouse::DEFAULT_ID)
            .await
            .unwrap();
        assert_eq!(record.quantity(), 7);
        assert_eq!(record.reserved_quantity(), 0);
        assert_eq!(sys.catalog.find(&product).await.unwrap().unwrap().stock, 7);
        assert!(sys.orders.reconciliation().list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_inventory_record_is_reconciled_not_fatal() {
        let sys = system();
        let product = seed_product(&sys, 2_000, 10).await;
        let order = sys
            .orders
            .place_order(&sys.buyer, order_for(&product, 4))
            .await
            .unwrap();

        let outcome = deliver(&sys, order.id()).await;

        assert_eq!(outcome.order().status(), OrderStatus::Delivered);
        let report = outcome.delivery.unwrap();
        assert_eq!(report.inventory_failures, 1);
        assert_eq!(report.product_failures, 0);

        let stored = sys.catalog.find(&product).await.unwrap().unwrap();
        assert_eq!(stored.stock, 6);

        let entries = sys
            .orders
            .reconciliation()
            .list(Some(ReconciliationKind::InventoryDeliver))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].product_id.as_ref(), Some(&product));
        assert_eq!(entries[0].quantity, Some(4));
    }

    #[tokio::test]
    async fn product_stock_never_goes_negative() {
        let sys = system();
        let product = seed_product(&sys, 2_000, 2).await;
        let order = sys
            .orders
            .place_order(&sys.buyer, order_for(&product, 5))
            .await
            .unwrap();

        deliver(&sys, order.id()).await;

        let stored = sys.catalog.find(&product).await.unwrap().unwrap();
        assert_eq!(stored.stock, 0);
    }
}
