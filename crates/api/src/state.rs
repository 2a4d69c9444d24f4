//! Shared application state and its wiring.

use std::sync::Arc;

use axum::extract::FromRef;
use document_store::DocumentStore;
use domain::InventoryLedger;
use fulfillment::{
    HttpInventoryGateway, HttpOrderGateway, HttpProductCatalog, InventoryGateway,
    LocalInventoryGateway, LocalOrderGateway, OrderCoordinator, OrderGateway, PaymentCoordinator,
    ProductCatalog, StoreProductCatalog,
};

use crate::auth::AuthKeys;
use crate::config::{Config, ServiceMode};

/// Shared application state accessible from all handlers.
pub struct AppState<S: DocumentStore> {
    pub orders: OrderCoordinator<S>,
    pub payments: PaymentCoordinator<S>,
    pub inventory: InventoryLedger<S>,
    pub products: StoreProductCatalog<S>,
    pub auth: AuthKeys,
}

impl<S: DocumentStore> FromRef<Arc<AppState<S>>> for AuthKeys {
    fn from_ref(state: &Arc<AppState<S>>) -> Self {
        state.auth.clone()
    }
}

impl<S: DocumentStore + Clone + 'static> AppState<S> {
    /// Wires the services over `store`.
    ///
    /// In `all` mode every collaborator is in-process. A process serving a
    /// single service reaches the others over HTTP at the configured URLs.
    pub fn build(store: S, config: &Config) -> Result<Arc<Self>, reqwest::Error> {
        let client = config.collaborators().http_client()?;
        let inventory = InventoryLedger::new(store.clone());
        let products = StoreProductCatalog::new(store.clone());

        let (catalog, inventory_gateway): (Arc<dyn ProductCatalog>, Arc<dyn InventoryGateway>) =
            if config.service == ServiceMode::Order {
                (
                    Arc::new(HttpProductCatalog::new(
                        client.clone(),
                        &config.product_service_url,
                    )),
                    Arc::new(HttpInventoryGateway::new(
                        client.clone(),
                        &config.inventory_service_url,
                    )),
                )
            } else {
                (
                    Arc::new(products.clone()),
                    Arc::new(LocalInventoryGateway::new(inventory.clone())),
                )
            };
        let orders = OrderCoordinator::new(store.clone(), catalog, inventory_gateway);

        let order_gateway: Arc<dyn OrderGateway> = if config.service == ServiceMode::Payment {
            Arc::new(HttpOrderGateway::new(client, &config.order_service_url))
        } else {
            Arc::new(LocalOrderGateway::new(orders.clone()))
        };
        let payments = PaymentCoordinator::new(store, order_gateway, config.settlement());

        Ok(Arc::new(Self {
            orders,
            payments,
            inventory,
            products,
            auth: AuthKeys::new(&config.jwt_secret),
        }))
    }
}
