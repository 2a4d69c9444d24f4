//! In-memory collaborators with failure toggles, for tests and local runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use common::{Money, ProductId};

use super::{InventoryGateway, ProductCatalog, ProductSnapshot};
use crate::error::{FulfillmentError, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct CatalogState {
    products: HashMap<ProductId, ProductSnapshot>,
    unavailable: bool,
    fail_stock_updates: bool,
    stock_updates: Vec<(ProductId, u32)>,
}

/// In-memory product catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub fn insert(&self, id: impl Into<ProductId>, name: &str, price: Money, stock: u32) {
        let id = id.into();
        lock(&self.state).products.insert(
            id.clone(),
            ProductSnapshot {
                id,
                name: name.to_string(),
                price,
                stock,
            },
        );
    }

    /// Makes every call fail as if the service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    /// Makes stock updates fail while reads keep working.
    pub fn set_fail_stock_updates(&self, fail: bool) {
        lock(&self.state).fail_stock_updates = fail;
    }

    /// Returns the current stock of a product.
    pub fn stock(&self, id: &ProductId) -> Option<u32> {
        lock(&self.state).products.get(id).map(|p| p.stock)
    }

    /// Returns every stock update received, in order.
    pub fn stock_updates(&self) -> Vec<(ProductId, u32)> {
        lock(&self.state).stock_updates.clone()
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn get_product(&self, id: &ProductId) -> Result<ProductSnapshot> {
        let state = lock(&self.state);
        if state.unavailable {
            return Err(FulfillmentError::upstream("product", "connection refused"));
        }
        state
            .products
            .get(id)
            .cloned()
            .ok_or_else(|| FulfillmentError::ProductNotFound(id.clone()))
    }

    async fn set_system_stock(&self, id: &ProductId, stock: u32) -> Result<()> {
        let mut state = lock(&self.state);
        if state.unavailable || state.fail_stock_updates {
            return Err(FulfillmentError::upstream("product", "connection refused"));
        }
        let product = state
            .products
            .get_mut(id)
            .ok_or_else(|| FulfillmentError::ProductNotFound(id.clone()))?;
        product.stock = stock;
        state.stock_updates.push((id.clone(), stock));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InventoryState {
    deliveries: Vec<(ProductId, u32, String)>,
    fail_on_deliver: bool,
}

/// In-memory inventory gateway that records deliveries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryGateway {
    state: Arc<Mutex<InventoryState>>,
}

impl InMemoryInventoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to fail every deliver call.
    pub fn set_fail_on_deliver(&self, fail: bool) {
        lock(&self.state).fail_on_deliver = fail;
    }

    /// Returns `(product, quantity, warehouse)` for every successful delivery.
    pub fn deliveries(&self) -> Vec<(ProductId, u32, String)> {
        lock(&self.state).deliveries.clone()
    }
}

#[async_trait]
impl InventoryGateway for InMemoryInventoryGateway {
    async fn deliver(
        &self,
        product_id: &ProductId,
        quantity: u32,
        warehouse_id: &str,
    ) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_on_deliver {
            return Err(FulfillmentError::upstream("inventory", "timed out"));
        }
        state
            .deliveries
            .push((product_id.clone(), quantity, warehouse_id.to_string()));
        Ok(())
    }
}
