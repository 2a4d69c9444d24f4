//! Collaborator seams: the calls one service makes into another.
//!
//! Each trait has an in-process implementation (used when services share a
//! process, and in tests) and an HTTP implementation built on `reqwest`.

pub mod http;
pub mod local;
pub mod memory;

use async_trait::async_trait;
use common::{Money, ProductId, RecordId, Requester, UserId};
use domain::{OrderStatus, PaymentStatus};

use crate::error::Result;

pub use http::{HttpInventoryGateway, HttpOrderGateway, HttpProductCatalog};
pub use local::{LocalInventoryGateway, LocalOrderGateway};
pub use memory::{InMemoryInventoryGateway, InMemoryProductCatalog};

/// Authoritative product data as served by the product service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
}

/// The parts of an order other services rely on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub id: RecordId,
    pub user_id: UserId,
    pub final_amount: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
}

/// Product service operations.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fetches current name, price and denormalized stock.
    async fn get_product(&self, id: &ProductId) -> Result<ProductSnapshot>;

    /// Unconditionally sets the denormalized stock counter.
    async fn set_system_stock(&self, id: &ProductId, stock: u32) -> Result<()>;
}

/// Order service operations.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Fetches an order as `requester`; the order side enforces ownership.
    async fn fetch_order(&self, id: RecordId, requester: &Requester) -> Result<OrderSummary>;

    /// Trusted status update, including any side effects it triggers.
    async fn system_update_status(
        &self,
        id: RecordId,
        status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) -> Result<()>;
}

/// Inventory service operations.
#[async_trait]
pub trait InventoryGateway: Send + Sync {
    /// Clears the reservation for and removes `quantity` delivered units.
    async fn deliver(&self, product_id: &ProductId, quantity: u32, warehouse_id: &str)
    -> Result<()>;
}
