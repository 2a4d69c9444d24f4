//! Inventory ledger: per product and warehouse stock with reservations.

mod ledger;
mod record;

pub use ledger::{InventoryFilter, InventoryLedger, StockCheck};
pub use record::{
    DEFAULT_MAX_STOCK, DEFAULT_REORDER_POINT, InventoryRecord, InventoryStatus, NewInventoryItem,
    StockCost, Warehouse, generate_inventory_id,
};

use thiserror::Error;

/// Errors that can occur during inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// No (active) record exists for the product in the warehouse.
    #[error("Product {product_id} not found in inventory of warehouse {warehouse_id}")]
    NotFound {
        product_id: String,
        warehouse_id: String,
    },

    /// Not enough unreserved stock.
    #[error("Insufficient stock. Available: {available}, Requested: {requested}")]
    InsufficientStock { available: u32, requested: u32 },

    /// Quantities for ledger operations must be positive.
    #[error("Quantity must be a positive integer")]
    InvalidQuantity,

    /// A record already exists for this product in this warehouse.
    #[error("Inventory for product {product_id} already exists in warehouse {warehouse_id}")]
    DuplicateItem {
        product_id: String,
        warehouse_id: String,
    },

    /// A required field is blank.
    #[error("{0} is required")]
    MissingField(&'static str),
}
