//! Domain layer for the order fulfillment system.
//!
//! This crate provides the three entities the fulfillment workflow moves
//! between states:
//! - [`Order`] with line items, computed totals and an explicit status table
//! - [`Payment`] with a settlement lifecycle and bounded refunds
//! - [`InventoryRecord`] with reserve/release/confirm/add ledger operations
//!
//! Each entity is a [`document_store::Document`] and has a service that
//! performs every mutation as an atomic read-modify-write on the store.

pub mod error;
pub mod inventory;
pub mod order;
pub mod pagination;
pub mod payment;

pub use error::DomainError;
pub use inventory::{
    InventoryError, InventoryFilter, InventoryLedger, InventoryRecord, InventoryStatus,
    NewInventoryItem, StockCheck, StockCost, Warehouse,
};
pub use order::{
    Buyer, Order, OrderDraft, OrderError, OrderFilter, OrderItem, OrderService, OrderStatus,
    PaymentMethod, PaymentStatus, ShippingAddress, StatusUpdate, StatusChange,
};
pub use pagination::{Page, PageRequest};
pub use payment::{
    Currency, GatewayRefs, NewPayment, Payment, PaymentError, PaymentFilter, PaymentService,
    PaymentState, SettlementOutcome,
};
