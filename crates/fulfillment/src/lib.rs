//! Cross-service fulfillment for the order, payment, inventory and product
//! services.
//!
//! - [`OrderCoordinator`] prices orders from the product catalog and runs
//!   the delivery sync when an order is delivered
//! - [`PaymentCoordinator`] validates payments against their order and
//!   settles them after a persisted deadline
//! - [`ReconciliationLog`] keeps every side effect that failed
//!
//! Collaborators are reached through the traits in [`collaborators`], with
//! in-process and HTTP implementations.

pub mod catalog;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod order_coordinator;
pub mod payment_coordinator;
pub mod reconciliation;

pub use catalog::{NewProduct, Product, StoreProductCatalog};
pub use collaborators::{
    HttpInventoryGateway, HttpOrderGateway, HttpProductCatalog, InMemoryInventoryGateway,
    InMemoryProductCatalog, InventoryGateway, LocalInventoryGateway, LocalOrderGateway,
    OrderGateway, OrderSummary, ProductCatalog, ProductSnapshot,
};
pub use config::{CollaboratorConfig, SettlementConfig};
pub use error::{FulfillmentError, Result};
pub use order_coordinator::{
    DeliverySyncReport, OrderCoordinator, PlaceOrder, RequestedItem, StatusUpdateOutcome,
};
pub use payment_coordinator::{LOST_SCHEDULE_REASON, PaymentCoordinator, RecoveryReport};
pub use reconciliation::{ReconciliationEntry, ReconciliationKind, ReconciliationLog};
