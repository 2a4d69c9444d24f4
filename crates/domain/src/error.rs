//! Domain error types.

use document_store::StoreError;
use thiserror::Error;

use crate::inventory::InventoryError;
use crate::order::OrderError;
use crate::payment::PaymentError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the document store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// An order rule was violated.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// A payment rule was violated.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// An inventory rule was violated.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The requester may not touch this entity.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Malformed input that no entity rule covers.
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true if the error is a rejected state transition.
    pub fn is_invalid_state(&self) -> bool {
        match self {
            DomainError::Order(e) => e.is_invalid_state(),
            DomainError::Payment(e) => e.is_invalid_state(),
            _ => false,
        }
    }

    /// Returns true if the error means the record could not be found, either
    /// at the store level or as a domain lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DomainError::NotFound { .. }
                | DomainError::Store(StoreError::NotFound { .. })
                | DomainError::Inventory(InventoryError::NotFound { .. })
        )
    }
}
