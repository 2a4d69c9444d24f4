//! Fulfillment error types.

use common::{ProductId, RecordId};
use document_store::StoreError;
use domain::DomainError;
use thiserror::Error;

/// Errors that can occur while coordinating across services.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// A local domain operation failed.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// The document store failed outside a domain operation.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A line item's product could not be resolved.
    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    /// The referenced order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(RecordId),

    /// The caller may not use the referenced entity.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Malformed request.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A collaborator could not be reached or answered garbage.
    #[error("{service} service unavailable: {reason}")]
    Upstream {
        service: &'static str,
        reason: String,
    },

    /// A collaborator answered with an error status.
    #[error("{service} service rejected the request ({status}): {message}")]
    Rejected {
        service: &'static str,
        status: u16,
        message: String,
    },
}

impl FulfillmentError {
    pub(crate) fn upstream(service: &'static str, reason: impl ToString) -> Self {
        FulfillmentError::Upstream {
            service,
            reason: reason.to_string(),
        }
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
