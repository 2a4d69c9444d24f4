//! Order aggregate and related types.

mod aggregate;
mod service;
mod state;
mod value_objects;

pub use aggregate::{
    FLAT_SHIPPING_COST, FREE_SHIPPING_THRESHOLD, MAX_CANCEL_REASON_LEN, MAX_NOTES_LEN, Order,
    OrderDraft, StatusUpdate, format_order_number, order_sequence_name, shipping_cost_for,
};
pub use service::{OrderFilter, OrderService, StatusChange};
pub use state::{OrderStatus, PaymentStatus};
pub use value_objects::{Buyer, DEFAULT_COUNTRY, OrderItem, PaymentMethod, ShippingAddress};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order has no items.
    #[error("Order must contain at least one item")]
    NoItems,

    /// Invalid quantity.
    #[error("Invalid quantity for {product_id}: {quantity} (must be at least 1)")]
    InvalidQuantity { product_id: String, quantity: u32 },

    /// Invalid price.
    #[error("Invalid price for {product_id}: {price} (must not be negative)")]
    InvalidPrice { product_id: String, price: i64 },

    /// A price, subtotal or total is beyond the supported range.
    #[error("{0} exceeds the maximum supported amount")]
    AmountOutOfRange(String),

    /// A required shipping address field is blank.
    #[error("Shipping address {0} is required")]
    MissingAddressField(&'static str),

    /// A free-text field exceeds its limit.
    #[error("{field} cannot exceed {max} characters")]
    TooLong { field: &'static str, max: usize },

    /// The status table does not allow this move.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The payment status table does not allow this move.
    #[error("Invalid payment status transition from {from} to {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Only pending orders can be cancelled by the buyer.
    #[error("Order cannot be cancelled in {current} status")]
    CannotCancel { current: OrderStatus },
}

impl OrderError {
    /// Returns true for rejected state transitions, as opposed to malformed input.
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            OrderError::InvalidTransition { .. }
                | OrderError::InvalidPaymentTransition { .. }
                | OrderError::CannotCancel { .. }
        )
    }
}
