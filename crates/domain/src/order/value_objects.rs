//! Value objects for the order domain.

use std::str::FromStr;

use common::{Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::OrderError;

/// The buyer an order belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    pub user_id: UserId,
    pub email: String,
}

/// A line item with its product data captured at placement time.
///
/// Name and price are snapshots: later catalog changes do not affect
/// existing orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_price: Money,
    pub quantity: u32,
    pub subtotal: Money,
}

impl OrderItem {
    /// Creates a new line item, computing its subtotal.
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        product_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            product_price,
            quantity,
            subtotal: product_price.multiply(quantity),
        }
    }

    /// Recomputes the subtotal from price and quantity.
    pub fn recompute_subtotal(&mut self) {
        self.subtotal = self.product_price.multiply(self.quantity);
    }

    pub(crate) fn validate(&self) -> Result<(), OrderError> {
        if self.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                product_id: self.product_id.to_string(),
                quantity: self.quantity,
            });
        }
        if self.product_price.is_negative() {
            return Err(OrderError::InvalidPrice {
                product_id: self.product_id.to_string(),
                price: self.product_price.cents(),
            });
        }
        if self.checked_subtotal().is_none() {
            return Err(OrderError::AmountOutOfRange(format!(
                "Subtotal for {}",
                self.product_id
            )));
        }
        Ok(())
    }

    /// Price times quantity, or `None` past [`Money::MAX`].
    pub fn checked_subtotal(&self) -> Option<Money> {
        self.product_price
            .checked_multiply(self.quantity)
            .filter(|_| self.product_price.is_within_bounds())
    }
}

/// Default destination country for shipping addresses.
pub const DEFAULT_COUNTRY: &str = "Poland";

/// Where the order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    DEFAULT_COUNTRY.to_string()
}

impl ShippingAddress {
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
        country: Option<String>,
    ) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
            postal_code: postal_code.into(),
            country: country
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(default_country),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), OrderError> {
        let fields = [
            ("street", &self.street),
            ("city", &self.city),
            ("postalCode", &self.postal_code),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(OrderError::MissingAddressField(name));
            }
        }
        Ok(())
    }
}

/// How the buyer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Card,
    BankTransfer,
    Paypal,
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(PaymentMethod::Card),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "paypal" => Ok(PaymentMethod::Paypal),
            "cash_on_delivery" => Ok(PaymentMethod::CashOnDelivery),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}
