//! Product catalog stub backed by the document store.
//!
//! Products carry no coordination logic of their own; this is the minimum
//! the fulfillment flows need: authoritative price/name lookups and the
//! denormalized stock counter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, ProductId, RecordId};
use document_store::{Document, DocumentStore, DocumentStoreExt, StoreError};
use serde::{Deserialize, Serialize};

use crate::collaborators::{ProductCatalog, ProductSnapshot};
use crate::error::{FulfillmentError, Result};

/// A product as stored by the product service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: RecordId,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Money,
    pub stock: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Product {
    const COLLECTION: &'static str = "products";

    fn id(&self) -> RecordId {
        self.id
    }

    fn before_save(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Product {
    /// The id other services refer to this product by.
    pub fn product_id(&self) -> ProductId {
        ProductId::new(self.id.to_string())
    }

    fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.product_id(),
            name: self.name.clone(),
            price: self.price,
            stock: self.stock,
        }
    }
}

/// Input for seeding a product.
#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Money,
    pub stock: u32,
}

/// Product catalog over a document store.
#[derive(Clone)]
pub struct StoreProductCatalog<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> StoreProductCatalog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a product.
    #[tracing::instrument(skip(self, new), fields(name = %new.name))]
    pub async fn create(&self, new: NewProduct) -> Result<Product> {
        if new.name.trim().is_empty() {
            return Err(FulfillmentError::Validation(
                "Product name is required".to_string(),
            ));
        }
        if new.price.is_negative() {
            return Err(FulfillmentError::Validation(
                "Price must not be negative".to_string(),
            ));
        }

        let now = Utc::now();
        let mut product = Product {
            id: RecordId::new(),
            name: new.name,
            description: new.description,
            category: new.category,
            price: new.price,
            stock: new.stock,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_doc(&mut product).await?;
        Ok(product)
    }

    /// Loads a product by the id other services use.
    pub async fn find(&self, id: &ProductId) -> Result<Option<Product>> {
        let Ok(record_id) = RecordId::parse(id.as_str()) else {
            return Ok(None);
        };
        Ok(self
            .store
            .load::<Product>(record_id)
            .await?
            .map(|v| v.into_inner()))
    }

    /// Sets the denormalized stock counter and returns the updated product.
    pub async fn set_stock(&self, id: &ProductId, stock: u32) -> Result<Product> {
        let record_id = RecordId::parse(id.as_str())
            .map_err(|_| FulfillmentError::ProductNotFound(id.clone()))?;
        self.store
            .update_with(record_id, |product: &mut Product| {
                product.stock = stock;
                Ok::<_, StoreError>(())
            })
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => FulfillmentError::ProductNotFound(id.clone()),
                other => other.into(),
            })
    }
}

#[async_trait]
impl<S: DocumentStore> ProductCatalog for StoreProductCatalog<S> {
    async fn get_product(&self, id: &ProductId) -> Result<ProductSnapshot> {
        self.find(id)
            .await?
            .map(|p| p.snapshot())
            .ok_or_else(|| FulfillmentError::ProductNotFound(id.clone()))
    }

    async fn set_system_stock(&self, id: &ProductId, stock: u32) -> Result<()> {
        let product = self.set_stock(id, stock).await?;
        tracing::info!(product_id = %id, stock = product.stock, "product stock synced");
        Ok(())
    }
}
