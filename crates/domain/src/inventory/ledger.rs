//! Inventory ledger service.

use chrono::Utc;
use common::{ProductId, RecordId};
use document_store::{DocumentStore, DocumentStoreExt, StoreError};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::DomainError;
use crate::pagination::{Page, PageRequest};

use super::{
    InventoryError, InventoryRecord, InventoryStatus, NewInventoryItem, Warehouse,
    generate_inventory_id,
};

/// Filters for the admin inventory listing.
#[derive(Debug, Clone, Default)]
pub struct InventoryFilter {
    pub status: Option<InventoryStatus>,
    pub warehouse_id: Option<String>,
    pub low_stock: Option<bool>,
}

/// Answer to "can `requested_quantity` units be reserved right now?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCheck {
    pub available: bool,
    pub available_quantity: u32,
    pub requested_quantity: u32,
}

/// The inventory ledger.
///
/// Each ledger operation locates the record for `(product, warehouse)` and
/// applies the change as one atomic read-modify-write, so concurrent
/// reservations against the same record cannot oversell it.
#[derive(Clone)]
pub struct InventoryLedger<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> InventoryLedger<S> {
    /// Creates a new ledger over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a record. At most one record exists per product and warehouse.
    #[tracing::instrument(skip(self, item), fields(product_id = %item.product_id))]
    pub async fn create_item(
        &self,
        item: NewInventoryItem,
    ) -> Result<InventoryRecord, DomainError> {
        let warehouse_id = item
            .warehouse
            .as_ref()
            .map_or(Warehouse::DEFAULT_ID, |w| w.id.as_str())
            .to_string();
        if self
            .find_record(&item.product_id, &warehouse_id, false)
            .await?
            .is_some()
        {
            return Err(InventoryError::DuplicateItem {
                product_id: item.product_id.to_string(),
                warehouse_id,
            }
            .into());
        }

        let now = Utc::now();
        let id = record_id_for(&item.product_id, &warehouse_id);
        let product_id = item.product_id.to_string();
        let mut record = InventoryRecord::create(id, generate_inventory_id(now), item, now)?;
        match self.store.insert_doc(&mut record).await {
            Ok(_) => {}
            Err(StoreError::AlreadyExists { .. }) => {
                return Err(InventoryError::DuplicateItem {
                    product_id,
                    warehouse_id,
                }
                .into());
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!(
            inventory_id = record.inventory_id(),
            quantity = record.quantity(),
            "inventory item created"
        );
        Ok(record)
    }

    /// Finds the record for a product in a warehouse.
    pub async fn find_record(
        &self,
        product_id: &ProductId,
        warehouse_id: &str,
        active_only: bool,
    ) -> Result<Option<InventoryRecord>, DomainError> {
        let mut filter = json!({
            "product_id": product_id,
            "warehouse": { "id": warehouse_id },
        });
        if active_only {
            filter["status"] = json!(InventoryStatus::Active);
        }
        let records: Vec<InventoryRecord> = self.store.find_docs(filter).await?;
        Ok(records.into_iter().next())
    }

    /// Loads the record for a product in a warehouse, whatever its status.
    pub async fn get_by_product(
        &self,
        product_id: &ProductId,
        warehouse_id: &str,
    ) -> Result<InventoryRecord, DomainError> {
        self.find_record(product_id, warehouse_id, false)
            .await?
            .ok_or_else(|| not_found(product_id, warehouse_id))
    }

    /// Reports whether `qty` units could be reserved.
    pub async fn check_stock(
        &self,
        product_id: &ProductId,
        qty: u32,
        warehouse_id: &str,
    ) -> Result<StockCheck, DomainError> {
        let record = self
            .find_record(product_id, warehouse_id, true)
            .await?
            .ok_or_else(|| not_found(product_id, warehouse_id))?;

        Ok(StockCheck {
            available: record.available_quantity() >= qty,
            available_quantity: record.available_quantity(),
            requested_quantity: qty,
        })
    }

    /// Reserves `qty` units of an active record.
    #[tracing::instrument(skip(self))]
    pub async fn reserve_stock(
        &self,
        product_id: &ProductId,
        qty: u32,
        warehouse_id: &str,
    ) -> Result<InventoryRecord, DomainError> {
        let result = self
            .mutate_active(product_id, warehouse_id, |record| {
                record.reserve(qty, Utc::now())
            })
            .await;

        match &result {
            Ok(record) => {
                metrics::counter!("inventory_reservations_total").increment(1);
                tracing::info!(
                    reserved = record.reserved_quantity(),
                    available = record.available_quantity(),
                    "stock reserved"
                );
            }
            Err(DomainError::Inventory(InventoryError::InsufficientStock { .. })) => {
                metrics::counter!("inventory_reservation_rejections_total").increment(1);
            }
            Err(_) => {}
        }
        result
    }

    /// Releases up to `qty` reserved units of an active record.
    #[tracing::instrument(skip(self))]
    pub async fn release_reserved_stock(
        &self,
        product_id: &ProductId,
        qty: u32,
        warehouse_id: &str,
    ) -> Result<InventoryRecord, DomainError> {
        self.mutate_active(product_id, warehouse_id, |record| {
            record.release(qty, Utc::now()).map(|_| ())
        })
        .await
    }

    /// Takes `qty` units off both the reservation and physical stock.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_movement(
        &self,
        product_id: &ProductId,
        qty: u32,
        warehouse_id: &str,
    ) -> Result<InventoryRecord, DomainError> {
        let record = self
            .mutate_active(product_id, warehouse_id, |record| {
                record.confirm_movement(qty, Utc::now())
            })
            .await?;

        tracing::info!(
            quantity = record.quantity(),
            reserved = record.reserved_quantity(),
            "movement confirmed"
        );
        Ok(record)
    }

    /// Delivery of an order line: the same ledger change as [`Self::confirm_movement`].
    pub async fn deliver(
        &self,
        product_id: &ProductId,
        qty: u32,
        warehouse_id: &str,
    ) -> Result<InventoryRecord, DomainError> {
        self.confirm_movement(product_id, qty, warehouse_id).await
    }

    /// Restocks a record in any status, optionally re-averaging unit cost.
    #[tracing::instrument(skip(self))]
    pub async fn add_stock(
        &self,
        product_id: &ProductId,
        qty: u32,
        unit_cost: Option<common::Money>,
        warehouse_id: &str,
    ) -> Result<InventoryRecord, DomainError> {
        let record = self
            .find_record(product_id, warehouse_id, false)
            .await?
            .ok_or_else(|| not_found(product_id, warehouse_id))?;

        self.store
            .update_with(record.id(), |record: &mut InventoryRecord| {
                record.add_stock(qty, unit_cost, Utc::now())?;
                Ok::<_, DomainError>(())
            })
            .await
            .map_err(|e| vanished_as_not_found(e, product_id, warehouse_id))
    }

    /// Active records at or below their reorder point, lowest stock first.
    pub async fn low_stock_items(
        &self,
        warehouse_id: Option<&str>,
    ) -> Result<Vec<InventoryRecord>, DomainError> {
        let mut filter = json!({
            "status": InventoryStatus::Active,
            "is_low_stock": true,
        });
        if let Some(warehouse_id) = warehouse_id {
            filter["warehouse"] = json!({ "id": warehouse_id });
        }

        let mut records: Vec<InventoryRecord> = self.store.find_docs(filter).await?;
        records.sort_by_key(|r| r.quantity());
        Ok(records)
    }

    /// Lists records, most recently created first.
    pub async fn list(
        &self,
        filter: &InventoryFilter,
        page: PageRequest,
    ) -> Result<Page<InventoryRecord>, DomainError> {
        let mut query = Map::new();
        if let Some(status) = filter.status {
            query.insert("status".into(), json!(status));
        }
        if let Some(warehouse_id) = &filter.warehouse_id {
            query.insert("warehouse".into(), json!({ "id": warehouse_id }));
        }
        if let Some(low_stock) = filter.low_stock {
            query.insert("is_low_stock".into(), json!(low_stock));
        }

        let mut records: Vec<InventoryRecord> =
            self.store.find_docs(Value::Object(query)).await?;
        records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(page.paginate(records))
    }

    /// Applies `op` to the active record for the pair. The active check is
    /// repeated on the fresh read inside the atomic update.
    async fn mutate_active<F>(
        &self,
        product_id: &ProductId,
        warehouse_id: &str,
        mut op: F,
    ) -> Result<InventoryRecord, DomainError>
    where
        F: FnMut(&mut InventoryRecord) -> Result<(), InventoryError> + Send,
    {
        let record = self
            .find_record(product_id, warehouse_id, true)
            .await?
            .ok_or_else(|| not_found(product_id, warehouse_id))?;

        self.store
            .update_with(record.id(), |record: &mut InventoryRecord| {
                if !record.is_active() {
                    return Err(not_found(product_id, warehouse_id));
                }
                op(record)?;
                Ok(())
            })
            .await
            .map_err(|e| vanished_as_not_found(e, product_id, warehouse_id))
    }
}

fn not_found(product_id: &ProductId, warehouse_id: &str) -> DomainError {
    InventoryError::NotFound {
        product_id: product_id.to_string(),
        warehouse_id: warehouse_id.to_string(),
    }
    .into()
}

/// Storage id of the record for a product in a warehouse. Two creates for
/// the same pair collide on the primary key.
fn record_id_for(product_id: &ProductId, warehouse_id: &str) -> RecordId {
    RecordId::derived(&json!(["inventory", warehouse_id, product_id]).to_string())
}

fn vanished_as_not_found(
    err: DomainError,
    product_id: &ProductId,
    warehouse_id: &str,
) -> DomainError {
    match err {
        DomainError::Store(StoreError::NotFound { .. }) => not_found(product_id, warehouse_id),
        other => other,
    }
}
