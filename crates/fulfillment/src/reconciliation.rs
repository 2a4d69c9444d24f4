//! Durable record of best-effort side effects that did not happen.
//!
//! Delivery sync and settlement propagation never block the primary state
//! change. When one of their calls fails the failure lands here, so an
//! operator can replay it instead of digging through logs.

use chrono::{DateTime, Utc};
use common::{ProductId, RecordId};
use document_store::{Document, DocumentStore, DocumentStoreExt};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::Result;

/// Which side effect failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationKind {
    /// Inventory deliver call for a delivered order line.
    InventoryDeliver,
    /// Product service denormalized stock update.
    ProductStockSync,
    /// Order update after a payment settled.
    SettlementPropagation,
}

impl ReconciliationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationKind::InventoryDeliver => "inventory_deliver",
            ReconciliationKind::ProductStockSync => "product_stock_sync",
            ReconciliationKind::SettlementPropagation => "settlement_propagation",
        }
    }
}

impl std::fmt::Display for ReconciliationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed side effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationEntry {
    pub id: RecordId,
    pub kind: ReconciliationKind,
    pub order_id: Option<RecordId>,
    pub payment_id: Option<RecordId>,
    pub product_id: Option<ProductId>,
    pub quantity: Option<u32>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl Document for ReconciliationEntry {
    const COLLECTION: &'static str = "reconciliation";

    fn id(&self) -> RecordId {
        self.id
    }
}

impl ReconciliationEntry {
    pub fn new(kind: ReconciliationKind, reason: impl ToString) -> Self {
        Self {
            id: RecordId::new(),
            kind,
            order_id: None,
            payment_id: None,
            product_id: None,
            quantity: None,
            reason: reason.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn order(mut self, id: RecordId) -> Self {
        self.order_id = Some(id);
        self
    }

    pub fn payment(mut self, id: RecordId) -> Self {
        self.payment_id = Some(id);
        self
    }

    pub fn product(mut self, id: ProductId, quantity: u32) -> Self {
        self.product_id = Some(id);
        self.quantity = Some(quantity);
        self
    }
}

/// Append-only reconciliation collection.
#[derive(Clone)]
pub struct ReconciliationLog<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> ReconciliationLog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Appends an entry.
    pub async fn record(&self, mut entry: ReconciliationEntry) -> Result<()> {
        metrics::counter!("reconciliation_entries_total", "kind" => entry.kind.as_str())
            .increment(1);
        tracing::warn!(
            kind = %entry.kind,
            order_id = ?entry.order_id,
            payment_id = ?entry.payment_id,
            product_id = ?entry.product_id,
            reason = %entry.reason,
            "side effect needs reconciliation"
        );
        self.store.insert_doc(&mut entry).await?;
        Ok(())
    }

    /// Appends an entry from a path that has nowhere to report a failure.
    pub async fn record_quietly(&self, entry: ReconciliationEntry) {
        let kind = entry.kind;
        if let Err(e) = self.record(entry).await {
            tracing::error!(%kind, error = %e, "failed to persist reconciliation entry");
        }
    }

    /// Lists entries, newest first, optionally restricted to one kind.
    pub async fn list(&self, kind: Option<ReconciliationKind>) -> Result<Vec<ReconciliationEntry>> {
        let filter = match kind {
            Some(kind) => json!({ "kind": kind }),
            None => json!({}),
        };
        let mut entries: Vec<ReconciliationEntry> = self.store.find_docs(filter).await?;
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_store::InMemoryDocumentStore;

    #[tokio::test]
    async fn test_record_and_filter_by_kind() {
        let log = ReconciliationLog::new(InMemoryDocumentStore::new());
        let order_id = RecordId::new();

        log.record(
            ReconciliationEntry::new(ReconciliationKind::InventoryDeliver, "timeout")
                .order(order_id)
                .product(ProductId::new("P1"), 3),
        )
        .await
        .unwrap();
        log.record_quietly(
            ReconciliationEntry::new(ReconciliationKind::SettlementPropagation, "refused")
                .payment(RecordId::new()),
        )
        .await;

        assert_eq!(log.list(None).await.unwrap().len(), 2);
        let deliveries = log
            .list(Some(ReconciliationKind::InventoryDeliver))
            .await
            .unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].order_id, Some(order_id));
        assert_eq!(deliveries[0].quantity, Some(3));
        assert_eq!(deliveries[0].reason, "timeout");
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(ReconciliationKind::ProductStockSync).unwrap(),
            json!("product_stock_sync")
        );
    }
}
