use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::{
    RawDocument, RecordId, Result, StoreError, Version,
    store::{DocumentStore, json_contains},
};

type Key = (String, RecordId);

/// In-memory document store.
///
/// Provides the same compare-and-swap semantics as the PostgreSQL
/// implementation, so services behave identically on top of either.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<Key, RawDocument>>>,
    sequences: Arc<Mutex<HashMap<String, i64>>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.documents
            .read()
            .await
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }

    /// Clears all documents and sequences.
    pub async fn clear(&self) {
        self.documents.write().await.clear();
        self.sequences.lock().await.clear();
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, mut doc: RawDocument) -> Result<Version> {
        let key = (doc.collection.clone(), doc.id);
        let mut store = self.documents.write().await;

        if store.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                collection: doc.collection,
                id: doc.id,
            });
        }

        doc.version = Version::first();
        doc.updated_at = Utc::now();
        store.insert(key, doc);
        Ok(Version::first())
    }

    async fn get(&self, collection: &str, id: RecordId) -> Result<Option<RawDocument>> {
        let store = self.documents.read().await;
        Ok(store.get(&(collection.to_string(), id)).cloned())
    }

    async fn replace(
        &self,
        collection: &str,
        id: RecordId,
        expected: Version,
        body: Value,
    ) -> Result<Version> {
        let mut store = self.documents.write().await;

        let doc = store
            .get_mut(&(collection.to_string(), id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id,
            })?;

        if doc.version != expected {
            return Err(StoreError::ConcurrencyConflict {
                collection: collection.to_string(),
                id,
                expected,
                actual: doc.version,
            });
        }

        doc.version = doc.version.next();
        doc.body = body;
        doc.updated_at = Utc::now();
        Ok(doc.version)
    }

    async fn find(&self, collection: &str, filter: Value) -> Result<Vec<RawDocument>> {
        let store = self.documents.read().await;
        let mut docs: Vec<_> = store
            .values()
            .filter(|d| d.collection == collection && json_contains(&d.body, &filter))
            .cloned()
            .collect();
        docs.sort_by_key(|d| d.id);
        Ok(docs)
    }

    async fn next_sequence(&self, name: &str) -> Result<i64> {
        let mut sequences = self.sequences.lock().await;
        let value = sequences.entry(name.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}
