use async_trait::async_trait;
use serde_json::Value;

use crate::{Document, RawDocument, RecordId, Result, StoreError, Version, Versioned};

/// Number of times [`DocumentStoreExt::update_with`] re-reads and re-applies
/// a mutation after losing an optimistic-concurrency race.
pub const MAX_UPDATE_ATTEMPTS: usize = 5;

/// Core trait for document store implementations.
///
/// All writes are single-document and atomic. Replaces are compare-and-swap
/// on the document version; there are no multi-document transactions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document at version 1.
    ///
    /// Fails with `AlreadyExists` if the `(collection, id)` pair is taken.
    async fn insert(&self, doc: RawDocument) -> Result<Version>;

    /// Fetches a document by identity.
    async fn get(&self, collection: &str, id: RecordId) -> Result<Option<RawDocument>>;

    /// Replaces a document's body if its stored version equals `expected`.
    ///
    /// Returns the new version. Fails with `ConcurrencyConflict` when another
    /// writer got there first, or `NotFound` if the document does not exist.
    async fn replace(
        &self,
        collection: &str,
        id: RecordId,
        expected: Version,
        body: Value,
    ) -> Result<Version>;

    /// Returns every document in `collection` whose body contains `filter`
    /// (JSONB `@>` semantics). An empty object matches everything.
    async fn find(&self, collection: &str, filter: Value) -> Result<Vec<RawDocument>>;

    /// Atomically increments and returns the named counter, starting at 1.
    async fn next_sequence(&self, name: &str) -> Result<i64>;
}

/// Typed convenience methods over any [`DocumentStore`].
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Runs the document's save hook and inserts it.
    async fn insert_doc<T: Document>(&self, doc: &mut T) -> Result<Version> {
        doc.before_save();
        self.insert(RawDocument::from_document(doc)?).await
    }

    /// Loads a typed document with its version.
    async fn load<T: Document>(&self, id: RecordId) -> Result<Option<Versioned<T>>> {
        match self.get(T::COLLECTION, id).await? {
            Some(raw) => Ok(Some(raw.into_versioned()?)),
            None => Ok(None),
        }
    }

    /// Loads every typed document matching `filter`.
    async fn find_docs<T: Document>(&self, filter: Value) -> Result<Vec<T>> {
        self.find(T::COLLECTION, filter)
            .await?
            .into_iter()
            .map(|raw| raw.into_versioned::<T>().map(Versioned::into_inner))
            .collect()
    }

    /// Atomic read-modify-write of a single document.
    ///
    /// Loads the document, applies `mutate` to it, runs the save hook and
    /// writes it back conditioned on the version that was read. On a
    /// concurrency conflict the whole cycle is retried from a fresh read, up
    /// to [`MAX_UPDATE_ATTEMPTS`] times. If `mutate` returns an error nothing
    /// is written and the error is returned as is.
    async fn update_with<T, E, F>(&self, id: RecordId, mut mutate: F) -> std::result::Result<T, E>
    where
        T: Document,
        E: From<StoreError> + Send,
        F: FnMut(&mut T) -> std::result::Result<(), E> + Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let current = self
                .load::<T>(id)
                .await?
                .ok_or_else(|| StoreError::NotFound {
                    collection: T::COLLECTION.to_string(),
                    id,
                })?;

            let mut doc = current.body;
            mutate(&mut doc)?;
            doc.before_save();
            let body = serde_json::to_value(&doc).map_err(StoreError::from)?;

            match self.replace(T::COLLECTION, id, current.version, body).await {
                Ok(_) => return Ok(doc),
                Err(e) if e.is_conflict() && attempt < MAX_UPDATE_ATTEMPTS => {
                    metrics::counter!(
                        "document_update_retries_total",
                        "collection" => T::COLLECTION
                    )
                    .increment(1);
                    tracing::debug!(
                        collection = T::COLLECTION,
                        %id,
                        attempt,
                        "retrying conflicted update"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

/// Returns true if `haystack` contains `needle` with PostgreSQL JSONB `@>`
/// semantics: objects match on a subset of keys, arrays match when every
/// needle element is contained in some haystack element, scalars compare equal.
pub fn json_contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Object(h), Value::Object(n)) => n
            .iter()
            .all(|(k, nv)| h.get(k).is_some_and(|hv| json_contains(hv, nv))),
        (Value::Array(h), Value::Array(n)) => n
            .iter()
            .all(|nv| h.iter().any(|hv| json_contains(hv, nv))),
        (Value::Array(h), scalar) if !scalar.is_object() => h.iter().any(|hv| hv == scalar),
        (h, n) => h == n,
    }
}
