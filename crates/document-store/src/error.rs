use thiserror::Error;

use crate::{RecordId, Version};

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored version did not match the version the writer read.
    #[error(
        "Concurrency conflict for {collection}/{id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        collection: String,
        id: RecordId,
        expected: Version,
        actual: Version,
    },

    /// A document with the same identity already exists.
    #[error("Document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: RecordId },

    /// The document was not found.
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: RecordId },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true for errors a read-modify-write loop may retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
