pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::RecordId;
pub use document::{Document, RawDocument, Version, Versioned};
pub use error::{Result, StoreError};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use store::{DocumentStore, DocumentStoreExt, MAX_UPDATE_ATTEMPTS, json_contains};
