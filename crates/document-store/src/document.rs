use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{RecordId, Result};

/// Version number of a stored document, used for optimistic concurrency control.
///
/// A document is written at version 1 and every successful replace
/// increments the version by 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version (0) of a document that has not been written.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version (1) of a freshly inserted document.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed entity persisted as a JSON document.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// The collection (table partition) this document lives in.
    const COLLECTION: &'static str;

    /// Returns the document's storage identity.
    fn id(&self) -> RecordId;

    /// Runs before every write. Derived fields are recomputed here so that
    /// persisted documents never carry caller-supplied derived values.
    fn before_save(&mut self) {}
}

/// A stored document in its untyped form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub collection: String,
    pub id: RecordId,
    pub version: Version,
    pub body: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl RawDocument {
    /// Serializes a typed document for storage.
    pub fn from_document<T: Document>(doc: &T) -> Result<Self> {
        Ok(Self {
            collection: T::COLLECTION.to_string(),
            id: doc.id(),
            version: Version::initial(),
            body: serde_json::to_value(doc)?,
            updated_at: Utc::now(),
        })
    }

    /// Deserializes the body into a typed document.
    pub fn into_versioned<T: Document>(self) -> Result<Versioned<T>> {
        Ok(Versioned {
            version: self.version,
            updated_at: self.updated_at,
            body: serde_json::from_value(self.body)?,
        })
    }
}

/// A typed document together with the version it was read at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub version: Version,
    pub updated_at: DateTime<Utc>,
    pub body: T,
}

impl<T> Versioned<T> {
    /// Discards the version, returning the document.
    pub fn into_inner(self) -> T {
        self.body
    }
}
