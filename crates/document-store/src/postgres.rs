use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{RawDocument, RecordId, Result, StoreError, Version, store::DocumentStore};

/// PostgreSQL-backed document store.
///
/// Documents live in a single `documents` table keyed by `(collection, id)`
/// with the body in a JSONB column; filters use the `@>` containment operator.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and returns a store over a fresh pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_document(row: PgRow) -> Result<RawDocument> {
        Ok(RawDocument {
            collection: row.try_get("collection")?,
            id: RecordId::from_uuid(row.try_get::<Uuid, _>("id")?),
            version: Version::new(row.try_get("version")?),
            body: row.try_get("body")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn insert(&self, doc: RawDocument) -> Result<Version> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, version, body, updated_at)
            VALUES ($1, $2, $3, $4, now())
            "#,
        )
        .bind(&doc.collection)
        .bind(doc.id.as_uuid())
        .bind(Version::first().as_i64())
        .bind(&doc.body)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("documents_pkey")
            {
                return StoreError::AlreadyExists {
                    collection: doc.collection.clone(),
                    id: doc.id,
                };
            }
            StoreError::Database(e)
        })?;

        Ok(Version::first())
    }

    async fn get(&self, collection: &str, id: RecordId) -> Result<Option<RawDocument>> {
        let row = sqlx::query(
            r#"
            SELECT collection, id, version, body, updated_at
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn replace(
        &self,
        collection: &str,
        id: RecordId,
        expected: Version,
        body: Value,
    ) -> Result<Version> {
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE documents
            SET body = $4, version = version + 1, updated_at = now()
            WHERE collection = $1 AND id = $2 AND version = $3
            RETURNING version
            "#,
        )
        .bind(collection)
        .bind(id.as_uuid())
        .bind(expected.as_i64())
        .bind(&body)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(version) = updated {
            return Ok(Version::new(version));
        }

        // Lost the compare-and-swap: find out why.
        let actual: Option<i64> =
            sqlx::query_scalar("SELECT version FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        match actual {
            Some(actual) => Err(StoreError::ConcurrencyConflict {
                collection: collection.to_string(),
                id,
                expected,
                actual: Version::new(actual),
            }),
            None => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id,
            }),
        }
    }

    async fn find(&self, collection: &str, filter: Value) -> Result<Vec<RawDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT collection, id, version, body, updated_at
            FROM documents
            WHERE collection = $1 AND body @> $2
            ORDER BY id ASC
            "#,
        )
        .bind(collection)
        .bind(&filter)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn next_sequence(&self, name: &str) -> Result<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sequences (name, value) VALUES ($1, 1)
            ON CONFLICT (name) DO UPDATE SET value = sequences.value + 1
            RETURNING value
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(value)
    }
}
