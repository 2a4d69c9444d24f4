//! PostgreSQL integration tests
//!
//! These tests start a shared PostgreSQL container and need a Docker daemon,
//! so they are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p document-store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use document_store::{
    Document, DocumentStore, DocumentStoreExt, PostgresDocumentStore, RecordId, StoreError,
    Version,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/001_create_documents.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresDocumentStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE documents, sequences")
        .execute(&pool)
        .await
        .unwrap();

    PostgresDocumentStore::new(pool)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Shelf {
    id: RecordId,
    warehouse: String,
    quantity: u32,
}

impl Document for Shelf {
    const COLLECTION: &'static str = "shelves";

    fn id(&self) -> RecordId {
        self.id
    }
}

fn shelf(warehouse: &str, quantity: u32) -> Shelf {
    Shelf {
        id: RecordId::new(),
        warehouse: warehouse.to_string(),
        quantity,
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn insert_and_load() {
    let store = get_test_store().await;
    let mut doc = shelf("MAIN", 4);

    let version = store.insert_doc(&mut doc).await.unwrap();
    assert_eq!(version, Version::first());

    let loaded = store.load::<Shelf>(doc.id).await.unwrap().unwrap();
    assert_eq!(loaded.body, doc);
    assert_eq!(loaded.version, Version::first());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn duplicate_insert_is_rejected() {
    let store = get_test_store().await;
    let mut doc = shelf("MAIN", 4);
    store.insert_doc(&mut doc).await.unwrap();

    let result = store.insert_doc(&mut doc).await;
    assert!(matches!(result, Err(StoreError::AlreadyExists { .. })));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn stale_replace_conflicts() {
    let store = get_test_store().await;
    let mut doc = shelf("MAIN", 4);
    store.insert_doc(&mut doc).await.unwrap();

    store
        .replace("shelves", doc.id, Version::first(), json!(doc))
        .await
        .unwrap();
    let result = store
        .replace("shelves", doc.id, Version::first(), json!(doc))
        .await;

    assert!(matches!(
        result,
        Err(StoreError::ConcurrencyConflict { .. })
    ));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn concurrent_update_with_keeps_every_increment() {
    let store = get_test_store().await;
    let mut doc = shelf("MAIN", 0);
    store.insert_doc(&mut doc).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..3 {
        let store = store.clone();
        let id = doc.id;
        handles.push(tokio::spawn(async move {
            store
                .update_with(id, |s: &mut Shelf| {
                    s.quantity += 1;
                    Ok::<_, StoreError>(())
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let loaded = store.load::<Shelf>(doc.id).await.unwrap().unwrap();
    assert_eq!(loaded.body.quantity, 3);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn find_uses_containment() {
    let store = get_test_store().await;
    store.insert_doc(&mut shelf("MAIN", 1)).await.unwrap();
    store.insert_doc(&mut shelf("EAST", 2)).await.unwrap();

    let main: Vec<Shelf> = store.find_docs(json!({"warehouse": "MAIN"})).await.unwrap();
    assert_eq!(main.len(), 1);
    assert_eq!(main[0].quantity, 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn sequences_increment_atomically() {
    let store = get_test_store().await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.next_sequence("order-number:20240101").await.unwrap()
        }));
    }
    let mut values = Vec::new();
    for handle in handles {
        values.push(handle.await.unwrap());
    }
    values.sort();

    assert_eq!(values, (1..=10).collect::<Vec<i64>>());
}
