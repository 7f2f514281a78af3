//! Integration tests for `PgDocumentStore`.

use narrator_core::documents::DocumentStore;
use narrator_store::pg_document_store::PgDocumentStore;
use narrator_store::profiles::SCENARIOS;
use sqlx::PgPool;

async fn store_over(pool: PgPool) -> PgDocumentStore {
    let store = PgDocumentStore::new(pool);
    store.ensure_schema().await.unwrap();
    store
}

// --- get ---

#[sqlx::test]
async fn test_missing_document_reads_as_empty(pool: PgPool) {
    let store = store_over(pool).await;

    let content = store.get("nowhere.json").await.unwrap();

    assert_eq!(content, "");
}

// --- replace + get ---

#[sqlx::test]
async fn test_replace_then_get_returns_content(pool: PgPool) {
    let store = store_over(pool).await;
    let content = r#"[{"name":"trio","roles":{"citizen":2,"mafia":1}}]"#;

    store.replace(SCENARIOS, content).await.unwrap();

    assert_eq!(store.get(SCENARIOS).await.unwrap(), content);
}

#[sqlx::test]
async fn test_replace_overwrites_previous_content(pool: PgPool) {
    let store = store_over(pool.clone()).await;
    store.replace("stats.json", r#"{"-1":3}"#).await.unwrap();

    store.replace("stats.json", r#"{"-1":4}"#).await.unwrap();

    assert_eq!(store.get("stats.json").await.unwrap(), r#"{"-1":4}"#);
    let rows: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows.0, 1);
}

// --- schema ---

#[sqlx::test]
async fn test_schema_is_created_on_first_use(pool: PgPool) {
    let store = PgDocumentStore::new(pool);

    store.replace("flavor.json", r#"["quiet night"]"#).await.unwrap();

    assert_eq!(store.get("flavor.json").await.unwrap(), r#"["quiet night"]"#);
}
