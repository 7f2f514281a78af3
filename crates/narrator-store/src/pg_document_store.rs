//! `PostgreSQL` implementation of the `DocumentStore` trait.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::OnceCell;

use narrator_core::documents::{DocumentError, DocumentStore};

use crate::schema::CREATE_DOCUMENTS_TABLE;

/// PostgreSQL-backed document store. One row per document name.
///
/// The table is created on first successful contact, so a store built over a
/// lazy pool while the database is down starts working once it comes back.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    schema: Arc<OnceCell<()>>,
}

impl PgDocumentStore {
    /// Creates a new `PgDocumentStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema: Arc::new(OnceCell::new()),
        }
    }

    /// Creates the documents table if it does not exist. A failed attempt is
    /// retried by the next call.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Unavailable` if the statement fails.
    pub async fn ensure_schema(&self) -> Result<(), DocumentError> {
        self.schema
            .get_or_try_init(|| async {
                sqlx::query(CREATE_DOCUMENTS_TABLE)
                    .execute(&self.pool)
                    .await
                    .map(|_| ())
                    .map_err(|e| DocumentError::Unavailable(e.to_string()))
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, name: &str) -> Result<String, DocumentError> {
        self.ensure_schema().await?;
        let row: Option<(String,)> = sqlx::query_as("SELECT content FROM documents WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DocumentError::Unavailable(e.to_string()))?;
        Ok(row.map(|(content,)| content).unwrap_or_default())
    }

    async fn replace(&self, name: &str, content: &str) -> Result<(), DocumentError> {
        self.ensure_schema().await?;
        sqlx::query(
            "INSERT INTO documents (name, content) VALUES ($1, $2) \
             ON CONFLICT (name) DO UPDATE SET content = EXCLUDED.content, updated_at = NOW()",
        )
        .bind(name)
        .bind(content)
        .execute(&self.pool)
        .await
        .map_err(|e| DocumentError::Rejected {
            name: name.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}
