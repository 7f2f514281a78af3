//! Process-local document store, used when no database is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use narrator_core::documents::{DocumentError, DocumentStore};

/// Documents kept in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, String>>,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, name: &str) -> Result<String, DocumentError> {
        Ok(self
            .documents
            .read()
            .await
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace(&self, name: &str, content: &str) -> Result<(), DocumentError> {
        self.documents
            .write()
            .await
            .insert(name.to_owned(), content.to_owned());
        Ok(())
    }
}
