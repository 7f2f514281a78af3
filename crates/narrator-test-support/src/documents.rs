//! Test document stores — mock `DocumentStore` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use narrator_core::documents::{DocumentError, DocumentStore};

/// A document store backed by a map. Records every `replace`.
///
/// Reads can be switched off with [`InMemoryDocumentStore::fail_reads`] while
/// writes keep landing, which is how a flaky read path looks.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<(String, String)>>,
    reads_failing: AtomicBool,
}

impl InMemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `documents`.
    #[must_use]
    pub fn with_documents<I, N, C>(documents: I) -> Self
    where
        I: IntoIterator<Item = (N, C)>,
        N: Into<String>,
        C: Into<String>,
    {
        let store = Self::new();
        {
            let mut map = store.documents.lock().unwrap();
            for (name, content) in documents {
                map.insert(name.into(), content.into());
            }
        }
        store
    }

    /// Returns the current content of `name`, if present.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn document(&self, name: &str) -> Option<String> {
        self.documents.lock().unwrap().get(name).cloned()
    }

    /// Makes every `get` fail (`true`) or succeed again (`false`).
    pub fn fail_reads(&self, failing: bool) {
        self.reads_failing.store(failing, Ordering::SeqCst);
    }

    /// Returns a snapshot of every `replace` call, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, name: &str) -> Result<String, DocumentError> {
        if self.reads_failing.load(Ordering::SeqCst) {
            return Err(DocumentError::Unavailable("read timed out".into()));
        }
        Ok(self
            .documents
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace(&self, name: &str, content: &str) -> Result<(), DocumentError> {
        self.documents
            .lock()
            .unwrap()
            .insert(name.to_owned(), content.to_owned());
        self.writes
            .lock()
            .unwrap()
            .push((name.to_owned(), content.to_owned()));
        Ok(())
    }
}

/// A document store that is never reachable. Useful for testing degraded
/// startup and logged write failures.
#[derive(Debug)]
pub struct FailingDocumentStore;

#[async_trait]
impl DocumentStore for FailingDocumentStore {
    async fn get(&self, _name: &str) -> Result<String, DocumentError> {
        Err(DocumentError::Unavailable("connection refused".into()))
    }

    async fn replace(&self, _name: &str, _content: &str) -> Result<(), DocumentError> {
        Err(DocumentError::Unavailable("connection refused".into()))
    }
}
