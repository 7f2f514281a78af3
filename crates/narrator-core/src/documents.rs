//! Document store port.

use async_trait::async_trait;
use thiserror::Error;

/// Failures reported by a document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// The store could not be reached.
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the write.
    #[error("document store rejected write of {name}: {reason}")]
    Rejected {
        /// Document name.
        name: String,
        /// Store-provided reason.
        reason: String,
    },
}

/// Whole-document get/replace storage for named documents.
///
/// Callers merge locally before `replace`; there are no partial updates.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns the document content, or an empty string when it does not exist.
    async fn get(&self, name: &str) -> Result<String, DocumentError>;

    /// Replaces the whole document.
    async fn replace(&self, name: &str, content: &str) -> Result<(), DocumentError>;
}
