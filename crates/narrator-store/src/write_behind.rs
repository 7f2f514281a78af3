//! Write-behind queue for document replaces.
//!
//! Callers enqueue whole-document replaces and return immediately. One
//! background task applies them in order; failures are logged and dropped.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use narrator_core::documents::DocumentStore;

#[derive(Debug)]
enum WriteOp {
    Replace { name: String, content: String },
    Flush(oneshot::Sender<()>),
}

/// Handle to the write-behind queue. Cloning shares the same queue.
#[derive(Debug, Clone)]
pub struct WriteBehind {
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl WriteBehind {
    /// Spawns the drain task over `backend`. The task ends once every handle
    /// has been dropped and the queue is empty.
    #[must_use]
    pub fn spawn(backend: Arc<dyn DocumentStore>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteOp>();
        let handle = tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                match op {
                    WriteOp::Replace { name, content } => {
                        match backend.replace(&name, &content).await {
                            Ok(()) => debug!(document = %name, "document written"),
                            Err(err) => {
                                warn!(document = %name, error = %err, "document write failed");
                            }
                        }
                    }
                    WriteOp::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        (Self { tx }, handle)
    }

    /// Enqueues a replace of `name` with `content`.
    pub fn enqueue(&self, name: &str, content: String) {
        let op = WriteOp::Replace {
            name: name.to_owned(),
            content,
        };
        if self.tx.send(op).is_err() {
            warn!(document = %name, "write-behind queue closed, write dropped");
        }
    }

    /// Waits until every write enqueued before this call has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(WriteOp::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use narrator_test_support::{FailingDocumentStore, InMemoryDocumentStore};

    #[tokio::test]
    async fn test_writes_are_applied_in_order() {
        // Arrange
        let backend = Arc::new(InMemoryDocumentStore::new());
        let (queue, _task) = WriteBehind::spawn(backend.clone());

        // Act
        queue.enqueue("stats.json", "{\"1\":1}".to_owned());
        queue.enqueue("stats.json", "{\"1\":2}".to_owned());
        queue.flush().await;

        // Assert
        assert_eq!(backend.writes().len(), 2);
        assert_eq!(backend.document("stats.json").unwrap(), "{\"1\":2}");
    }

    #[tokio::test]
    async fn test_failed_writes_do_not_stop_the_queue() {
        let (queue, _task) = WriteBehind::spawn(Arc::new(FailingDocumentStore));

        queue.enqueue("usernames.json", "{}".to_owned());
        queue.enqueue("usernames.json", "{}".to_owned());
        queue.flush().await;

        // Still accepting work after the failures.
        queue.enqueue("usernames.json", "{}".to_owned());
        queue.flush().await;
    }

    #[tokio::test]
    async fn test_task_ends_when_handles_are_dropped() {
        let backend = Arc::new(InMemoryDocumentStore::new());
        let (queue, task) = WriteBehind::spawn(backend.clone());
        queue.enqueue("flavor.json", "[]".to_owned());

        drop(queue);
        task.await.unwrap();

        assert_eq!(backend.document("flavor.json").unwrap(), "[]");
    }
}
