//! Narrator — Profile Store Adapter.
//!
//! Durable facts (scenarios, display names, faction tables, per-chat
//! counters, flavor lines, role media, the chat allow-list) live in an
//! external whole-document store. This crate wraps it in a typed cache-aside
//! layer whose writes go through a write-behind queue, and provides the
//! local process snapshot file.

pub mod memory;
pub mod pg_document_store;
pub mod profiles;
pub mod schema;
pub mod snapshot;
pub mod write_behind;

pub use memory::MemoryDocumentStore;
pub use pg_document_store::PgDocumentStore;
pub use profiles::{ProfileSnapshot, ProfileStore};
pub use snapshot::SnapshotFile;
pub use write_behind::WriteBehind;
