//! Shared test doubles and utilities for the Narrator moderation engine.

mod clock;
mod documents;
mod rng;
mod transport;

pub use clock::{FixedClock, ManualClock};
pub use documents::{FailingDocumentStore, InMemoryDocumentStore};
pub use rng::{MockRng, SequenceRng};
pub use transport::{RecordingTransport, TransportCall, TransportOp};
