//! Aggregate root abstraction.

use crate::event::DomainEvent;
use crate::ids::ChatId;

/// Trait for aggregate roots that record the facts their commands produce.
///
/// Unlike a fully event-sourced aggregate, state is mutated directly and the
/// recorded events are drained by the application layer to drive logging and
/// durable-fact persistence.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate produces.
    type Event: DomainEvent;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> ChatId;

    /// Returns the current version (number of events recorded so far).
    fn version(&self) -> i64;

    /// Returns events recorded since the last drain.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Removes and returns the events recorded since the last drain.
    fn take_uncommitted_events(&mut self) -> Vec<Self::Event>;
}
