//! Domain error types.

use thiserror::Error;

use crate::ids::MessageId;
use crate::transport::TransportError;

/// Top-level domain error type.
///
/// Every session operation either applies fully or returns one of these
/// before touching state.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The actor lacks the narrator or occupant right the operation needs.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// The operation is not legal in the session's current phase.
    #[error("operation requires phase {expected}, session is in {actual}")]
    InvalidPhase {
        /// Phase(s) the operation accepts.
        expected: &'static str,
        /// Phase the session is currently in.
        actual: &'static str,
    },

    /// A referenced record (scenario, seat, round) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A stored message reference is no longer valid on the platform.
    #[error("stale message reference: {0}")]
    StaleReference(MessageId),

    /// An outbound platform call failed after bounded retries.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Whether this error should be shown to the actor as a visible notice
    /// rather than logged as a fault.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized(_) | Self::Validation(_) | Self::InvalidPhase { .. } | Self::NotFound(_)
        )
    }
}
