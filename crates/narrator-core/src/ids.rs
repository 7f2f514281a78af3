//! Identifiers shared across contexts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A seat number, `1..=max_seats`.
pub type SeatNo = u32;

/// Identifies a group chat (one session per chat).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

/// Identifies a participant on the messaging platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Identifies a message inside a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The identity that triggered an inbound intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Platform identity.
    pub user_id: UserId,
    /// Full name as reported by the platform, used as a fallback label.
    #[serde(default)]
    pub full_name: String,
}

impl Actor {
    /// Creates an actor.
    #[must_use]
    pub fn new(user_id: UserId, full_name: impl Into<String>) -> Self {
        Self {
            user_id,
            full_name: full_name.into(),
        }
    }
}
