//! Commands for the Session context.
//!
//! `HandleIntent` carries inbound platform intent through the router; the
//! others are the upward operations of the command layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use narrator_core::command::Command;
use narrator_core::ids::{Actor, ChatId, MessageId, SeatNo, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbound intent from a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    /// A tap on an inline choice.
    Choice {
        /// Platform callback identifier, used to answer the tap.
        callback_id: String,
        /// The choice identifier, e.g. `seat:take:3`.
        choice_id: String,
    },
    /// Free text, optionally replying to a message.
    Text {
        /// The text.
        text: String,
        /// Message this text replies to.
        #[serde(default)]
        reply_to: Option<MessageId>,
        /// When the platform says the message was sent. Ballots are judged
        /// against this instant rather than the time they are processed.
        #[serde(default)]
        sent_at: Option<DateTime<Utc>>,
    },
}

/// Command to route one inbound intent.
#[derive(Debug, Clone)]
pub struct HandleIntent {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The chat the intent arrived in.
    pub chat_id: ChatId,
    /// Who sent it.
    pub actor: Actor,
    /// What they sent.
    pub intent: Intent,
}

impl Command for HandleIntent {
    fn command_type(&self) -> &'static str {
        "session.handle_intent"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn chat_id(&self) -> Option<ChatId> {
        Some(self.chat_id)
    }
}

/// Command to open a fresh session.
#[derive(Debug, Clone)]
pub struct OpenSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Target chat.
    pub chat_id: ChatId,
    /// Seat count.
    pub seats: u32,
    /// Name of a stored scenario to preselect.
    pub scenario: Option<String>,
    /// Group label shown in the roster header.
    pub title: Option<String>,
}

impl Command for OpenSession {
    fn command_type(&self) -> &'static str {
        "session.open"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn chat_id(&self) -> Option<ChatId> {
        Some(self.chat_id)
    }
}

/// Command to reset a session to idle.
#[derive(Debug, Clone)]
pub struct ResetSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Target chat.
    pub chat_id: ChatId,
}

impl Command for ResetSession {
    fn command_type(&self) -> &'static str {
        "session.reset"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn chat_id(&self) -> Option<ChatId> {
        Some(self.chat_id)
    }
}

/// Command to hand the narrator chair to another identity.
#[derive(Debug, Clone)]
pub struct TransferNarrator {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Target chat.
    pub chat_id: ChatId,
    /// Who asks; must be the current narrator unless the chair is vacant.
    pub requested_by: Actor,
    /// The new narrator.
    pub to: Actor,
}

impl Command for TransferNarrator {
    fn command_type(&self) -> &'static str {
        "session.transfer_narrator"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn chat_id(&self) -> Option<ChatId> {
        Some(self.chat_id)
    }
}

/// Command for the narrator to seat another identity.
#[derive(Debug, Clone)]
pub struct AssignSeat {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Target chat.
    pub chat_id: ChatId,
    /// Who asks; must be the narrator.
    pub requested_by: Actor,
    /// Seat to fill.
    pub seat: SeatNo,
    /// Identity to seat.
    pub user_id: UserId,
    /// Display name; when absent the narrator is prompted for it.
    pub name: Option<String>,
}

impl Command for AssignSeat {
    fn command_type(&self) -> &'static str {
        "session.assign_seat"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn chat_id(&self) -> Option<ChatId> {
        Some(self.chat_id)
    }
}

/// Command to store a scenario.
#[derive(Debug, Clone)]
pub struct AddScenario {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Scenario name.
    pub name: String,
    /// Role label → count.
    pub roles: BTreeMap<String, u32>,
}

impl Command for AddScenario {
    fn command_type(&self) -> &'static str {
        "scenario.add"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn chat_id(&self) -> Option<ChatId> {
        None
    }
}

/// Command to delete a stored scenario.
#[derive(Debug, Clone)]
pub struct RemoveScenario {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Scenario name.
    pub name: String,
}

impl Command for RemoveScenario {
    fn command_type(&self) -> &'static str {
        "scenario.remove"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn chat_id(&self) -> Option<ChatId> {
        None
    }
}
