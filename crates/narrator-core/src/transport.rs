//! Message transport port.
//!
//! The chat platform is an external collaborator: it can send, edit, delete
//! and pin messages carrying a menu of choices, and deliver private messages.
//! Everything the engine needs from it goes through [`MessageTransport`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{ChatId, MessageId, UserId};

/// One labeled, identifier-bearing choice attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Text shown to participants.
    pub label: String,
    /// Opaque identifier echoed back when the choice is selected.
    pub id: String,
}

impl Choice {
    /// Creates a choice.
    #[must_use]
    pub fn new(label: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            id: id.into(),
        }
    }
}

/// Rows of choices attached to a message. An empty menu means "no choices".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    /// Choice rows, top to bottom.
    pub rows: Vec<Vec<Choice>>,
}

impl Menu {
    /// An empty menu.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Appends a row, skipping empty ones.
    #[must_use]
    pub fn row(mut self, choices: Vec<Choice>) -> Self {
        self.push_row(choices);
        self
    }

    /// Appends a row in place, skipping empty ones.
    pub fn push_row(&mut self, choices: Vec<Choice>) {
        if !choices.is_empty() {
            self.rows.push(choices);
        }
    }

    /// Whether the menu has no choices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates every choice, row-major.
    pub fn choices(&self) -> impl Iterator<Item = &Choice> {
        self.rows.iter().flatten()
    }

    /// Finds a choice by identifier.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Choice> {
        self.choices().find(|c| c.id == id)
    }
}

/// Failures reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Rate limited; the platform advises waiting before retrying.
    #[error("throttled, retry after {retry_after:?}")]
    Throttled {
        /// Platform-advised delay.
        retry_after: Duration,
    },

    /// An edit carried exactly the content the message already has.
    #[error("message content not modified")]
    NotModified,

    /// The target message was deleted or is otherwise not editable.
    #[error("target message no longer exists")]
    MessageGone,

    /// The recipient never opened a private conversation with the bot.
    #[error("recipient cannot be reached privately")]
    Unreachable,

    /// The platform rejected the request for another reason.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The platform could not be reached.
    #[error("network error: {0}")]
    Network(String),
}

/// Outbound port to the chat platform.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Sends a message with a menu to a chat and returns its identifier.
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        menu: &Menu,
    ) -> Result<MessageId, TransportError>;

    /// Replaces the text and menu of an existing message.
    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        menu: &Menu,
    ) -> Result<(), TransportError>;

    /// Replaces only the menu of an existing message.
    async fn edit_menu(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        menu: &Menu,
    ) -> Result<(), TransportError>;

    /// Deletes a message.
    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId)
    -> Result<(), TransportError>;

    /// Pins a message without notifying members.
    async fn pin_message(&self, chat_id: ChatId, message_id: MessageId)
    -> Result<(), TransportError>;

    /// Delivers a private message. Fails with [`TransportError::Unreachable`]
    /// when the recipient has never interacted with the bot.
    async fn send_private(&self, user_id: UserId, text: &str) -> Result<(), TransportError>;

    /// Acknowledges a choice selection, optionally as a visible alert.
    async fn answer_choice(
        &self,
        callback_id: &str,
        text: &str,
        alert: bool,
    ) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_skips_empty_rows_and_finds_choices() {
        let menu = Menu::empty()
            .row(vec![Choice::new("1", "seat:take:1"), Choice::new("2", "seat:take:2")])
            .row(vec![])
            .row(vec![Choice::new("Start", "game:start")]);

        assert_eq!(menu.rows.len(), 2);
        assert_eq!(menu.choices().count(), 3);
        assert_eq!(menu.find("game:start").unwrap().label, "Start");
        assert!(menu.find("nope").is_none());
    }
}
