//! Test transport — an in-memory `MessageTransport` that records calls.
//!
//! It keeps the current content of every live message so edits behave like a
//! real platform: identical edits fail with `NotModified`, edits of unknown
//! messages fail with `MessageGone`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use narrator_core::ids::{ChatId, MessageId, UserId};
use narrator_core::transport::{Menu, MessageTransport, TransportError};

/// Operation selector for scripted failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOp {
    /// `send_message`
    Send,
    /// `edit_message`
    Edit,
    /// `edit_menu`
    EditMenu,
    /// `delete_message`
    Delete,
    /// `pin_message`
    Pin,
    /// `send_private`
    Private,
    /// `answer_choice`
    Answer,
}

/// A successfully performed transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// A message was sent.
    Send {
        /// Target chat.
        chat_id: ChatId,
        /// Identifier allocated for the message.
        message_id: MessageId,
        /// Message text.
        text: String,
        /// Attached menu.
        menu: Menu,
    },
    /// A message's text and menu were replaced.
    Edit {
        /// Target chat.
        chat_id: ChatId,
        /// Edited message.
        message_id: MessageId,
        /// New text.
        text: String,
        /// New menu.
        menu: Menu,
    },
    /// A message's menu was replaced.
    EditMenu {
        /// Target chat.
        chat_id: ChatId,
        /// Edited message.
        message_id: MessageId,
        /// New menu.
        menu: Menu,
    },
    /// A message was deleted.
    Delete {
        /// Target chat.
        chat_id: ChatId,
        /// Deleted message.
        message_id: MessageId,
    },
    /// A message was pinned.
    Pin {
        /// Target chat.
        chat_id: ChatId,
        /// Pinned message.
        message_id: MessageId,
    },
    /// A private message was delivered.
    Private {
        /// Recipient.
        user_id: UserId,
        /// Message text.
        text: String,
    },
    /// A choice selection was acknowledged.
    Answer {
        /// Platform callback identifier.
        callback_id: String,
        /// Acknowledgement text.
        text: String,
        /// Whether it was shown as an alert.
        alert: bool,
    },
}

/// Records every successful call; failures can be scripted per operation.
#[derive(Debug)]
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    failures: Mutex<VecDeque<(TransportOp, TransportError)>>,
    unreachable: Mutex<HashSet<UserId>>,
    live: Mutex<HashMap<(ChatId, MessageId), (String, Menu)>>,
    next_id: AtomicI64,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    /// Creates an empty transport. Message ids start at 1000.
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            unreachable: Mutex::new(HashSet::new()),
            live: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1000),
        }
    }

    /// Makes the next call of `op` fail with `error`. Multiple scripted
    /// failures for the same op are consumed in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_next(&self, op: TransportOp, error: TransportError) {
        self.failures.lock().unwrap().push_back((op, error));
    }

    /// Makes private delivery to `user_id` fail with `Unreachable`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn mark_unreachable(&self, user_id: UserId) {
        self.unreachable.lock().unwrap().insert(user_id);
    }

    /// Simulates a message removed outside the engine's control.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn forget_message(&self, chat_id: ChatId, message_id: MessageId) {
        self.live.lock().unwrap().remove(&(chat_id, message_id));
    }

    /// Returns a snapshot of all successful calls.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Clears the recorded calls, keeping live messages.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Texts of messages sent to `chat_id`, in order.
    pub fn sent_texts(&self, chat_id: ChatId) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Send {
                    chat_id: c, text, ..
                } if c == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Private messages delivered, in order.
    pub fn private_messages(&self) -> Vec<(UserId, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Private { user_id, text } => Some((user_id, text)),
                _ => None,
            })
            .collect()
    }

    /// Acknowledgements sent for choice selections, in order.
    pub fn answers(&self) -> Vec<(String, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Answer { text, alert, .. } => Some((text, alert)),
                _ => None,
            })
            .collect()
    }

    /// Current text and menu of a live message.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn live_message(&self, chat_id: ChatId, message_id: MessageId) -> Option<(String, Menu)> {
        self.live.lock().unwrap().get(&(chat_id, message_id)).cloned()
    }

    fn take_failure(&self, op: TransportOp) -> Result<(), TransportError> {
        let mut failures = self.failures.lock().unwrap();
        if let Some(pos) = failures.iter().position(|(o, _)| *o == op) {
            if let Some((_, error)) = failures.remove(pos) {
                return Err(error);
            }
        }
        Ok(())
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        menu: &Menu,
    ) -> Result<MessageId, TransportError> {
        self.take_failure(TransportOp::Send)?;
        let message_id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.live
            .lock()
            .unwrap()
            .insert((chat_id, message_id), (text.to_owned(), menu.clone()));
        self.record(TransportCall::Send {
            chat_id,
            message_id,
            text: text.to_owned(),
            menu: menu.clone(),
        });
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        menu: &Menu,
    ) -> Result<(), TransportError> {
        self.take_failure(TransportOp::Edit)?;
        {
            let mut live = self.live.lock().unwrap();
            let Some(current) = live.get_mut(&(chat_id, message_id)) else {
                return Err(TransportError::MessageGone);
            };
            if current.0 == text && current.1 == *menu {
                return Err(TransportError::NotModified);
            }
            *current = (text.to_owned(), menu.clone());
        }
        self.record(TransportCall::Edit {
            chat_id,
            message_id,
            text: text.to_owned(),
            menu: menu.clone(),
        });
        Ok(())
    }

    async fn edit_menu(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        menu: &Menu,
    ) -> Result<(), TransportError> {
        self.take_failure(TransportOp::EditMenu)?;
        {
            let mut live = self.live.lock().unwrap();
            let Some(current) = live.get_mut(&(chat_id, message_id)) else {
                return Err(TransportError::MessageGone);
            };
            if current.1 == *menu {
                return Err(TransportError::NotModified);
            }
            current.1 = menu.clone();
        }
        self.record(TransportCall::EditMenu {
            chat_id,
            message_id,
            menu: menu.clone(),
        });
        Ok(())
    }

    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), TransportError> {
        self.take_failure(TransportOp::Delete)?;
        if self
            .live
            .lock()
            .unwrap()
            .remove(&(chat_id, message_id))
            .is_none()
        {
            return Err(TransportError::MessageGone);
        }
        self.record(TransportCall::Delete {
            chat_id,
            message_id,
        });
        Ok(())
    }

    async fn pin_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), TransportError> {
        self.take_failure(TransportOp::Pin)?;
        self.record(TransportCall::Pin {
            chat_id,
            message_id,
        });
        Ok(())
    }

    async fn send_private(&self, user_id: UserId, text: &str) -> Result<(), TransportError> {
        self.take_failure(TransportOp::Private)?;
        if self.unreachable.lock().unwrap().contains(&user_id) {
            return Err(TransportError::Unreachable);
        }
        self.record(TransportCall::Private {
            user_id,
            text: text.to_owned(),
        });
        Ok(())
    }

    async fn answer_choice(
        &self,
        callback_id: &str,
        text: &str,
        alert: bool,
    ) -> Result<(), TransportError> {
        self.take_failure(TransportOp::Answer)?;
        self.record(TransportCall::Answer {
            callback_id: callback_id.to_owned(),
            text: text.to_owned(),
            alert,
        });
        Ok(())
    }
}
