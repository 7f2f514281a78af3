//! Session directory and per-chat concurrency guard.
//!
//! Each chat maps to one `Arc<tokio::sync::Mutex<Session>>`, created on first
//! reference and never removed. Holding that lock is the only way to read or
//! mutate a session, so work within a chat is totally ordered while chats
//! proceed independently. The directory also keeps the last settled copy of
//! every session for the process snapshot, so writing a snapshot never
//! touches another chat's lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use narrator_core::ids::ChatId;
use tracing::debug;

use crate::domain::aggregates::Session;

/// Shared handle to one chat's session.
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// Chat → session map with lazily created locks.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    sessions: Mutex<HashMap<ChatId, SessionHandle>>,
    settled: Mutex<BTreeMap<ChatId, Session>>,
}

impl SessionDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory holding restored sessions.
    #[must_use]
    pub fn from_sessions(sessions: impl IntoIterator<Item = Session>) -> Self {
        let directory = Self::new();
        {
            let mut map = directory
                .sessions
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let mut settled = directory
                .settled
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for session in sessions {
                let chat_id = session.chat_id();
                settled.insert(chat_id, session.clone());
                map.insert(chat_id, Arc::new(tokio::sync::Mutex::new(session)));
            }
        }
        directory
    }

    /// Returns the session of `chat_id`, creating an idle one on first use.
    pub fn get_or_create(&self, chat_id: ChatId) -> SessionHandle {
        let mut map = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(chat_id)
            .or_insert_with(|| {
                debug!(%chat_id, "creating session");
                Arc::new(tokio::sync::Mutex::new(Session::new(chat_id)))
            })
            .clone()
    }

    /// Returns the session of `chat_id` if one was ever referenced.
    pub fn get(&self, chat_id: ChatId) -> Option<SessionHandle> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&chat_id)
            .cloned()
    }

    /// Chats with a session, in id order.
    pub fn chat_ids(&self) -> Vec<ChatId> {
        let mut ids: Vec<ChatId> = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Stores the settled state of `session` for the next snapshot. Called
    /// while the session's lock is held.
    pub fn settle(&self, session: &Session) {
        self.settled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.chat_id(), session.clone());
    }

    /// Settled copies of every session, in chat order.
    pub fn settled_sessions(&self) -> Vec<Session> {
        self.settled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_chat_yields_same_lock() {
        let directory = SessionDirectory::new();

        let first = directory.get_or_create(ChatId(-1));
        let second = directory.get_or_create(ChatId(-1));
        let other = directory.get_or_create(ChatId(-2));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(directory.chat_ids(), vec![ChatId(-2), ChatId(-1)]);
    }

    #[tokio::test]
    async fn test_get_does_not_create() {
        let directory = SessionDirectory::new();

        assert!(directory.get(ChatId(5)).is_none());
        directory.get_or_create(ChatId(5));
        assert!(directory.get(ChatId(5)).is_some());
    }

    #[tokio::test]
    async fn test_restored_sessions_are_served_and_settled() {
        let directory = SessionDirectory::from_sessions([Session::new(ChatId(9))]);

        let handle = directory.get(ChatId(9)).unwrap();

        assert_eq!(handle.lock().await.chat_id(), ChatId(9));
        assert_eq!(directory.settled_sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_settle_replaces_previous_copy() {
        let directory = SessionDirectory::new();
        let mut session = Session::new(ChatId(3));
        directory.settle(&session);
        session.set_roster_view(Some(narrator_core::ids::MessageId(4)));

        directory.settle(&session);

        let settled = directory.settled_sessions();
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].roster_view(), Some(narrator_core::ids::MessageId(4)));
    }
}
