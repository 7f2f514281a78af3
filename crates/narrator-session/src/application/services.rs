//! Collaborators shared by every handler, and the process snapshot.

use std::sync::{Arc, Mutex, PoisonError};

use narrator_core::clock::Clock;
use narrator_core::ids::ChatId;
use narrator_core::rng::DeterministicRng;
use narrator_core::transport::MessageTransport;
use narrator_store::{ProfileSnapshot, ProfileStore, SnapshotFile};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::aggregates::Session;
use crate::domain::config::GameConfig;

use super::directory::SessionDirectory;

/// Everything the process persists locally: all sessions plus the profile
/// documents a restart cannot do without.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessSnapshot {
    /// Every session, settled.
    pub sessions: Vec<Session>,
    /// Scenarios, counters, allow-list and names.
    pub profiles: ProfileSnapshot,
}

/// Handler dependencies, owned by the service root and shared as
/// `Arc<SessionServices>`.
pub struct SessionServices {
    /// Chat → session.
    pub directory: SessionDirectory,
    /// Outbound platform port.
    pub transport: Arc<dyn MessageTransport>,
    /// Durable profile documents.
    pub profiles: Arc<ProfileStore>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Game knobs.
    pub config: GameConfig,
    rng: Mutex<Box<dyn DeterministicRng>>,
    snapshot: Option<SnapshotFile>,
    snapshot_writes: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for SessionServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionServices")
            .field("directory", &self.directory)
            .field("config", &self.config)
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}

impl SessionServices {
    /// Wires the services without a snapshot file.
    #[must_use]
    pub fn new(
        directory: SessionDirectory,
        transport: Arc<dyn MessageTransport>,
        profiles: Arc<ProfileStore>,
        clock: Arc<dyn Clock>,
        rng: Box<dyn DeterministicRng>,
        config: GameConfig,
    ) -> Self {
        Self {
            directory,
            transport,
            profiles,
            clock,
            config,
            rng: Mutex::new(rng),
            snapshot: None,
            snapshot_writes: tokio::sync::Mutex::new(()),
        }
    }

    /// Writes a process snapshot to `file` after every settled intent.
    #[must_use]
    pub fn with_snapshot(mut self, file: SnapshotFile) -> Self {
        self.snapshot = Some(file);
        self
    }

    /// Runs `draw` with exclusive access to the RNG. Never hold the result
    /// of this across an await.
    pub fn with_rng<T>(&self, draw: impl FnOnce(&mut dyn DeterministicRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        draw(&mut **rng)
    }

    /// Chat label for headers: the session title, or the chat id.
    #[must_use]
    pub fn chat_label(session: &Session) -> String {
        session
            .title()
            .map_or_else(|| session.chat_id().to_string(), str::to_owned)
    }

    /// Records `session` as settled and rewrites the snapshot file.
    /// Failures are logged; gameplay never waits on them.
    pub async fn persist(&self, session: &Session) {
        self.directory.settle(session);
        let Some(file) = &self.snapshot else {
            return;
        };
        let _guard = self.snapshot_writes.lock().await;
        let snapshot = ProcessSnapshot {
            sessions: self.directory.settled_sessions(),
            profiles: self.profiles.export().await,
        };
        match file.save(&snapshot).await {
            Ok(()) => debug!(chat_id = %session.chat_id(), "snapshot written"),
            Err(err) => warn!(chat_id = %session.chat_id(), error = %err, "snapshot write failed"),
        }
    }

    /// Loads a process snapshot, seeding the profile store with what it
    /// holds. Returns the directory to serve; empty when there is no usable
    /// snapshot.
    pub async fn restore(file: &SnapshotFile, profiles: &ProfileStore) -> SessionDirectory {
        let Some(snapshot) = file.load::<ProcessSnapshot>().await else {
            return SessionDirectory::new();
        };
        let chats: Vec<ChatId> = snapshot.sessions.iter().map(Session::chat_id).collect();
        info!(sessions = chats.len(), "restoring sessions from snapshot");
        profiles.restore_missing(snapshot.profiles).await;
        SessionDirectory::from_sessions(snapshot.sessions)
    }
}
