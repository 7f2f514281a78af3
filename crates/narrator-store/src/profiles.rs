//! Typed, cache-aside access to the profile documents.
//!
//! Reads fill a local cache lazily; an unreachable or malformed document
//! degrades to its empty default and is retried on the next read. Updates
//! merge into the cached value and go out through the write-behind queue,
//! so callers never wait on the external store.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use narrator_core::documents::{DocumentError, DocumentStore};
use narrator_core::ids::{ChatId, UserId};
use narrator_roles::{FactionTable, Scenario};

use crate::write_behind::WriteBehind;

/// Named scenarios, a JSON list of `{name, roles}`.
pub const SCENARIOS: &str = "scenarios.json";
/// Identity → display name.
pub const USERNAMES: &str = "usernames.json";
/// `{elimination: [...], independent: [...]}` role classification.
pub const FACTIONS: &str = "factions.json";
/// Chat → finished game counter.
pub const STATS: &str = "stats.json";
/// Narrator-curated flavor lines.
pub const FLAVOR: &str = "flavor.json";
/// Role label → media reference.
pub const ROLE_MEDIA: &str = "role_media.json";
/// Chats the engine serves; empty means every chat.
pub const ALLOWED_CHATS: &str = "allowed_chats.json";

/// The profile documents carried in the process snapshot, so a restart
/// with the document store down still knows scenarios and counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSnapshot {
    /// Stored scenarios.
    pub scenarios: Vec<Scenario>,
    /// Chat → finished game counter.
    pub stats: BTreeMap<ChatId, u64>,
    /// Allow-listed chats.
    pub allowed_chats: BTreeSet<ChatId>,
    /// Identity → display name.
    pub usernames: BTreeMap<UserId, String>,
}

type Replay = Box<dyn Fn(&mut Value) + Send + Sync>;

/// A cached document the backend has not confirmed yet.
struct Unsynced {
    /// Content to start from when the backend holds nothing.
    fallback: Value,
    /// Changes to merge into the backend copy once it can be read.
    replays: Vec<Replay>,
}

#[derive(Default)]
struct Cache {
    values: HashMap<&'static str, Value>,
    unsynced: HashMap<&'static str, Unsynced>,
}

/// Best known value of a document, and whether the backend confirmed it.
enum Current {
    Synced(Option<Value>),
    Unsynced(Option<Value>),
}

/// Cache-aside profile store over a [`DocumentStore`].
///
/// A change made while the backend cannot be read stays in the cache and is
/// merged into the backend copy on the next successful read; a whole-document
/// replace is never built on top of a default the backend did not confirm.
pub struct ProfileStore {
    backend: Arc<dyn DocumentStore>,
    writes: WriteBehind,
    cache: RwLock<Cache>,
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore").finish_non_exhaustive()
    }
}

impl ProfileStore {
    /// Creates a store reading from `backend` and writing through `writes`.
    #[must_use]
    pub fn new(backend: Arc<dyn DocumentStore>, writes: WriteBehind) -> Self {
        Self {
            backend,
            writes,
            cache: RwLock::new(Cache::default()),
        }
    }

    /// Waits until all queued writes have been attempted.
    pub async fn flush(&self) {
        self.writes.flush().await;
    }

    /// Reads `name` from the backend. `Ok(None)` for an empty or malformed
    /// document.
    async fn fetch(&self, name: &'static str) -> Result<Option<Value>, DocumentError> {
        let content = self.backend.get(name).await?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<Value>(&content) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(document = name, error = %err, "malformed document, using defaults");
                Ok(None)
            }
        }
    }

    async fn current(&self, cache: &mut Cache, name: &'static str) -> Current {
        if !cache.unsynced.contains_key(name) {
            if let Some(value) = cache.values.get(name) {
                return Current::Synced(Some(value.clone()));
            }
        }

        match self.fetch(name).await {
            Ok(found) => {
                let Some(pending) = cache.unsynced.remove(name) else {
                    if let Some(value) = &found {
                        cache.values.insert(name, value.clone());
                    }
                    return Current::Synced(found);
                };
                let write_back = found.is_none() || !pending.replays.is_empty();
                let mut merged = found.unwrap_or(pending.fallback);
                for replay in &pending.replays {
                    replay(&mut merged);
                }
                cache.values.insert(name, merged.clone());
                if write_back {
                    debug!(
                        document = name,
                        merged = pending.replays.len(),
                        "document store readable again, merging held changes"
                    );
                    self.writes.enqueue(name, merged.to_string());
                }
                Current::Synced(Some(merged))
            }
            Err(err) => {
                warn!(document = name, error = %err, "document store unreachable, using cached or default value");
                Current::Unsynced(cache.values.get(name).cloned())
            }
        }
    }

    async fn load<T>(&self, name: &'static str) -> T
    where
        T: DeserializeOwned + Default,
    {
        {
            let cache = self.cache.read().await;
            if !cache.unsynced.contains_key(name) {
                if let Some(value) = cache.values.get(name) {
                    if let Ok(parsed) = serde_json::from_value(value.clone()) {
                        return parsed;
                    }
                }
            }
        }

        let mut cache = self.cache.write().await;
        let (Current::Synced(value) | Current::Unsynced(value)) =
            self.current(&mut cache, name).await;
        value
            .and_then(|value| {
                serde_json::from_value(value)
                    .map_err(|err| {
                        warn!(document = name, error = %err, "malformed document, using defaults");
                    })
                    .ok()
            })
            .unwrap_or_default()
    }

    async fn update<T, R, F>(&self, name: &'static str, change: F) -> R
    where
        T: DeserializeOwned + Serialize + Default + 'static,
        R: 'static,
        F: Fn(&mut T) -> R + Send + Sync + 'static,
    {
        let mut cache = self.cache.write().await;
        let (current, synced) = match self.current(&mut cache, name).await {
            Current::Synced(value) => (value, true),
            Current::Unsynced(value) => (value, false),
        };
        let mut doc: T = current
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();
        let result = change(&mut doc);
        let value = match serde_json::to_value(&doc) {
            Ok(value) => value,
            Err(err) => {
                warn!(document = name, error = %err, "document not serializable");
                return result;
            }
        };
        cache.values.insert(name, value.clone());

        if synced {
            self.writes.enqueue(name, value.to_string());
        } else {
            let replay: Replay = Box::new(move |merged: &mut Value| {
                let mut doc: T = serde_json::from_value(merged.clone()).unwrap_or_default();
                change(&mut doc);
                if let Ok(next) = serde_json::to_value(&doc) {
                    *merged = next;
                }
            });
            let fallback = serde_json::to_value(T::default()).unwrap_or(Value::Null);
            cache
                .unsynced
                .entry(name)
                .or_insert_with(|| Unsynced {
                    fallback,
                    replays: Vec::new(),
                })
                .replays
                .push(replay);
            warn!(document = name, "change held in cache until the document store can be read");
        }
        result
    }

    /// Copies the snapshotted documents out of the store.
    pub async fn export(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            scenarios: self.load(SCENARIOS).await,
            stats: self.load(STATS).await,
            allowed_chats: self.load(ALLOWED_CHATS).await,
            usernames: self.load(USERNAMES).await,
        }
    }

    /// Seeds documents from a snapshot. A document the backend already holds
    /// wins; an absent one is restored and written back; an unreachable
    /// backend only gets the cache filled.
    pub async fn restore_missing(&self, snapshot: ProfileSnapshot) {
        self.restore_one(SCENARIOS, &snapshot.scenarios).await;
        self.restore_one(STATS, &snapshot.stats).await;
        self.restore_one(ALLOWED_CHATS, &snapshot.allowed_chats).await;
        self.restore_one(USERNAMES, &snapshot.usernames).await;
    }

    async fn restore_one<T: Serialize>(&self, name: &'static str, doc: &T) {
        let Ok(value) = serde_json::to_value(doc) else {
            return;
        };
        let write_back = match self.backend.get(name).await {
            Ok(content) if !content.trim().is_empty() => return,
            Ok(_) => true,
            Err(err) => {
                warn!(document = name, error = %err, "document store unreachable, restoring from snapshot");
                false
            }
        };
        let mut cache = self.cache.write().await;
        cache.values.insert(name, value.clone());
        if write_back {
            self.writes.enqueue(name, value.to_string());
        } else {
            cache.unsynced.insert(
                name,
                Unsynced {
                    fallback: value,
                    replays: Vec::new(),
                },
            );
        }
    }

    /// All stored scenarios.
    pub async fn scenarios(&self) -> Vec<Scenario> {
        self.load(SCENARIOS).await
    }

    /// Looks a scenario up by name.
    pub async fn scenario(&self, name: &str) -> Option<Scenario> {
        self.scenarios().await.into_iter().find(|s| s.name == name)
    }

    /// Adds `scenario`, replacing any scenario with the same name.
    pub async fn upsert_scenario(&self, scenario: Scenario) {
        self.update(SCENARIOS, move |list: &mut Vec<Scenario>| {
            list.retain(|s| s.name != scenario.name);
            list.push(scenario.clone());
        })
        .await;
    }

    /// Removes the scenario called `name`. Returns whether it existed.
    pub async fn remove_scenario(&self, name: &str) -> bool {
        let name = name.to_owned();
        self.update(SCENARIOS, move |list: &mut Vec<Scenario>| {
            let before = list.len();
            list.retain(|s| s.name != name);
            list.len() != before
        })
        .await
    }

    /// Remembered display name of `user_id`.
    pub async fn display_name(&self, user_id: UserId) -> Option<String> {
        let names: BTreeMap<UserId, String> = self.load(USERNAMES).await;
        names.get(&user_id).cloned()
    }

    /// Remembers `name` for `user_id`. Unchanged names are not rewritten.
    pub async fn remember_name(&self, user_id: UserId, name: &str) {
        if self.display_name(user_id).await.as_deref() == Some(name) {
            return;
        }
        let name = name.to_owned();
        self.update(USERNAMES, move |names: &mut BTreeMap<UserId, String>| {
            names.insert(user_id, name.clone());
        })
        .await;
    }

    /// The faction classification table.
    pub async fn factions(&self) -> FactionTable {
        self.load(FACTIONS).await
    }

    /// Number of finished games in `chat_id`.
    pub async fn event_counter(&self, chat_id: ChatId) -> u64 {
        let stats: BTreeMap<ChatId, u64> = self.load(STATS).await;
        stats.get(&chat_id).copied().unwrap_or(0)
    }

    /// Increments the counter of `chat_id`, returning the new value.
    pub async fn increment_counter(&self, chat_id: ChatId) -> u64 {
        self.update(STATS, move |stats: &mut BTreeMap<ChatId, u64>| {
            let counter = stats.entry(chat_id).or_insert(0);
            *counter += 1;
            *counter
        })
        .await
    }

    /// Narrator-curated flavor lines.
    pub async fn flavor_lines(&self) -> Vec<String> {
        self.load(FLAVOR).await
    }

    /// Media reference configured for `role`.
    pub async fn role_media(&self, role: &str) -> Option<String> {
        let media: BTreeMap<String, String> = self.load(ROLE_MEDIA).await;
        media.get(role.trim()).cloned()
    }

    /// The allow-listed chats. Empty means every chat is served.
    pub async fn allowed_chats(&self) -> BTreeSet<ChatId> {
        self.load(ALLOWED_CHATS).await
    }

    /// Whether the engine serves `chat_id`.
    pub async fn is_allowed(&self, chat_id: ChatId) -> bool {
        let allowed = self.allowed_chats().await;
        allowed.is_empty() || allowed.contains(&chat_id)
    }
}
