//! Route modules: chat sessions and the scenario catalogue.

pub mod chats;
pub mod health;
pub mod scenarios;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use narrator_core::documents::DocumentStore;
    use narrator_session::GameConfig;
    use narrator_session::application::directory::SessionDirectory;
    use narrator_session::application::services::SessionServices;
    use narrator_store::{ProfileStore, WriteBehind};
    use narrator_test_support::{FixedClock, InMemoryDocumentStore, MockRng, RecordingTransport};

    use crate::state::AppState;

    /// State over in-memory ports with one stored scenario, `trio`.
    pub(crate) fn test_app_state() -> (AppState, Arc<RecordingTransport>) {
        let backend: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::with_documents([(
            "scenarios.json",
            r#"[{"name":"trio","roles":{"citizen":2,"mafia":1}}]"#,
        )]));
        let (writes, _task) = WriteBehind::spawn(backend.clone());
        let transport = Arc::new(RecordingTransport::new());
        let services = SessionServices::new(
            SessionDirectory::new(),
            transport.clone(),
            Arc::new(ProfileStore::new(backend, writes)),
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 19, 0, 0).unwrap())),
            Box::new(MockRng),
            GameConfig::default(),
        );
        (AppState::new(Arc::new(services)), transport)
    }
}
