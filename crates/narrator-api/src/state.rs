//! Shared application state.

use std::sync::Arc;

use narrator_session::application::services::SessionServices;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Session directory, ports and game knobs.
    pub services: Arc<SessionServices>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(services: Arc<SessionServices>) -> Self {
        Self { services }
    }
}
