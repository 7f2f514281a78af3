//! Narrator — HTTP surface and platform transport.
//!
//! Inbound intents and operator commands arrive as JSON; outbound messages
//! go to the chat platform through [`http_transport::HttpTransport`].

use axum::Router;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod http_transport;
pub mod routes;
pub mod state;

/// Builds the full application router over `state`.
pub fn build_router(state: state::AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/chats", routes::chats::router())
        .nest("/api/v1/scenarios", routes::scenarios::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
