//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use narrator_core::clock::Clock;
use narrator_core::documents::DocumentStore;
use narrator_session::GameConfig;
use narrator_session::application::directory::SessionDirectory;
use narrator_session::application::services::SessionServices;
use narrator_store::{ProfileStore, WriteBehind};
use narrator_test_support::{FixedClock, InMemoryDocumentStore, MockRng, RecordingTransport};
use tower::ServiceExt;

use narrator_api::state::AppState;

/// Scenario catalogue seeded into every test app.
pub const SCENARIOS: &str = r#"[
    {"name":"trio","roles":{"citizen":2,"mafia":1}},
    {"name":"quintet","roles":{"citizen":3,"doctor":1,"mafia":1}}
]"#;

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 3, 1, 19, 0, 0).unwrap(),
    ))
}

/// App state plus the recording transport behind it. Build a fresh router
/// per request with [`TestApp::router`]; the state is shared.
pub struct TestApp {
    pub state: AppState,
    pub transport: Arc<RecordingTransport>,
    pub documents: Arc<InMemoryDocumentStore>,
}

impl TestApp {
    /// Same route structure as `main.rs`.
    pub fn router(&self) -> Router {
        narrator_api::build_router(self.state.clone())
    }
}

/// Builds the app over in-memory ports seeded with [`SCENARIOS`].
pub fn build_test_app() -> TestApp {
    build_test_app_with(vec![("scenarios.json", SCENARIOS)])
}

/// Builds the app over in-memory ports seeded with `documents`.
pub fn build_test_app_with(documents: Vec<(&str, &str)>) -> TestApp {
    let documents = Arc::new(InMemoryDocumentStore::with_documents(documents));
    let backend: Arc<dyn DocumentStore> = documents.clone();
    let (writes, _task) = WriteBehind::spawn(backend.clone());
    let transport = Arc::new(RecordingTransport::new());
    let services = SessionServices::new(
        SessionDirectory::new(),
        transport.clone(),
        Arc::new(ProfileStore::new(backend, writes)),
        fixed_clock(),
        Box::new(MockRng),
        GameConfig::default(),
    );
    TestApp {
        state: AppState::new(Arc::new(services)),
        transport,
        documents,
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Send a DELETE request and return the status.
pub async fn delete(app: Router, uri: &str) -> StatusCode {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await.0
}

/// Body of a choice tap by `user_id`.
pub fn tap(user_id: i64, name: &str, choice_id: &str) -> serde_json::Value {
    serde_json::json!({
        "actor": { "user_id": user_id, "full_name": name },
        "intent": { "kind": "choice", "callback_id": format!("cb-{user_id}"), "choice_id": choice_id }
    })
}

/// Body of a text message by `user_id`.
pub fn say(user_id: i64, name: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "actor": { "user_id": user_id, "full_name": name },
        "intent": { "kind": "text", "text": text }
    })
}
