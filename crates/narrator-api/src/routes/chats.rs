//! Routes for chat sessions: inbound intents and the operator commands.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use narrator_core::event::DomainEvent;
use narrator_core::ids::{Actor, ChatId, SeatNo, UserId};
use narrator_session::application::query_handlers::{self, SessionView};
use narrator_session::application::command_handlers;
use narrator_session::domain::commands::{
    self, Intent,
};
use narrator_session::domain::events::SessionEvent;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /{chat_id}/intents.
#[derive(Debug, Deserialize)]
pub struct IntentRequest {
    /// Who sent the intent.
    pub actor: Actor,
    /// The choice or text.
    pub intent: Intent,
}

/// Request body for POST /{chat_id}/session.
#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    /// Seat count.
    pub seats: u32,
    /// Stored scenario to preselect.
    #[serde(default)]
    pub scenario: Option<String>,
    /// Group label for the roster header.
    #[serde(default)]
    pub title: Option<String>,
}

/// Request body for POST /{chat_id}/narrator.
#[derive(Debug, Deserialize)]
pub struct TransferNarratorRequest {
    /// Who asks.
    pub requested_by: Actor,
    /// The new narrator.
    pub to: Actor,
}

/// Request body for POST /{chat_id}/seats.
#[derive(Debug, Deserialize)]
pub struct AssignSeatRequest {
    /// Who asks; must narrate.
    pub requested_by: Actor,
    /// Seat to fill.
    pub seat: SeatNo,
    /// Identity to seat.
    pub user_id: UserId,
    /// Display name; prompted for when absent.
    #[serde(default)]
    pub name: Option<String>,
}

/// Response body returned after a command is successfully handled.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// IDs of the domain events produced.
    pub event_ids: Vec<Uuid>,
    /// Their types, in order.
    pub event_types: Vec<&'static str>,
}

impl CommandResponse {
    fn of(events: &[SessionEvent]) -> Json<Self> {
        Json(Self {
            event_ids: events.iter().map(|e| e.metadata.event_id).collect(),
            event_types: events.iter().map(|e| e.event_type()).collect(),
        })
    }
}

/// POST /{chat_id}/intents
#[instrument(skip(state, request), fields(user_id = %request.actor.user_id))]
async fn handle_intent(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Json(request): Json<IntentRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::HandleIntent {
        correlation_id: Uuid::new_v4(),
        chat_id: ChatId(chat_id),
        actor: request.actor,
        intent: request.intent,
    };

    info!(correlation_id = %command.correlation_id, "handling intent");

    let events = command_handlers::handle_intent(&state.services, &command).await?;
    Ok(CommandResponse::of(&events))
}

/// POST /{chat_id}/session
#[instrument(skip(state, request), fields(seats = request.seats))]
async fn open_session(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Json(request): Json<OpenSessionRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::OpenSession {
        correlation_id: Uuid::new_v4(),
        chat_id: ChatId(chat_id),
        seats: request.seats,
        scenario: request.scenario,
        title: request.title,
    };

    info!(correlation_id = %command.correlation_id, "handling open_session command");

    let events = command_handlers::handle_open_session(&state.services, &command).await?;
    Ok(CommandResponse::of(&events))
}

/// POST /{chat_id}/reset
#[instrument(skip(state))]
async fn reset_session(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::ResetSession {
        correlation_id: Uuid::new_v4(),
        chat_id: ChatId(chat_id),
    };

    info!(correlation_id = %command.correlation_id, "handling reset_session command");

    let events = command_handlers::handle_reset_session(&state.services, &command).await?;
    Ok(CommandResponse::of(&events))
}

/// POST /{chat_id}/narrator
#[instrument(skip(state, request), fields(to = %request.to.user_id))]
async fn transfer_narrator(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Json(request): Json<TransferNarratorRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::TransferNarrator {
        correlation_id: Uuid::new_v4(),
        chat_id: ChatId(chat_id),
        requested_by: request.requested_by,
        to: request.to,
    };

    info!(correlation_id = %command.correlation_id, "handling transfer_narrator command");

    let events = command_handlers::handle_transfer_narrator(&state.services, &command).await?;
    Ok(CommandResponse::of(&events))
}

/// POST /{chat_id}/seats
#[instrument(skip(state, request), fields(seat = request.seat))]
async fn assign_seat(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Json(request): Json<AssignSeatRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::AssignSeat {
        correlation_id: Uuid::new_v4(),
        chat_id: ChatId(chat_id),
        requested_by: request.requested_by,
        seat: request.seat,
        user_id: request.user_id,
        name: request.name,
    };

    info!(correlation_id = %command.correlation_id, "handling assign_seat command");

    let events = command_handlers::handle_assign_seat(&state.services, &command).await?;
    Ok(CommandResponse::of(&events))
}

/// GET /{chat_id}/session
#[instrument(skip(state))]
async fn get_session(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
) -> Result<Json<SessionView>, ApiError> {
    let view = query_handlers::get_session(&state.services, ChatId(chat_id)).await?;
    Ok(Json(view))
}

/// GET /
async fn list_sessions(State(state): State<AppState>) -> (StatusCode, Json<Vec<ChatId>>) {
    (StatusCode::OK, Json(query_handlers::list_sessions(&state.services)))
}

/// Returns the router for chat sessions.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sessions))
        .route("/{chat_id}/intents", post(handle_intent))
        .route("/{chat_id}/session", post(open_session).get(get_session))
        .route("/{chat_id}/reset", post(reset_session))
        .route("/{chat_id}/narrator", post(transfer_narrator))
        .route("/{chat_id}/seats", post(assign_seat))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::routes::test_support::test_app_state;

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(serde_json::to_vec(&b).unwrap())))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_open_session_returns_events() {
        // Arrange
        let (state, _transport) = test_app_state();
        let app = router().with_state(state);

        // Act
        let (status, json) = send(
            app,
            "POST",
            "/-100/session",
            Some(json!({ "seats": 5, "title": "Club" })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["event_types"][0], "session.opened");
        Uuid::parse_str(json["event_ids"][0].as_str().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_open_session_with_too_many_seats_returns_400() {
        let (state, _transport) = test_app_state();
        let app = router().with_state(state);

        let (status, json) = send(app, "POST", "/-100/session", Some(json!({ "seats": 99 }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_intent_from_non_narrator_returns_403() {
        // Arrange
        let (state, _transport) = test_app_state();
        send(
            router().with_state(state.clone()),
            "POST",
            "/-100/session",
            Some(json!({ "seats": 5 })),
        )
        .await;

        // Act
        let (status, json) = send(
            router().with_state(state),
            "POST",
            "/-100/intents",
            Some(json!({
                "actor": { "user_id": 7, "full_name": "Ana" },
                "intent": { "kind": "choice", "callback_id": "cb", "choice_id": "game:end" }
            })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_take_seat_intent_then_read_session() {
        // Arrange
        let (state, _transport) = test_app_state();
        send(
            router().with_state(state.clone()),
            "POST",
            "/-100/session",
            Some(json!({ "seats": 5 })),
        )
        .await;

        // Act
        let (status, json) = send(
            router().with_state(state.clone()),
            "POST",
            "/-100/intents",
            Some(json!({
                "actor": { "user_id": 7, "full_name": "Ana" },
                "intent": { "kind": "choice", "callback_id": "cb", "choice_id": "seat:take:2" }
            })),
        )
        .await;
        let (view_status, view) = send(router().with_state(state), "GET", "/-100/session", None).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["event_types"][0], "session.seat_taken");
        assert_eq!(view_status, StatusCode::OK);
        assert_eq!(view["phase"], "seating");
        assert_eq!(view["seats"][1]["name"], "Ana");
    }

    #[tokio::test]
    async fn test_get_unknown_session_returns_404() {
        let (state, _transport) = test_app_state();
        let app = router().with_state(state);

        let (status, json) = send(app, "GET", "/-5/session", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "not_found");
    }

    #[tokio::test]
    async fn test_intent_with_missing_body_returns_422() {
        let (state, _transport) = test_app_state();
        let app = router().with_state(state);

        let (status, _) = send(app, "POST", "/-100/intents", Some(json!({}))).await;

        // Axum returns 422 for deserialization failures.
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
