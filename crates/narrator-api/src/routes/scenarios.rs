//! Routes for the scenario catalogue.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{
    Json, Router,
    routing::{delete, get},
};
use narrator_roles::Scenario;
use narrator_session::application::{command_handlers, query_handlers};
use narrator_session::domain::commands::{AddScenario, RemoveScenario};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct AddScenarioRequest {
    /// Scenario name; replaces a stored scenario of the same name.
    pub name: String,
    /// Role label to count.
    pub roles: BTreeMap<String, u32>,
}

/// GET /
async fn list_scenarios(State(state): State<AppState>) -> Json<Vec<Scenario>> {
    Json(query_handlers::list_scenarios(&state.services).await)
}

/// POST /
#[instrument(skip(state, request), fields(name = %request.name))]
async fn add_scenario(
    State(state): State<AppState>,
    Json(request): Json<AddScenarioRequest>,
) -> Result<(StatusCode, Json<Scenario>), ApiError> {
    let command = AddScenario {
        correlation_id: Uuid::new_v4(),
        name: request.name,
        roles: request.roles,
    };

    info!(correlation_id = %command.correlation_id, "handling add_scenario command");

    let scenario = command_handlers::handle_add_scenario(&state.services, &command).await?;
    Ok((StatusCode::CREATED, Json(scenario)))
}

/// DELETE /{name}
#[instrument(skip(state))]
async fn remove_scenario(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let command = RemoveScenario {
        correlation_id: Uuid::new_v4(),
        name,
    };

    info!(correlation_id = %command.correlation_id, "handling remove_scenario command");

    command_handlers::handle_remove_scenario(&state.services, &command).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the router for the scenario catalogue.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_scenarios).post(add_scenario))
        .route("/{name}", delete(remove_scenario))
}
