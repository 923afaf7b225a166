//! Diagnostic log endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::api::error::ApiResult;
use crate::state::SharedState;

/// Creates the log router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(get_log).delete(clear_log))
}

/// Diagnostic log contents, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "entries": [
        "2025-01-15 08:00:00 Setup Wi-Fi monitoring: enabled",
        "2025-01-15 08:15:00 Wi-Fi has been disabled"
    ]
}))]
pub struct LogResponse {
    /// One line per entry.
    pub entries: Vec<String>,
}

/// Read the diagnostic log.
#[utoipa::path(
    get,
    path = "/api/log",
    tag = "log",
    operation_id = "getLog",
    summary = "Read the diagnostic log",
    description = "Returns the user-facing record of what the automation did.",
    responses(
        (status = 200, description = "Log contents", body = LogResponse),
        (status = 500, description = "Log file unreadable", body = super::error::ErrorResponse)
    )
)]
pub async fn get_log(State(state): State<SharedState>) -> ApiResult<Json<LogResponse>> {
    let content = state.event_log.read_all()?;
    Ok(Json(LogResponse {
        entries: content.lines().map(str::to_string).collect(),
    }))
}

/// Empty the diagnostic log.
#[utoipa::path(
    delete,
    path = "/api/log",
    tag = "log",
    operation_id = "clearLog",
    summary = "Empty the diagnostic log",
    responses(
        (status = 204, description = "Log emptied"),
        (status = 500, description = "Log file could not be truncated", body = super::error::ErrorResponse)
    )
)]
pub async fn clear_log(State(state): State<SharedState>) -> ApiResult<StatusCode> {
    state.event_log.reset()?;
    info!(path = %state.event_log.path().display(), "Diagnostic log cleared");
    Ok(StatusCode::NO_CONTENT)
}
