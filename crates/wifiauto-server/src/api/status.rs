//! Engine status endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use wifiauto_core::EngineStatus;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the status router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(get_status))
}

/// Daemon and engine status.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusResponse {
    /// Server version.
    #[schema(example = "0.1.0")]
    pub version: String,

    /// When the daemon started.
    pub started_at: DateTime<Utc>,

    /// Seconds since startup.
    #[schema(example = 3600)]
    pub uptime_secs: u64,

    /// Whether the monitoring indicator is showing.
    #[schema(example = true)]
    pub indicator_shown: bool,

    /// Switches, radio, grace window and region.
    pub engine: EngineStatus,
}

/// Get daemon status.
#[utoipa::path(
    get,
    path = "/api/status",
    tag = "system",
    operation_id = "getStatus",
    summary = "Get daemon status",
    description = "Returns the switches, the radio power and attachment state, the \
        grace window and the registered region. Radio fields are null when the \
        radio could not be queried.",
    responses(
        (status = 200, description = "Status retrieved", body = StatusResponse)
    )
)]
pub async fn get_status(State(state): State<SharedState>) -> ApiResult<Json<StatusResponse>> {
    // Querying the radio shells out.
    let engine = state.engine.clone();
    let status = tokio::task::spawn_blocking(move || engine.status())
        .await
        .map_err(|e| ApiError::InternalError {
            error_code: "status_failed".to_string(),
            message: "Failed to collect status".to_string(),
            details: Some(e.to_string()),
        })?;

    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        started_at: state.started_at,
        uptime_secs: state.uptime_secs(),
        indicator_shown: state.indicator.is_shown(),
        engine: status,
    }))
}
