//! The two automation switches.

use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use wifiauto_core::dispatcher::{Event, EventOutcome};
use wifiauto_core::Settings;

use crate::api::error::{ApiError, ApiResult};
use crate::api::events::dispatch;
use crate::state::SharedState;

/// Creates the settings router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_settings))
        .route("/monitoring", put(update_monitoring))
        .route("/geofencing", put(update_geofencing))
}

/// New position of a switch.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "enabled": true }))]
pub struct UpdateSwitchRequest {
    /// Whether the feature should be on.
    #[schema(example = true)]
    pub enabled: bool,
}

async fn apply(state: &SharedState, event: Event) -> ApiResult<Json<Settings>> {
    match dispatch(&state.events, event).await? {
        EventOutcome::Settings(settings) => Ok(Json(settings)),
        other => Err(ApiError::unexpected_outcome(&other)),
    }
}

/// Get both switches.
#[utoipa::path(
    get,
    path = "/api/settings",
    tag = "settings",
    operation_id = "getSettings",
    summary = "Get the automation switches",
    responses(
        (status = 200, description = "Current switches", body = Settings)
    )
)]
pub async fn get_settings(State(state): State<SharedState>) -> Json<Settings> {
    Json(state.engine.controller().settings())
}

/// Switch idle monitoring on or off.
#[utoipa::path(
    put,
    path = "/api/settings/monitoring",
    tag = "settings",
    operation_id = "updateMonitoring",
    summary = "Switch idle monitoring",
    description = "Enabling schedules the recurring idle check, which switches the \
        radio off whenever it is on without a connection. Disabling cancels it.",
    request_body = UpdateSwitchRequest,
    responses(
        (status = 200, description = "Switch updated", body = Settings),
        (status = 503, description = "The scheduler refused the request", body = super::error::ErrorResponse)
    )
)]
pub async fn update_monitoring(
    State(state): State<SharedState>,
    Json(request): Json<UpdateSwitchRequest>,
) -> ApiResult<Json<Settings>> {
    apply(
        &state,
        Event::SetMonitoring {
            enabled: request.enabled,
        },
    )
    .await
}

/// Switch location-based enabling on or off.
#[utoipa::path(
    put,
    path = "/api/settings/geofencing",
    tag = "settings",
    operation_id = "updateGeofencing",
    summary = "Switch geofencing",
    description = "Enabling requests one location fix and registers the trusted \
        region around it. Without the location permission, or when location \
        settings cannot be satisfied, the switch is turned back off and an error \
        is returned. Disabling removes the region.",
    request_body = UpdateSwitchRequest,
    responses(
        (status = 200, description = "Switch updated", body = Settings),
        (status = 403, description = "Location permission not granted", body = super::error::ErrorResponse),
        (status = 503, description = "Location settings cannot be satisfied", body = super::error::ErrorResponse)
    )
)]
pub async fn update_geofencing(
    State(state): State<SharedState>,
    Json(request): Json<UpdateSwitchRequest>,
) -> ApiResult<Json<Settings>> {
    apply(
        &state,
        Event::SetGeofencing {
            enabled: request.enabled,
        },
    )
    .await
}
