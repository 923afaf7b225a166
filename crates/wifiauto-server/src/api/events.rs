//! Event injection endpoints.
//!
//! These are how the outside world drives the engine: the service manager
//! reports startup, an operator forces an idle check, and the external
//! location provider pushes fixes and region notifications.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;
use wifiauto_core::dispatcher::{BootReport, Event, EventOutcome, EventSender};
use wifiauto_core::types::GeofenceEvent;
use wifiauto_core::{FixOutcome, MonitorOutcome, TriggerOutcome};

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the events router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/boot", post(boot))
        .route("/tick", post(tick))
        .route("/location", post(location_fix))
        .route("/geofence", post(geofence_triggered))
}

// ============================================================================
// Request Types
// ============================================================================

/// A location fix from the provider.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "latitude": 48.8, "longitude": 2.3 }))]
pub struct LocationFixRequest {
    /// Latitude in degrees.
    #[schema(example = 48.8)]
    pub latitude: f64,

    /// Longitude in degrees.
    #[schema(example = 2.3)]
    pub longitude: f64,
}

/// Submit `event` through `sender` and wait for its outcome.
pub(crate) async fn dispatch(sender: &EventSender, event: Event) -> ApiResult<EventOutcome> {
    debug!(event = event.name(), "Submitting event");
    Ok(sender.request(event).await?)
}

// ============================================================================
// Handlers
// ============================================================================

/// Run startup work.
#[utoipa::path(
    post,
    path = "/api/events/boot",
    tag = "events",
    operation_id = "boot",
    summary = "Run startup work",
    description = "Re-arms the idle check if monitoring is on and re-registers the \
        persisted region if geofencing is on. The daemon does this once on start; \
        calling it again is harmless.",
    responses(
        (status = 200, description = "Startup work finished", body = BootReport),
        (status = 503, description = "Scheduler or dispatcher unavailable", body = super::error::ErrorResponse)
    )
)]
pub async fn boot(State(state): State<SharedState>) -> ApiResult<Json<BootReport>> {
    match dispatch(&state.events, Event::Boot).await? {
        EventOutcome::Booted(report) => Ok(Json(report)),
        other => Err(ApiError::unexpected_outcome(&other)),
    }
}

/// Run the idle check now.
#[utoipa::path(
    post,
    path = "/api/events/tick",
    tag = "events",
    operation_id = "tick",
    summary = "Run the idle check now",
    description = "Runs one idle check outside the schedule. Switches the radio \
        off when it is on, not carrying a connection, and no grace window is open.",
    responses(
        (status = 200, description = "Idle check finished", body = MonitorOutcome)
    )
)]
pub async fn tick(State(state): State<SharedState>) -> ApiResult<Json<MonitorOutcome>> {
    match dispatch(&state.events, Event::PeriodicTick).await? {
        EventOutcome::Monitor(outcome) => Ok(Json(outcome)),
        other => Err(ApiError::unexpected_outcome(&other)),
    }
}

/// Deliver a location fix.
#[utoipa::path(
    post,
    path = "/api/events/location",
    tag = "events",
    operation_id = "pushLocationFix",
    summary = "Deliver a location fix",
    description = "Accepted only while a location subscription is live (see \
        `GET /api/location`). The fix becomes the center of the trusted region.",
    request_body = LocationFixRequest,
    responses(
        (status = 200, description = "Fix handled", body = FixOutcome),
        (status = 409, description = "No live location subscription", body = super::error::ErrorResponse)
    )
)]
pub async fn location_fix(
    State(state): State<SharedState>,
    Json(request): Json<LocationFixRequest>,
) -> ApiResult<Json<FixOutcome>> {
    let Some(target) = state.location.target() else {
        return Err(ApiError::Conflict {
            error_code: "no_location_subscription".to_string(),
            message: "No location subscription is active".to_string(),
        });
    };

    let event = Event::LocationFix {
        latitude: request.latitude,
        longitude: request.longitude,
    };
    match dispatch(&target, event).await? {
        EventOutcome::Fix(outcome) => Ok(Json(outcome)),
        other => Err(ApiError::unexpected_outcome(&other)),
    }
}

/// Deliver a region notification.
#[utoipa::path(
    post,
    path = "/api/events/geofence",
    tag = "events",
    operation_id = "pushGeofenceEvent",
    summary = "Deliver a region notification",
    description = "Reports a transition into the trusted region, or a geofencing \
        service error. Enter and dwell transitions switch the radio on while \
        geofencing is enabled.",
    request_body = GeofenceEvent,
    responses(
        (status = 200, description = "Notification handled", body = TriggerOutcome)
    )
)]
pub async fn geofence_triggered(
    State(state): State<SharedState>,
    Json(payload): Json<GeofenceEvent>,
) -> ApiResult<Json<TriggerOutcome>> {
    // Late notifications for an unregistered region still reach the engine,
    // which ignores them when geofencing is off.
    let target = state
        .geofence
        .target()
        .unwrap_or_else(|| state.events.clone());

    match dispatch(&target, Event::GeofenceTriggered(payload)).await? {
        EventOutcome::Trigger(outcome) => Ok(Json(outcome)),
        other => Err(ApiError::unexpected_outcome(&other)),
    }
}
