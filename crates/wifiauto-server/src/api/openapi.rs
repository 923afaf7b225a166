//! OpenAPI specification generation for the wifiauto API.
//!
//! The document is served at `/api/openapi.json`, rendered by Swagger UI at
//! `/swagger-ui`, and written to the workspace root by `gen-openapi` for
//! location provider client generation.

use axum::Json;
use utoipa::OpenApi;
use wifiauto_core::dispatcher::BootReport;
use wifiauto_core::ports::{AssociationState, Attachment, Transport};
use wifiauto_core::types::{
    Coordinates, GeofenceEvent, GeofenceRegion, LocationPriority, LocationProfile, Transition,
};
use wifiauto_core::{EngineStatus, FixOutcome, MonitorOutcome, Settings, TriggerOutcome};

use super::error::ErrorResponse;
use super::events::LocationFixRequest;
use super::geofence::LocationSubscriptionResponse;
use super::health::HealthResponse;
use super::log::LogResponse;
use super::settings::UpdateSwitchRequest;
use super::status::StatusResponse;

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// The OpenAPI specification as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for wifiauto.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "wifiauto API",
        version = "0.1.0",
        description = r#"
# wifiauto API

wifiauto switches the Wi-Fi radio off when it is not carrying a connection and
back on when the device arrives at a trusted place.

## Overview

1. **Idle monitoring**: every 15 minutes the radio is switched off if it is on
   but not associated with a network.
2. **Geofencing**: one location fix defines a circular trusted region; entering
   or dwelling in it switches the radio back on.
3. **Grace window**: after the radio is switched on by the region, idle checks
   are suspended for 15 minutes so the radio has time to associate.

## Location provider

Location does not come from this process. An external provider polls
`GET /api/location` and `GET /api/geofence`, and pushes fixes and region
transitions to `POST /api/events/location` and `POST /api/events/geofence`.
"#,
        license(name = "Apache-2.0", url = "https://www.apache.org/licenses/LICENSE-2.0")
    ),
    servers(
        (url = "/", description = "Local wifiauto daemon")
    ),
    tags(
        (name = "system", description = "Health checks and daemon status"),
        (name = "settings", description = "The monitoring and geofencing switches"),
        (name = "events", description = "Startup, forced idle checks, and provider callbacks"),
        (name = "provider", description = "What the external location provider should do"),
        (name = "log", description = "User-facing diagnostic log")
    ),
    paths(
        super::health::health_check,
        super::status::get_status,
        super::settings::get_settings,
        super::settings::update_monitoring,
        super::settings::update_geofencing,
        super::events::boot,
        super::events::tick,
        super::events::location_fix,
        super::events::geofence_triggered,
        super::geofence::get_region,
        super::geofence::get_location_subscription,
        super::log::get_log,
        super::log::clear_log,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            StatusResponse,
            EngineStatus,
            Settings,
            UpdateSwitchRequest,
            BootReport,
            MonitorOutcome,
            TriggerOutcome,
            FixOutcome,
            LocationFixRequest,
            GeofenceEvent,
            GeofenceRegion,
            Coordinates,
            Transition,
            LocationProfile,
            LocationPriority,
            LocationSubscriptionResponse,
            Attachment,
            Transport,
            AssociationState,
            LogResponse,
        )
    )
)]
pub struct ApiDoc;
