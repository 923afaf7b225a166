//! What the external location provider polls: the region to watch and
//! whether a fix is wanted.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use wifiauto_core::types::{GeofenceRegion, LocationProfile};

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the geofence router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(get_region))
}

/// Creates the location subscription router.
pub fn location_router() -> Router<SharedState> {
    Router::new().route("/", get(get_location_subscription))
}

/// The live location subscription, if any.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "active": true,
    "profile": {
        "priority": "balanced_power_accuracy",
        "interval_millis": 4000,
        "fastest_interval_millis": 1000,
        "expiration_millis": 30000
    }
}))]
pub struct LocationSubscriptionResponse {
    /// Whether fixes are currently accepted.
    #[schema(example = true)]
    pub active: bool,

    /// Requested accuracy and cadence.
    pub profile: Option<LocationProfile>,
}

/// Get the registered region.
#[utoipa::path(
    get,
    path = "/api/geofence",
    tag = "provider",
    operation_id = "getGeofence",
    summary = "Get the registered region",
    description = "Returns the circular region the provider should watch. Enter and \
        dwell transitions are reported to `POST /api/events/geofence`.",
    responses(
        (status = 200, description = "Region registered", body = GeofenceRegion),
        (status = 404, description = "No region registered", body = super::error::ErrorResponse)
    )
)]
pub async fn get_region(State(state): State<SharedState>) -> ApiResult<Json<GeofenceRegion>> {
    state
        .geofence
        .region()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound {
            error_code: "no_region".to_string(),
            message: "No geofence region is registered".to_string(),
        })
}

/// Get the location subscription.
#[utoipa::path(
    get,
    path = "/api/location",
    tag = "provider",
    operation_id = "getLocationSubscription",
    summary = "Get the location subscription",
    description = "Tells the provider whether a fix is wanted. Fixes are posted to \
        `POST /api/events/location`; the subscription lapses after the profile's \
        expiration time.",
    responses(
        (status = 200, description = "Subscription state", body = LocationSubscriptionResponse)
    )
)]
pub async fn get_location_subscription(
    State(state): State<SharedState>,
) -> Json<LocationSubscriptionResponse> {
    let profile = state.location.active_profile();
    Json(LocationSubscriptionResponse {
        active: profile.is_some(),
        profile,
    })
}
