//! Shared domain types and OpenAPI schemas.
//!
//! These types cross the boundary between the engine and its platform
//! collaborators, and are also exposed verbatim by the HTTP API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Result, WifiAutoError};

/// Request id under which the single geofence is registered.
pub const GEOFENCE_REQUEST_ID: &str = "wifiauto";

/// Radius of the trusted area around the last known location.
pub const DEFAULT_RADIUS_METERS: f64 = 100.0;

/// Time the device must remain inside the region before a dwell trigger fires.
pub const DEFAULT_DWELL_DELAY_MILLIS: u32 = 120_000;

// ============================================================================
// Coordinates
// ============================================================================

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "latitude": 48.8, "longitude": 2.3 }))]
pub struct Coordinates {
    /// Latitude in degrees, -90 to 90.
    #[schema(example = 48.8)]
    pub latitude: f64,

    /// Longitude in degrees, -180 to 180.
    #[schema(example = 2.3)]
    pub longitude: f64,
}

impl Coordinates {
    /// Build coordinates, rejecting non-finite or out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`WifiAutoError::InvalidCoordinates`] when either component is
    /// NaN, infinite, or outside its valid range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if valid {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(WifiAutoError::InvalidCoordinates {
                latitude,
                longitude,
            })
        }
    }
}

// ============================================================================
// Geofence region
// ============================================================================

/// Transitions a region notifies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// The device crossed into the region.
    Enter,
    /// The device stayed inside the region for the dwell delay.
    Dwell,
    /// The device left the region.
    Exit,
}

/// Region size and trigger timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct RegionSettings {
    /// Circle radius in meters.
    pub radius_meters: f64,
    /// Loitering delay before a dwell notification, in milliseconds.
    pub dwell_delay_millis: u32,
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            radius_meters: DEFAULT_RADIUS_METERS,
            dwell_delay_millis: DEFAULT_DWELL_DELAY_MILLIS,
        }
    }
}

/// The circular trusted area registered with the geofencing service.
///
/// At most one region exists at a time; registering a new one replaces the
/// previous registration under the same [`GEOFENCE_REQUEST_ID`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "wifiauto",
    "center": { "latitude": 48.8, "longitude": 2.3 },
    "radius_meters": 100.0,
    "dwell_delay_millis": 120000,
    "transitions": ["enter", "dwell"],
    "initial_trigger": "dwell",
    "expires": false
}))]
pub struct GeofenceRegion {
    /// Stable request id.
    pub id: String,
    /// Region center.
    pub center: Coordinates,
    /// Radius in meters.
    pub radius_meters: f64,
    /// Dwell delay in milliseconds.
    pub dwell_delay_millis: u32,
    /// Transitions that produce notifications.
    pub transitions: Vec<Transition>,
    /// Transition reported when the device is already inside at registration.
    pub initial_trigger: Transition,
    /// Whether the region expires. Always `false`.
    pub expires: bool,
}

impl GeofenceRegion {
    /// Build the region centered on `center` with the given settings.
    #[must_use]
    pub fn around(center: Coordinates, settings: RegionSettings) -> Self {
        Self {
            id: GEOFENCE_REQUEST_ID.to_string(),
            center,
            radius_meters: settings.radius_meters,
            dwell_delay_millis: settings.dwell_delay_millis,
            transitions: vec![Transition::Enter, Transition::Dwell],
            initial_trigger: Transition::Dwell,
            expires: false,
        }
    }
}

// ============================================================================
// Geofence notifications
// ============================================================================

/// Payload delivered by the geofencing service when a region triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error_code": null,
    "transition": "dwell",
    "region_ids": ["wifiauto"],
    "location": { "latitude": 48.8001, "longitude": 2.3002 }
}))]
pub struct GeofenceEvent {
    /// Service status code when the event reports a failure instead of a
    /// transition (1000 = geofencing not available).
    #[serde(default)]
    pub error_code: Option<i32>,

    /// The transition that fired.
    #[serde(default)]
    pub transition: Option<Transition>,

    /// Ids of the regions that triggered.
    #[serde(default)]
    pub region_ids: Vec<String>,

    /// Position that caused the trigger, when known.
    #[serde(default)]
    pub location: Option<Coordinates>,
}

impl GeofenceEvent {
    /// An event reporting a transition into the registered region.
    #[must_use]
    pub fn transition(transition: Transition) -> Self {
        Self {
            error_code: None,
            transition: Some(transition),
            region_ids: vec![GEOFENCE_REQUEST_ID.to_string()],
            location: None,
        }
    }

    /// An event carrying an error code instead of a transition.
    #[must_use]
    pub const fn error(code: i32) -> Self {
        Self {
            error_code: Some(code),
            transition: None,
            region_ids: Vec::new(),
            location: None,
        }
    }

    /// Whether the event reports a failure.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.error_code.is_some()
    }
}

/// Human-readable name for a geofencing status code.
#[must_use]
pub const fn geofence_status_name(code: i32) -> &'static str {
    match code {
        1000 => "GEOFENCE_NOT_AVAILABLE",
        1001 => "GEOFENCE_TOO_MANY_GEOFENCES",
        1002 => "GEOFENCE_TOO_MANY_PENDING_INTENTS",
        13 => "ERROR",
        8 => "INTERNAL_ERROR",
        _ => "UNKNOWN",
    }
}

// ============================================================================
// Location request profile
// ============================================================================

/// Power/accuracy trade-off requested from the location provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LocationPriority {
    /// Best available accuracy.
    HighAccuracy,
    /// City-block accuracy at moderate power.
    BalancedPowerAccuracy,
    /// Coarse accuracy.
    LowPower,
    /// Only piggy-back on other apps' requests.
    Passive,
}

/// Parameters of a location subscription. These are hints to the provider,
/// not guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LocationProfile {
    /// Requested accuracy class.
    pub priority: LocationPriority,
    /// Nominal update interval in milliseconds.
    pub interval_millis: u64,
    /// Fastest accepted update interval in milliseconds.
    pub fastest_interval_millis: u64,
    /// The subscription self-expires after this many milliseconds.
    pub expiration_millis: u64,
}

impl Default for LocationProfile {
    fn default() -> Self {
        Self {
            priority: LocationPriority::BalancedPowerAccuracy,
            interval_millis: 4_000,
            fastest_interval_millis: 1_000,
            expiration_millis: 30_000,
        }
    }
}
