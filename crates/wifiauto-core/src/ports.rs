//! Collaborator traits: the boundary between the automation engine and the
//! platform it runs on.
//!
//! ```text
//!   Platform adapter ──▶ port trait ──▶ engine components
//! ```
//!
//! Every call into a port is potentially slow and may fail. Components catch
//! [`PortError`]s at their own boundary and turn them into a log entry plus a
//! well-defined no-op; nothing here is allowed to take down the dispatcher.
//!
//! Results that the platform produces later (location fixes, geofence
//! notifications, scheduled job runs) come back as [`Event`](crate::dispatcher::Event)s
//! through the [`EventSender`] handed to the service.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::dispatcher::EventSender;
use crate::types::{GeofenceRegion, LocationProfile};

/// Result type returned by every port call.
pub type PortResult<T> = std::result::Result<T, PortError>;

/// Failure reported by a platform collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortError {
    /// The service is switched off or not reachable.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The platform refused the call for lack of permission.
    #[error("permission denied")]
    PermissionDenied,

    /// The service understood the request and rejected it.
    #[error("request rejected (code {code}): {reason}")]
    Rejected {
        /// Service-specific status code.
        code: i32,
        /// Human-readable reason.
        reason: String,
    },

    /// Any other failure.
    #[error("{0}")]
    Failed(String),
}

// ───────────────────────────────────────────────────────────────
// Radio
// ───────────────────────────────────────────────────────────────

/// Transport carrying the active network connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// The Wi-Fi radio this engine controls.
    Wifi,
    /// Mobile data.
    Cellular,
    /// Wired network.
    Ethernet,
    /// VPN, bridge, loopback or anything else.
    Other,
    /// No active connection.
    None,
}

/// Association state of the radio's link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssociationState {
    /// Fully associated and authenticated.
    Completed,
    /// Association or authentication is in progress.
    Associating,
    /// Scanning for networks.
    Scanning,
    /// Not associated with any network.
    Disconnected,
    /// State could not be determined.
    Unknown,
}

/// Snapshot of the device's current network attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "transport": "wifi",
    "association": "completed",
    "network": "HomeNetwork"
}))]
pub struct Attachment {
    /// Transport of the active connection.
    pub transport: Transport,
    /// Association state of the radio.
    pub association: AssociationState,
    /// Name of the network the radio is attached to, if any.
    pub network: Option<String>,
}

impl Attachment {
    /// No connection at all.
    #[must_use]
    pub const fn detached() -> Self {
        Self {
            transport: Transport::None,
            association: AssociationState::Disconnected,
            network: None,
        }
    }

    /// Whether the active connection is the radio's own network in the
    /// associated state. Merely associating does not count.
    #[must_use]
    pub fn is_connected_via_radio(&self) -> bool {
        self.transport == Transport::Wifi
            && self.network.is_some()
            && self.association == AssociationState::Completed
    }
}

/// Query and toggle the wireless radio.
///
/// There is no compare-and-set: setting the radio to the state it is already
/// in must be harmless.
pub trait RadioControl: Send + Sync {
    /// Whether the radio is powered on.
    fn is_enabled(&self) -> PortResult<bool>;

    /// Power the radio on or off.
    fn set_enabled(&self, enabled: bool) -> PortResult<()>;

    /// Current network attachment.
    fn current_attachment(&self) -> PortResult<Attachment>;
}

// ───────────────────────────────────────────────────────────────
// Job scheduling
// ───────────────────────────────────────────────────────────────

/// Recurring and one-shot jobs keyed by a stable tag.
///
/// Delivery is at-least-once and may be delayed or batched. When a job fires
/// the scheduler emits [`Event::JobFired`](crate::dispatcher::Event::JobFired).
pub trait JobScheduler: Send + Sync {
    /// Run the job tagged `tag` every `interval`, replacing any schedule with
    /// the same tag.
    fn schedule_recurring(&self, tag: &str, interval: Duration) -> PortResult<()>;

    /// Run the job tagged `tag` once, as soon as the platform allows.
    fn schedule_once(&self, tag: &str) -> PortResult<()>;

    /// Cancel future runs of `tag`. Cancelling an unknown tag is not an error.
    fn cancel(&self, tag: &str) -> PortResult<()>;

    /// Report that the current run of `tag` has finished, so the next one can
    /// be planned.
    fn complete(&self, tag: &str);
}

// ───────────────────────────────────────────────────────────────
// Location & geofencing
// ───────────────────────────────────────────────────────────────

/// Stream of location fixes from an external provider.
pub trait LocationService: Send + Sync {
    /// Check that the device's location settings can satisfy `profile`.
    /// [`PortError::Unavailable`] means nothing can be done about it.
    fn check_settings(&self, profile: &LocationProfile) -> PortResult<()>;

    /// Start delivering fixes to `target` as
    /// [`Event::LocationFix`](crate::dispatcher::Event::LocationFix).
    fn subscribe(&self, profile: &LocationProfile, target: EventSender) -> PortResult<()>;

    /// Stop delivering fixes.
    fn unsubscribe(&self) -> PortResult<()>;
}

/// Region-containment detection delegated to the platform.
pub trait GeofenceService: Send + Sync {
    /// Register `region`, replacing any region with the same id. Triggers are
    /// delivered to `target` as
    /// [`Event::GeofenceTriggered`](crate::dispatcher::Event::GeofenceTriggered).
    fn register(&self, region: &GeofenceRegion, target: EventSender) -> PortResult<()>;

    /// Remove the region registered under `region_id`.
    fn unregister(&self, region_id: &str) -> PortResult<()>;
}

// ───────────────────────────────────────────────────────────────
// Permissions, diagnostics, indicator, clock
// ───────────────────────────────────────────────────────────────

/// Platform capabilities the engine may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Precise device location.
    FineLocation,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FineLocation => write!(f, "fine location"),
        }
    }
}

/// Capability checks.
pub trait PermissionQuery: Send + Sync {
    /// Whether `capability` is currently granted.
    fn is_granted(&self, capability: Capability) -> bool;
}

/// User-facing diagnostic log.
///
/// Appending is fire-and-forget: implementations swallow their own failures.
pub trait DiagnosticLog: Send + Sync {
    /// Append a timestamped entry.
    fn append(&self, message: &str);
}

/// The long-running "monitoring is active" indicator.
pub trait KeepAliveIndicator: Send + Sync {
    /// Show the indicator (idempotent).
    fn show(&self);

    /// Hide the indicator (idempotent).
    fn hide(&self);
}

/// Wall clock.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
