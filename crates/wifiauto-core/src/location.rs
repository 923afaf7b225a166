//! Location acquisition.
//!
//! While active, the acquirer holds a subscription with the location service
//! and forwards every fix to [`GeofenceSetup`]. Several fixes per activation
//! are normal; each one re-registers the region and the last one wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::dispatcher::EventSender;
use crate::error::{Result, WifiAutoError};
use crate::geofence::GeofenceSetup;
use crate::ports::{Capability, DiagnosticLog, LocationService, PermissionQuery, PortError};
use crate::types::{GeofenceRegion, LocationProfile};

/// Tag the one-shot location job is scheduled under.
pub const LOCATION_TAG: &str = "wifiauto.location";

/// Result of forwarding one fix.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FixOutcome {
    /// A region was registered around the fix.
    Registered {
        /// The new region.
        region: GeofenceRegion,
    },
    /// Geofencing is switched off; the fix was dropped.
    Ignored,
    /// The region could not be registered. The next fix retries.
    Rejected {
        /// What went wrong.
        reason: String,
    },
}

/// Holds the location subscription.
pub struct LocationAcquirer {
    service: Arc<dyn LocationService>,
    permissions: Arc<dyn PermissionQuery>,
    geofence: Arc<GeofenceSetup>,
    log: Arc<dyn DiagnosticLog>,
    profile: LocationProfile,
    target: EventSender,
    active: AtomicBool,
}

impl LocationAcquirer {
    /// Wire the acquirer to its collaborators. Fixes are delivered to
    /// `target`.
    #[must_use]
    pub fn new(
        service: Arc<dyn LocationService>,
        permissions: Arc<dyn PermissionQuery>,
        geofence: Arc<GeofenceSetup>,
        log: Arc<dyn DiagnosticLog>,
        profile: LocationProfile,
        target: EventSender,
    ) -> Self {
        Self {
            service,
            permissions,
            geofence,
            log,
            profile,
            target,
            active: AtomicBool::new(false),
        }
    }

    /// The subscription profile.
    #[must_use]
    pub const fn profile(&self) -> &LocationProfile {
        &self.profile
    }

    /// Whether a subscription is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Check that location settings can satisfy the subscription profile.
    ///
    /// # Errors
    ///
    /// Returns [`WifiAutoError::GeofenceUnavailable`] if they cannot.
    pub fn check_settings(&self) -> Result<()> {
        self.service.check_settings(&self.profile).map_err(|e| {
            warn!(error = %e, "Location settings cannot be satisfied");
            WifiAutoError::GeofenceUnavailable(e.to_string())
        })
    }

    /// Start the subscription.
    ///
    /// # Errors
    ///
    /// - [`WifiAutoError::PermissionDenied`] without location permission; no
    ///   subscription is attempted
    /// - [`WifiAutoError::LocationUnavailable`] if the service refuses
    pub fn start(&self) -> Result<()> {
        if !self.permissions.is_granted(Capability::FineLocation) {
            warn!("Location permission not granted");
            return Err(WifiAutoError::PermissionDenied {
                capability: Capability::FineLocation,
            });
        }

        info!(priority = ?self.profile.priority, "Acquiring device location");
        self.service
            .subscribe(&self.profile, self.target.clone())
            .map_err(|e| match e {
                PortError::PermissionDenied => WifiAutoError::PermissionDenied {
                    capability: Capability::FineLocation,
                },
                other => WifiAutoError::LocationUnavailable(other.to_string()),
            })?;
        self.active.store(true, Ordering::Release);
        self.log.append("Acquiring device location");
        Ok(())
    }

    /// Stop the subscription. Calling this while inactive does nothing.
    pub fn stop(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        match self.service.unsubscribe() {
            Ok(()) => info!("Location updates stopped"),
            Err(e) => warn!(error = %e, "Failed to stop location updates"),
        }
    }

    /// Forward a delivered fix to the region setup.
    pub fn on_fix(&self, latitude: f64, longitude: f64) -> FixOutcome {
        debug!(latitude, longitude, "Received location update");
        match self.geofence.register_while_enabled(latitude, longitude) {
            Ok(Some(region)) => FixOutcome::Registered { region },
            Ok(None) => {
                debug!("Geofencing disabled, ignoring location update");
                FixOutcome::Ignored
            }
            Err(e) => {
                warn!(error = %e, "Could not register geofence from location update");
                FixOutcome::Rejected {
                    reason: e.to_string(),
                }
            }
        }
    }
}

impl std::fmt::Debug for LocationAcquirer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationAcquirer")
            .field("profile", &self.profile)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
