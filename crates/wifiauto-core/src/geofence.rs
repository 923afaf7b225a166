//! Registration of the trusted region.
//!
//! A location fix becomes a [`GeofenceRegion`] registered with the platform's
//! geofencing service, and its center is persisted so the region can be
//! restored after a restart without waiting for a new fix. Registration and
//! cancellation are serialized so that the service and the persisted center
//! always describe the same single region.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::dispatcher::EventSender;
use crate::error::{Result, WifiAutoError};
use crate::grace::{GracePeriod, GraceTrigger};
use crate::ports::{Capability, DiagnosticLog, GeofenceService, PortError};
use crate::store::{keys, ConfigStore, Edit, SharedStore, StoreValue};
use crate::types::{Coordinates, GeofenceRegion, RegionSettings, GEOFENCE_REQUEST_ID};

/// Diagnostic entry written after a successful registration.
pub const GEOFENCE_SET_MESSAGE: &str = "Geofence set";

/// Turns location fixes into a registered region.
pub struct GeofenceSetup {
    service: Arc<dyn GeofenceService>,
    store: SharedStore,
    log: Arc<dyn DiagnosticLog>,
    grace: Arc<GracePeriod>,
    target: EventSender,
    settings: RegionSettings,
    region_lock: Mutex<()>,
}

impl GeofenceSetup {
    /// Wire the setup to its collaborators. Triggers of registered regions
    /// are delivered to `target`.
    #[must_use]
    pub fn new(
        service: Arc<dyn GeofenceService>,
        store: SharedStore,
        log: Arc<dyn DiagnosticLog>,
        grace: Arc<GracePeriod>,
        target: EventSender,
        settings: RegionSettings,
    ) -> Self {
        Self {
            service,
            store,
            log,
            grace,
            target,
            settings,
            region_lock: Mutex::new(()),
        }
    }

    /// Register a region centered on `(latitude, longitude)`, replacing any
    /// previous one, and persist its center.
    ///
    /// # Errors
    ///
    /// - [`WifiAutoError::InvalidCoordinates`] for an out-of-range fix
    /// - [`WifiAutoError::GeofenceUnavailable`] if the service rejects the region
    /// - [`WifiAutoError::PermissionDenied`] if the service lacks location access
    /// - [`WifiAutoError::PersistenceError`] if the center cannot be stored
    pub fn register(&self, latitude: f64, longitude: f64) -> Result<GeofenceRegion> {
        let center = Coordinates::new(latitude, longitude)?;
        let _guard = self.region_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.register_locked(center)
    }

    /// Like [`register`](Self::register), but only while geofencing is
    /// switched on. The check happens under the registration lock, so a
    /// concurrent [`cancel`](Self::cancel) cannot be overtaken.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn register_while_enabled(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<GeofenceRegion>> {
        let center = Coordinates::new(latitude, longitude)?;
        let _guard = self.region_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.store.get_bool(keys::GEOFENCE_ENABLED, false) {
            return Ok(None);
        }
        self.register_locked(center).map(Some)
    }

    fn register_locked(&self, center: Coordinates) -> Result<GeofenceRegion> {
        let region = GeofenceRegion::around(center, self.settings);

        self.service
            .register(&region, self.target.clone())
            .map_err(|e| {
                warn!(error = %e, "Geofence registration rejected");
                match e {
                    PortError::PermissionDenied => WifiAutoError::PermissionDenied {
                        capability: Capability::FineLocation,
                    },
                    other => WifiAutoError::GeofenceUnavailable(other.to_string()),
                }
            })?;

        self.store.apply(&[
            Edit::Set(keys::GEOFENCE_LATITUDE, StoreValue::Float(center.latitude)),
            Edit::Set(keys::GEOFENCE_LONGITUDE, StoreValue::Float(center.longitude)),
        ])?;

        info!(
            latitude = center.latitude,
            longitude = center.longitude,
            radius = region.radius_meters,
            "Geofence registered"
        );
        self.log.append(GEOFENCE_SET_MESSAGE);
        self.grace.activate_for(GraceTrigger::GeofenceRegistered);
        Ok(region)
    }

    /// Unregister the region and forget its center. Safe to call when no
    /// region exists; a failing unregister is logged and the persisted
    /// center is cleared anyway.
    ///
    /// # Errors
    ///
    /// Returns [`WifiAutoError::PersistenceError`] if the center cannot be
    /// removed from the store.
    pub fn cancel(&self) -> Result<()> {
        let _guard = self.region_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Err(e) = self.service.unregister(GEOFENCE_REQUEST_ID) {
            warn!(error = %e, "Failed to unregister geofence");
        }
        self.store.apply(&[
            Edit::Remove(keys::GEOFENCE_LATITUDE),
            Edit::Remove(keys::GEOFENCE_LONGITUDE),
        ])?;
        info!("Geofence removed");
        Ok(())
    }

    /// Center of the last registered region, if one is persisted.
    #[must_use]
    pub fn persisted_center(&self) -> Option<Coordinates> {
        let latitude = self.store.get_f64(keys::GEOFENCE_LATITUDE)?;
        let longitude = self.store.get_f64(keys::GEOFENCE_LONGITUDE)?;
        Coordinates::new(latitude, longitude).ok()
    }

    /// The region described by the persisted center.
    #[must_use]
    pub fn current_region(&self) -> Option<GeofenceRegion> {
        self.persisted_center()
            .map(|center| GeofenceRegion::around(center, self.settings))
    }
}

impl std::fmt::Debug for GeofenceSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeofenceSetup")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
