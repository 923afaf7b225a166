//! Orchestration of the two automation features.
//!
//! The controller turns switch changes and restarts into schedule, cancel
//! and registration calls. It never decides the radio state itself; that is
//! left to [`PeriodicMonitor`](crate::monitor::PeriodicMonitor) and
//! [`GeofenceTrigger`](crate::trigger::GeofenceTrigger).
//!
//! If geofencing cannot be satisfied (permission missing, location settings
//! unresolvable) the persisted switch is turned back off, so that what the
//! user sees matches what is actually running.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{Result, WifiAutoError};
use crate::geofence::GeofenceSetup;
use crate::grace::{GracePeriod, GraceTrigger};
use crate::location::{LocationAcquirer, LOCATION_TAG};
use crate::monitor::MONITORING_TAG;
use crate::ports::{Capability, DiagnosticLog, JobScheduler, KeepAliveIndicator, PermissionQuery};
use crate::store::{keys, ConfigStore, Settings, SharedStore, StoreValue};
use crate::types::GeofenceRegion;

const fn state_label(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}

/// Composition of scheduler, location pipeline and persisted switches.
pub struct AutomationController {
    scheduler: Arc<dyn JobScheduler>,
    permissions: Arc<dyn PermissionQuery>,
    location: Arc<LocationAcquirer>,
    geofence: Arc<GeofenceSetup>,
    store: SharedStore,
    log: Arc<dyn DiagnosticLog>,
    indicator: Arc<dyn KeepAliveIndicator>,
    grace: Arc<GracePeriod>,
    monitor_interval: Duration,
}

impl AutomationController {
    /// Wire the controller.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scheduler: Arc<dyn JobScheduler>,
        permissions: Arc<dyn PermissionQuery>,
        location: Arc<LocationAcquirer>,
        geofence: Arc<GeofenceSetup>,
        store: SharedStore,
        log: Arc<dyn DiagnosticLog>,
        indicator: Arc<dyn KeepAliveIndicator>,
        grace: Arc<GracePeriod>,
        monitor_interval: Duration,
    ) -> Self {
        Self {
            scheduler,
            permissions,
            location,
            geofence,
            store,
            log,
            indicator,
            grace,
            monitor_interval,
        }
    }

    /// Current switch positions.
    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings::read(self.store.as_ref())
    }

    // ========================================================================
    // User-facing switches
    // ========================================================================

    /// Persist the monitoring switch and apply it.
    ///
    /// # Errors
    ///
    /// Returns an error if the switch cannot be stored or the schedule
    /// cannot be changed.
    pub fn set_monitoring(&self, enabled: bool) -> Result<Settings> {
        self.store
            .set(keys::MONITORING_ENABLED, StoreValue::Bool(enabled))?;
        self.log
            .append(&format!("Setup Wi-Fi monitoring: {}", state_label(enabled)));
        self.on_monitoring_toggled(enabled)?;
        Ok(self.settings())
    }

    /// Persist the geofencing switch and apply it. When enabling fails for
    /// lack of permission or unusable location settings, the switch is
    /// turned back off before the error is returned.
    ///
    /// # Errors
    ///
    /// - [`WifiAutoError::PermissionDenied`] without location permission
    /// - [`WifiAutoError::GeofenceUnavailable`] if location settings are unusable
    /// - scheduling or persistence failures
    pub fn set_geofencing(&self, enabled: bool) -> Result<Settings> {
        self.store
            .set(keys::GEOFENCE_ENABLED, StoreValue::Bool(enabled))?;
        self.log
            .append(&format!("Geofence: {}", state_label(enabled)));

        match self.on_geofence_toggled(enabled) {
            Ok(()) => Ok(self.settings()),
            Err(e) if enabled && e.reverts_geofencing() => {
                warn!(error = %e, "Geofencing cannot be enabled, reverting switch");
                self.revert_geofencing();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Reactions
    // ========================================================================

    /// Start or stop the recurring idle check.
    ///
    /// # Errors
    ///
    /// Returns [`WifiAutoError::SchedulerFailed`] if the scheduler refuses.
    pub fn on_monitoring_toggled(&self, enabled: bool) -> Result<()> {
        if enabled {
            self.scheduler
                .schedule_recurring(MONITORING_TAG, self.monitor_interval)
                .map_err(|e| WifiAutoError::SchedulerFailed(e.to_string()))?;
            self.grace.activate_for(GraceTrigger::MonitoringStarted);
            info!(
                interval_secs = self.monitor_interval.as_secs(),
                "Wi-Fi monitoring scheduled"
            );
        } else {
            self.scheduler
                .cancel(MONITORING_TAG)
                .map_err(|e| WifiAutoError::SchedulerFailed(e.to_string()))?;
            self.indicator.hide();
            info!("Wi-Fi monitoring cancelled");
        }
        Ok(())
    }

    /// Start or stop the location pipeline.
    ///
    /// Enabling checks permission and location settings, then schedules the
    /// one-shot location job. Disabling cancels that job, stops any
    /// subscription and removes the registered region.
    ///
    /// # Errors
    ///
    /// See [`set_geofencing`](Self::set_geofencing).
    pub fn on_geofence_toggled(&self, enabled: bool) -> Result<()> {
        if enabled {
            self.require_location_permission()?;
            self.location.check_settings()?;
            self.scheduler
                .schedule_once(LOCATION_TAG)
                .map_err(|e| WifiAutoError::SchedulerFailed(e.to_string()))?;
            info!("Location job scheduled");
        } else {
            if let Err(e) = self.scheduler.cancel(LOCATION_TAG) {
                warn!(error = %e, "Failed to cancel location job");
            }
            self.location.stop();
            self.geofence.cancel()?;
        }
        Ok(())
    }

    /// The one-shot location job came due: start the subscription if
    /// geofencing is still on. Returns whether a subscription is active.
    ///
    /// # Errors
    ///
    /// Returns [`WifiAutoError::PermissionDenied`] (after reverting the
    /// switch) if permission was revoked in the meantime, or
    /// [`WifiAutoError::LocationUnavailable`] if the service refuses.
    pub fn acquire_location(&self) -> Result<bool> {
        self.scheduler.complete(LOCATION_TAG);

        if !self.store.get_bool(keys::GEOFENCE_ENABLED, false) {
            info!("Geofencing disabled, skipping location request");
            return Ok(false);
        }

        match self.location.start() {
            // The switch may have been turned off while starting, when stop()
            // had no subscription to close yet.
            Ok(()) if !self.store.get_bool(keys::GEOFENCE_ENABLED, false) => {
                info!("Geofencing disabled while starting, stopping location request");
                self.location.stop();
                Ok(false)
            }
            Ok(()) => Ok(true),
            Err(e @ WifiAutoError::PermissionDenied { .. }) => {
                self.revert_geofencing();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Re-arm the recurring idle check after a restart. Returns whether it
    /// is scheduled.
    ///
    /// # Errors
    ///
    /// Returns [`WifiAutoError::SchedulerFailed`] if the scheduler refuses.
    pub fn on_boot_completed(&self) -> Result<bool> {
        let monitoring = self.store.get_bool(keys::MONITORING_ENABLED, false);
        info!(monitoring, "Boot completed");
        if monitoring {
            self.on_monitoring_toggled(true)?;
        }
        Ok(monitoring)
    }

    /// Register the persisted region again without acquiring a new fix.
    ///
    /// # Errors
    ///
    /// - [`WifiAutoError::PermissionDenied`] if permission was revoked; the
    ///   switch is turned off and the region removed
    /// - [`WifiAutoError::StaleConfiguration`] if no region was ever
    ///   persisted; the switch is turned off
    /// - [`WifiAutoError::GeofenceUnavailable`] if the service rejects it
    pub fn on_restore_geofence(&self) -> Result<GeofenceRegion> {
        if let Err(e) = self.require_location_permission() {
            warn!("Location permission revoked, disabling geofencing");
            self.revert_geofencing();
            return Err(e);
        }

        let Some(center) = self.geofence.persisted_center() else {
            warn!("Geofencing enabled without a stored region, resetting");
            self.store
                .set(keys::GEOFENCE_ENABLED, StoreValue::Bool(false))?;
            self.geofence.cancel()?;
            return Err(WifiAutoError::StaleConfiguration);
        };

        info!(
            latitude = center.latitude,
            longitude = center.longitude,
            "Restoring geofence"
        );
        self.geofence.register(center.latitude, center.longitude)
    }

    fn require_location_permission(&self) -> Result<()> {
        if self.permissions.is_granted(Capability::FineLocation) {
            Ok(())
        } else {
            Err(WifiAutoError::PermissionDenied {
                capability: Capability::FineLocation,
            })
        }
    }

    fn revert_geofencing(&self) {
        if let Err(e) = self
            .store
            .set(keys::GEOFENCE_ENABLED, StoreValue::Bool(false))
        {
            warn!(error = %e, "Failed to reset geofencing switch");
        }
        if let Err(e) = self.scheduler.cancel(LOCATION_TAG) {
            warn!(error = %e, "Failed to cancel location job");
        }
        self.location.stop();
        if let Err(e) = self.geofence.cancel() {
            warn!(error = %e, "Failed to remove geofence");
        }
        self.log.append("Geofence: disabled");
    }
}

impl std::fmt::Debug for AutomationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationController")
            .field("monitor_interval", &self.monitor_interval)
            .finish_non_exhaustive()
    }
}
