//! Composition root.
//!
//! [`Engine`] wires every component to a [`Platform`] and maps each inbound
//! [`Event`] onto the component that handles it. It is shared behind an
//! `Arc` and handles events concurrently; components synchronize through
//! the persisted store only.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span, warn};
use utoipa::ToSchema;

use crate::config::DaemonConfig;
use crate::controller::AutomationController;
use crate::dispatcher::{BootReport, Event, EventOutcome, EventSender};
use crate::error::{Result, WifiAutoError};
use crate::geofence::GeofenceSetup;
use crate::grace::{GracePeriod, GracePolicy};
use crate::location::{LocationAcquirer, LOCATION_TAG};
use crate::monitor::{PeriodicMonitor, DEFAULT_INTERVAL, MONITORING_TAG};
use crate::ports::{
    Attachment, Clock, DiagnosticLog, GeofenceService, JobScheduler, KeepAliveIndicator,
    LocationService, PermissionQuery, RadioControl,
};
use crate::store::{keys, ConfigStore, Settings, SharedStore};
use crate::trigger::GeofenceTrigger;
use crate::types::{GeofenceRegion, LocationProfile, RegionSettings};

/// The platform collaborators the engine runs against.
#[derive(Clone)]
pub struct Platform {
    /// Wireless radio.
    pub radio: Arc<dyn RadioControl>,
    /// Job scheduler.
    pub scheduler: Arc<dyn JobScheduler>,
    /// Location provider.
    pub location: Arc<dyn LocationService>,
    /// Geofencing service.
    pub geofence: Arc<dyn GeofenceService>,
    /// Persisted key/value state.
    pub store: SharedStore,
    /// User-facing diagnostic log.
    pub log: Arc<dyn DiagnosticLog>,
    /// Capability checks.
    pub permissions: Arc<dyn PermissionQuery>,
    /// Long-running indicator.
    pub indicator: Arc<dyn KeepAliveIndicator>,
    /// Wall clock.
    pub clock: Arc<dyn Clock>,
}

/// Tunables taken from [`DaemonConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Interval between idle checks.
    pub monitor_interval: Duration,
    /// Grace window policy.
    pub grace: GracePolicy,
    /// Region shape.
    pub region: RegionSettings,
    /// Location subscription profile.
    pub location: LocationProfile,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            monitor_interval: DEFAULT_INTERVAL,
            grace: GracePolicy::default(),
            region: RegionSettings::default(),
            location: LocationProfile::default(),
        }
    }
}

impl From<&DaemonConfig> for EngineSettings {
    fn from(config: &DaemonConfig) -> Self {
        Self {
            monitor_interval: config.monitoring.interval(),
            grace: config.grace.clone(),
            region: config.geofence,
            location: config.location,
        }
    }
}

/// Snapshot of the engine and radio state.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EngineStatus {
    /// The two switches.
    pub settings: Settings,
    /// Radio power state, if it could be queried.
    pub radio_enabled: Option<bool>,
    /// Network attachment, if it could be queried.
    pub attachment: Option<Attachment>,
    /// Whether the grace window is open.
    pub grace_active: bool,
    /// End of the most recent grace window.
    pub grace_expires_at: Option<DateTime<Utc>>,
    /// The registered region, if any.
    pub region: Option<GeofenceRegion>,
    /// Whether a location subscription is active.
    pub location_active: bool,
}

/// The automation engine.
pub struct Engine {
    radio: Arc<dyn RadioControl>,
    store: SharedStore,
    grace: Arc<GracePeriod>,
    monitor: PeriodicMonitor,
    trigger: GeofenceTrigger,
    geofence: Arc<GeofenceSetup>,
    location: Arc<LocationAcquirer>,
    controller: AutomationController,
}

impl Engine {
    /// Wire all components to `platform`. Location fixes and geofence
    /// notifications are addressed to `events`.
    #[must_use]
    pub fn new(platform: Platform, settings: EngineSettings, events: EventSender) -> Self {
        let grace = Arc::new(GracePeriod::new(
            Arc::clone(&platform.store),
            Arc::clone(&platform.clock),
            settings.grace,
        ));

        let geofence = Arc::new(GeofenceSetup::new(
            Arc::clone(&platform.geofence),
            Arc::clone(&platform.store),
            Arc::clone(&platform.log),
            Arc::clone(&grace),
            events.clone(),
            settings.region,
        ));

        let location = Arc::new(LocationAcquirer::new(
            Arc::clone(&platform.location),
            Arc::clone(&platform.permissions),
            Arc::clone(&geofence),
            Arc::clone(&platform.log),
            settings.location,
            events,
        ));

        let monitor = PeriodicMonitor::new(
            Arc::clone(&platform.radio),
            Arc::clone(&grace),
            Arc::clone(&platform.scheduler),
            Arc::clone(&platform.log),
            Arc::clone(&platform.indicator),
        );

        let trigger = GeofenceTrigger::new(
            Arc::clone(&platform.radio),
            Arc::clone(&platform.store),
            Arc::clone(&platform.log),
            Arc::clone(&grace),
        );

        let controller = AutomationController::new(
            platform.scheduler,
            platform.permissions,
            Arc::clone(&location),
            Arc::clone(&geofence),
            Arc::clone(&platform.store),
            platform.log,
            platform.indicator,
            Arc::clone(&grace),
            settings.monitor_interval,
        );

        Self {
            radio: platform.radio,
            store: platform.store,
            grace,
            monitor,
            trigger,
            geofence,
            location,
            controller,
        }
    }

    /// Handle one event.
    ///
    /// # Errors
    ///
    /// Returns the error of the component that handled the event. Port
    /// failures inside the monitor, trigger and fix handling are reported
    /// in the outcome instead.
    pub fn handle(&self, event: Event) -> Result<EventOutcome> {
        let span = info_span!("event", name = event.name());
        let _enter = span.enter();

        match event {
            Event::SetMonitoring { enabled } => self
                .controller
                .set_monitoring(enabled)
                .map(EventOutcome::Settings),
            Event::SetGeofencing { enabled } => self
                .controller
                .set_geofencing(enabled)
                .map(EventOutcome::Settings),
            Event::Boot => self.startup().map(EventOutcome::Booted),
            Event::GeofenceTriggered(payload) => {
                Ok(EventOutcome::Trigger(self.trigger.handle(&payload)))
            }
            Event::LocationFix {
                latitude,
                longitude,
            } => Ok(EventOutcome::Fix(self.location.on_fix(latitude, longitude))),
            Event::PeriodicTick => Ok(EventOutcome::Monitor(self.monitor.check_now())),
            Event::JobFired { tag } => match tag.as_str() {
                MONITORING_TAG => Ok(EventOutcome::Monitor(self.monitor.run())),
                LOCATION_TAG => self
                    .controller
                    .acquire_location()
                    .map(|active| EventOutcome::LocationRequested { active }),
                _ => {
                    warn!(tag = %tag, "Unknown job fired");
                    Ok(EventOutcome::Ignored {
                        reason: format!("unknown job tag '{tag}'"),
                    })
                }
            },
        }
    }

    /// Startup work: re-arm the idle check and, if geofencing was left on,
    /// restore the persisted region. Restore failures are logged and do not
    /// fail startup.
    ///
    /// # Errors
    ///
    /// Returns an error if the idle check cannot be scheduled.
    pub fn startup(&self) -> Result<BootReport> {
        let monitoring_scheduled = self.controller.on_boot_completed()?;

        let geofence_restored = if self.store.get_bool(keys::GEOFENCE_ENABLED, false) {
            match self.controller.on_restore_geofence() {
                Ok(_) => true,
                Err(WifiAutoError::StaleConfiguration) => {
                    info!("Cleared stale geofencing switch");
                    false
                }
                Err(e) => {
                    warn!(error = %e, "Could not restore geofence");
                    false
                }
            }
        } else {
            false
        };

        Ok(BootReport {
            monitoring_scheduled,
            geofence_restored,
        })
    }

    /// Current state of switches, radio, grace window and region.
    #[must_use]
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            settings: self.controller.settings(),
            radio_enabled: self.radio.is_enabled().ok(),
            attachment: self.radio.current_attachment().ok(),
            grace_active: self.grace.is_active(),
            grace_expires_at: self.grace.expires_at(),
            region: self.geofence.current_region(),
            location_active: self.location.is_active(),
        }
    }

    /// The orchestrating controller.
    #[must_use]
    pub const fn controller(&self) -> &AutomationController {
        &self.controller
    }

    /// The grace window.
    #[must_use]
    pub fn grace(&self) -> &GracePeriod {
        &self.grace
    }

    /// The region registration.
    #[must_use]
    pub fn geofence(&self) -> &GeofenceSetup {
        &self.geofence
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}
