//! Reaction to geofence notifications.
//!
//! Notifications arrive asynchronously and may be stale (geofencing switched
//! off since registration), carry an error code instead of a transition
//! (location services turned off), or repeat on every dwell re-trigger. Only
//! the first enter/dwell notification while the radio is off changes
//! anything.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::grace::{GracePeriod, GraceTrigger};
use crate::ports::{DiagnosticLog, RadioControl};
use crate::store::{keys, ConfigStore, SharedStore};
use crate::types::{geofence_status_name, GeofenceEvent, Transition};

/// Diagnostic entry written when the radio is switched on.
pub const RADIO_ENABLED_MESSAGE: &str = "Wi-Fi enabled within geofence";

/// Result of handling one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// Geofencing is switched off; the notification is stale.
    FeatureDisabled,
    /// The notification carried an error code.
    ServiceError {
        /// Raw status code.
        code: i32,
        /// Symbolic name of the code.
        name: String,
    },
    /// The transition is not one the radio reacts to.
    IgnoredTransition,
    /// The radio was off and has been switched on.
    RadioEnabled,
    /// The radio was already on.
    AlreadyEnabled,
    /// The radio could not be queried or toggled.
    RadioFailure {
        /// What went wrong.
        reason: String,
    },
}

/// Handles geofence notifications.
pub struct GeofenceTrigger {
    radio: Arc<dyn RadioControl>,
    store: SharedStore,
    log: Arc<dyn DiagnosticLog>,
    grace: Arc<GracePeriod>,
}

impl GeofenceTrigger {
    /// Wire the trigger to its collaborators.
    #[must_use]
    pub fn new(
        radio: Arc<dyn RadioControl>,
        store: SharedStore,
        log: Arc<dyn DiagnosticLog>,
        grace: Arc<GracePeriod>,
    ) -> Self {
        Self {
            radio,
            store,
            log,
            grace,
        }
    }

    /// Handle one notification.
    pub fn handle(&self, event: &GeofenceEvent) -> TriggerOutcome {
        if !self.store.get_bool(keys::GEOFENCE_ENABLED, false) {
            warn!("Geofence notification received while geofencing is disabled");
            return TriggerOutcome::FeatureDisabled;
        }

        if let Some(code) = event.error_code {
            let name = geofence_status_name(code);
            warn!(code, name, "Geofence notification reported an error");
            self.log.append(&format!("Geofence error: {name}"));
            return TriggerOutcome::ServiceError {
                code,
                name: name.to_string(),
            };
        }

        match event.transition {
            Some(Transition::Enter | Transition::Dwell) => {}
            other => {
                debug!(transition = ?other, "Ignoring geofence transition");
                return TriggerOutcome::IgnoredTransition;
            }
        }

        match self.radio.is_enabled() {
            Ok(true) => {
                info!("Wi-Fi already enabled");
                TriggerOutcome::AlreadyEnabled
            }
            Ok(false) => match self.radio.set_enabled(true) {
                Ok(()) => {
                    info!(transition = ?event.transition, "Enabled radio inside geofence");
                    self.log.append(RADIO_ENABLED_MESSAGE);
                    self.grace.activate_for(GraceTrigger::GeofenceEnable);
                    TriggerOutcome::RadioEnabled
                }
                Err(e) => {
                    warn!(error = %e, "Failed to enable radio");
                    TriggerOutcome::RadioFailure {
                        reason: e.to_string(),
                    }
                }
            },
            Err(e) => {
                warn!(error = %e, "Could not query radio state");
                TriggerOutcome::RadioFailure {
                    reason: e.to_string(),
                }
            }
        }
    }
}

impl std::fmt::Debug for GeofenceTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeofenceTrigger").finish_non_exhaustive()
    }
}
