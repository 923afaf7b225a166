//! Periodic idle check.
//!
//! Each run decides whether the radio is on without doing anything useful
//! and, if so, switches it off:
//!
//! 1. radio already off → nothing to do
//! 2. grace window open → suppressed
//! 3. attached through the radio with a completed association → in use
//! 4. otherwise → disable the radio
//!
//! The monitor never switches the radio on. Every run reports completion to
//! the scheduler exactly once, whatever the outcome, and never retries on
//! its own: the next tick is the retry.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::grace::GracePeriod;
use crate::ports::{DiagnosticLog, JobScheduler, KeepAliveIndicator, RadioControl};

/// Tag the recurring idle check is scheduled under.
pub const MONITORING_TAG: &str = "wifiauto.monitoring";

/// Default interval between idle checks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Diagnostic entry written when the radio is switched off.
pub const RADIO_DISABLED_MESSAGE: &str = "Wi-Fi has been disabled";

/// Result of one idle check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MonitorOutcome {
    /// The radio was already off.
    AlreadyDisabled,
    /// The grace window suppressed the check.
    GraceActive {
        /// End of the window.
        expires_at: Option<DateTime<Utc>>,
    },
    /// The radio carries an associated connection.
    InUse,
    /// The radio was idle and has been switched off.
    Disabled,
    /// The radio could not be queried or toggled.
    RadioFailure {
        /// What went wrong.
        reason: String,
    },
}

impl MonitorOutcome {
    /// Whether this run changed the radio state.
    #[must_use]
    pub const fn changed_radio(&self) -> bool {
        matches!(self, Self::Disabled)
    }
}

/// The recurring idle check.
pub struct PeriodicMonitor {
    radio: Arc<dyn RadioControl>,
    grace: Arc<GracePeriod>,
    scheduler: Arc<dyn JobScheduler>,
    log: Arc<dyn DiagnosticLog>,
    indicator: Arc<dyn KeepAliveIndicator>,
}

impl PeriodicMonitor {
    /// Wire the monitor to its collaborators.
    #[must_use]
    pub fn new(
        radio: Arc<dyn RadioControl>,
        grace: Arc<GracePeriod>,
        scheduler: Arc<dyn JobScheduler>,
        log: Arc<dyn DiagnosticLog>,
        indicator: Arc<dyn KeepAliveIndicator>,
    ) -> Self {
        Self {
            radio,
            grace,
            scheduler,
            log,
            indicator,
        }
    }

    /// Perform one scheduled run and report completion.
    pub fn run(&self) -> MonitorOutcome {
        self.indicator.show();
        let outcome = self.evaluate();
        debug!(?outcome, "Idle check finished");
        self.scheduler.complete(MONITORING_TAG);
        outcome
    }

    /// Perform one check outside the schedule.
    ///
    /// Leaves the scheduler's in-flight state and the indicator untouched, so
    /// a scheduled run that is still executing keeps its overlap protection.
    pub fn check_now(&self) -> MonitorOutcome {
        let outcome = self.evaluate();
        debug!(?outcome, "Manual idle check finished");
        outcome
    }

    fn evaluate(&self) -> MonitorOutcome {
        match self.radio.is_enabled() {
            Ok(false) => {
                debug!("Radio already disabled");
                return MonitorOutcome::AlreadyDisabled;
            }
            Ok(true) => {}
            Err(e) => {
                warn!(error = %e, "Could not query radio state");
                return MonitorOutcome::RadioFailure {
                    reason: e.to_string(),
                };
            }
        }

        if self.grace.is_active() {
            let expires_at = self.grace.expires_at();
            info!(?expires_at, "Grace period active, leaving radio on");
            return MonitorOutcome::GraceActive { expires_at };
        }

        let attachment = match self.radio.current_attachment() {
            Ok(attachment) => attachment,
            Err(e) => {
                warn!(error = %e, "Could not query network attachment");
                return MonitorOutcome::RadioFailure {
                    reason: e.to_string(),
                };
            }
        };

        if attachment.is_connected_via_radio() {
            debug!(network = ?attachment.network, "Radio is in use");
            return MonitorOutcome::InUse;
        }

        info!(
            transport = ?attachment.transport,
            association = ?attachment.association,
            "Radio idle, disabling"
        );
        match self.radio.set_enabled(false) {
            Ok(()) => {
                self.log.append(RADIO_DISABLED_MESSAGE);
                MonitorOutcome::Disabled
            }
            Err(e) => {
                warn!(error = %e, "Failed to disable radio");
                MonitorOutcome::RadioFailure {
                    reason: e.to_string(),
                }
            }
        }
    }
}

impl std::fmt::Debug for PeriodicMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicMonitor").finish_non_exhaustive()
    }
}
