//! Application state shared across handlers.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tracing::info;
use wifiauto_core::dispatcher::{channel, EventDispatcher, EventSender};
use wifiauto_core::engine::{Engine, EngineSettings, Platform};
use wifiauto_core::event_log::FileEventLog;
use wifiauto_core::ports::{Clock, PermissionQuery, RadioControl, SystemClock};
use wifiauto_core::{DaemonConfig, FileStore, TokioScheduler};

use crate::platform::{LogIndicator, PublishedGeofenceService, PushLocationService};

/// Shared application state.
pub type SharedState = Arc<AppState>;

/// Everything the handlers reach.
pub struct AppState {
    /// The automation engine, for read-only status queries.
    pub engine: Arc<Engine>,
    /// Submits events to the dispatcher.
    pub events: EventSender,
    /// The diagnostic log file.
    pub event_log: Arc<FileEventLog>,
    /// Location subscription published to the external provider.
    pub location: Arc<PushLocationService>,
    /// Region published to the external provider.
    pub geofence: Arc<PublishedGeofenceService>,
    /// Monitoring indicator.
    pub indicator: Arc<LogIndicator>,
    /// When the state was assembled.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Seconds since the state was assembled.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        u64::try_from((Utc::now() - self.started_at).num_seconds()).unwrap_or(0)
    }
}

/// Wire the engine to the Linux adapters described by `config`.
///
/// The returned dispatcher must be spawned for events to be handled. Must be
/// called from within a tokio runtime.
///
/// # Errors
///
/// Returns an error if the persisted state file exists but cannot be read.
pub fn assemble(
    config: &DaemonConfig,
    radio: Arc<dyn RadioControl>,
    permissions: Arc<dyn PermissionQuery>,
) -> anyhow::Result<(SharedState, EventDispatcher)> {
    let store = Arc::new(
        FileStore::open(&config.storage.state_file).with_context(|| {
            format!(
                "opening state file {}",
                config.storage.state_file.display()
            )
        })?,
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let event_log = Arc::new(FileEventLog::with_options(
        &config.storage.event_log,
        config.storage.event_log_max_bytes,
        Arc::clone(&clock),
    ));

    let (events, receiver) = channel();
    let scheduler = Arc::new(TokioScheduler::new(Handle::current(), events.clone()));
    let location = Arc::new(PushLocationService::new(
        config.platform.location_available,
    ));
    let geofence = Arc::new(PublishedGeofenceService::new(
        config.platform.location_available,
    ));
    let indicator = Arc::new(LogIndicator::default());

    let platform = Platform {
        radio,
        scheduler,
        location: location.clone(),
        geofence: geofence.clone(),
        store,
        log: event_log.clone(),
        permissions,
        indicator: indicator.clone(),
        clock,
    };
    let engine = Arc::new(Engine::new(
        platform,
        EngineSettings::from(config),
        events.clone(),
    ));
    info!(
        state_file = %config.storage.state_file.display(),
        event_log = %config.storage.event_log.display(),
        "Engine assembled"
    );

    let dispatcher = EventDispatcher::new(receiver, Arc::clone(&engine));
    let state = Arc::new(AppState {
        engine,
        events,
        event_log,
        location,
        geofence,
        indicator,
        started_at: Utc::now(),
    });
    Ok((state, dispatcher))
}
