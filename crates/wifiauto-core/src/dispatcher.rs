//! Inbound event channel.
//!
//! Every trigger the engine reacts to (a settings change, a scheduled job,
//! a location fix, a geofence notification, a restart) is an [`Event`] sent
//! through an [`EventSender`]. The [`EventDispatcher`] drains the channel and
//! runs each event on its own blocking task, so port calls that stall never
//! hold up the next event and no component waits on another.
//!
//! ```text
//!  HTTP handler ─┐
//!  scheduler ────┼─▶ EventSender ─▶ EventDispatcher ─▶ spawn_blocking(Engine::handle)
//!  platform ─────┘                                          │
//!                                    optional reply ◀───────┘
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::engine::Engine;
use crate::error::{Result, WifiAutoError};
use crate::location::FixOutcome;
use crate::monitor::MonitorOutcome;
use crate::store::Settings;
use crate::trigger::TriggerOutcome;
use crate::types::GeofenceEvent;

/// A trigger for the automation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The user switched monitoring on or off.
    SetMonitoring {
        /// New switch position.
        enabled: bool,
    },
    /// The user switched geofencing on or off.
    SetGeofencing {
        /// New switch position.
        enabled: bool,
    },
    /// The process (or device) has just started.
    Boot,
    /// The geofencing service reported a transition or an error.
    GeofenceTriggered(GeofenceEvent),
    /// The location service delivered a fix.
    LocationFix {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
    },
    /// Run the idle check now, outside the schedule.
    PeriodicTick,
    /// A scheduled job came due.
    JobFired {
        /// Tag the job was scheduled under.
        tag: String,
    },
}

impl Event {
    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetMonitoring { .. } => "set_monitoring",
            Self::SetGeofencing { .. } => "set_geofencing",
            Self::Boot => "boot",
            Self::GeofenceTriggered(_) => "geofence_triggered",
            Self::LocationFix { .. } => "location_fix",
            Self::PeriodicTick => "periodic_tick",
            Self::JobFired { .. } => "job_fired",
        }
    }
}

/// What handling an [`Event`] produced.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum EventOutcome {
    /// A switch was changed; carries the resulting settings.
    Settings(Settings),
    /// Startup work finished.
    Booted(BootReport),
    /// Result of an idle check.
    Monitor(MonitorOutcome),
    /// Result of a geofence notification.
    Trigger(TriggerOutcome),
    /// Result of a location fix.
    Fix(FixOutcome),
    /// The location job ran.
    LocationRequested {
        /// Whether a subscription is now active.
        active: bool,
    },
    /// The event did not apply to anything.
    Ignored {
        /// Why nothing happened.
        reason: String,
    },
}

/// Summary of startup work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
pub struct BootReport {
    /// The recurring idle check is scheduled.
    pub monitoring_scheduled: bool,
    /// A persisted region was registered again.
    pub geofence_restored: bool,
}

struct Envelope {
    event: Event,
    reply: Option<oneshot::Sender<Result<EventOutcome>>>,
}

/// Cloneable handle for submitting events.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl std::fmt::Debug for EventSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl EventSender {
    /// Submit an event without waiting for it to be handled. Returns `false`
    /// if the dispatcher is gone.
    pub fn send(&self, event: Event) -> bool {
        let name = event.name();
        let delivered = self.tx.send(Envelope { event, reply: None }).is_ok();
        if !delivered {
            warn!(event = name, "Dropping event, dispatcher is not running");
        }
        delivered
    }

    /// Submit an event and wait for its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`WifiAutoError::DispatcherClosed`] if the dispatcher stopped
    /// before answering, or whatever error handling the event produced.
    pub async fn request(&self, event: Event) -> Result<EventOutcome> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Envelope {
                event,
                reply: Some(reply),
            })
            .map_err(|_| WifiAutoError::DispatcherClosed)?;
        response.await.map_err(|_| WifiAutoError::DispatcherClosed)?
    }

    /// Whether the dispatcher has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of the event channel.
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl std::fmt::Debug for EventReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReceiver").finish_non_exhaustive()
    }
}

impl EventReceiver {
    /// Take the next event directly, bypassing the dispatcher. A pending
    /// reply is dropped, so the requester sees [`WifiAutoError::DispatcherClosed`].
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await.map(|envelope| envelope.event)
    }
}

/// Create a new event channel.
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}

/// Drains an [`EventReceiver`] into an [`Engine`].
pub struct EventDispatcher {
    receiver: EventReceiver,
    engine: Arc<Engine>,
}

impl EventDispatcher {
    /// Create a dispatcher feeding `engine`.
    #[must_use]
    pub const fn new(receiver: EventReceiver, engine: Arc<Engine>) -> Self {
        Self { receiver, engine }
    }

    /// Handle events until every sender has been dropped.
    pub async fn run(mut self) {
        info!("Event dispatcher started");
        while let Some(Envelope { event, reply }) = self.receiver.rx.recv().await {
            let engine = Arc::clone(&self.engine);
            debug!(event = event.name(), "Dispatching event");
            tokio::task::spawn_blocking(move || {
                let outcome = engine.handle(event);
                if let Some(reply) = reply {
                    // The requester may have given up waiting.
                    let _ = reply.send(outcome);
                }
            });
        }
        info!("Event dispatcher stopped");
    }
}
