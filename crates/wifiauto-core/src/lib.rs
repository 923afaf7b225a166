//! # wifiauto-core
//!
//! Automation engine that switches a device's Wi-Fi radio on when it enters a
//! trusted area and off again when the radio sits idle.
//!
//! This crate provides:
//! - The periodic idle check that disables an unused radio
//! - The location and geofence pipeline that enables it on arrival
//! - A grace window that keeps the two from fighting each other
//! - Persisted switches, a diagnostic event log and daemon configuration
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`ports`] - Traits for the platform collaborators (radio, scheduler, location, ...)
//! - [`controller`] - Switch changes and restarts to schedule/cancel calls
//! - [`monitor`] - Periodic idle check
//! - [`location`] - Location subscription feeding the geofence setup
//! - [`geofence`] - Region registration and persistence
//! - [`trigger`] - Reaction to geofence notifications
//! - [`grace`] - Suppression window for the idle check
//! - [`engine`] - Composition root mapping events to components
//! - [`dispatcher`] - Event channel and dispatcher task
//! - [`scheduler`] - Tokio-backed job scheduler
//! - [`store`] - Persisted key/value state
//! - [`event_log`] - User-facing diagnostic log
//! - [`config`] - Daemon configuration loading and validation
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared types and OpenAPI schemas

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod geofence;
pub mod grace;
pub mod location;
pub mod monitor;
pub mod ports;
pub mod scheduler;
pub mod store;
pub mod trigger;
pub mod types;

// Re-export primary types for convenience
pub use crate::config::{ConfigError, DaemonConfig, LogRotation, LoggingConfig};
pub use controller::AutomationController;
pub use dispatcher::{channel, BootReport, Event, EventDispatcher, EventOutcome, EventSender};
pub use engine::{Engine, EngineSettings, EngineStatus, Platform};
pub use error::{Result, WifiAutoError};
pub use event_log::{FileEventLog, MemoryEventLog};
pub use grace::{GracePeriod, GracePolicy, GraceTrigger};
pub use location::{FixOutcome, LOCATION_TAG};
pub use monitor::{MonitorOutcome, MONITORING_TAG};
pub use ports::{
    AssociationState, Attachment, Capability, Clock, PortError, PortResult, SystemClock,
    Transport,
};
pub use scheduler::TokioScheduler;
pub use store::{ConfigStore, FileStore, MemoryStore, Settings, SharedStore};
pub use trigger::TriggerOutcome;
pub use types::{Coordinates, GeofenceEvent, GeofenceRegion, LocationProfile, Transition};
