//! In-memory fakes of every platform port.
//!
//! Each fake records the calls it receives so tests can assert on the full
//! interaction history without touching a real radio or location provider.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use wifiauto_core::dispatcher::{channel, EventReceiver, EventSender};
use wifiauto_core::engine::{Engine, EngineSettings, Platform};
use wifiauto_core::event_log::MemoryEventLog;
use wifiauto_core::ports::{
    AssociationState, Attachment, Capability, Clock, GeofenceService, JobScheduler,
    KeepAliveIndicator, LocationService, PermissionQuery, PortError, PortResult, RadioControl,
    Transport,
};
use wifiauto_core::store::MemoryStore;
use wifiauto_core::types::{GeofenceRegion, LocationProfile};

// ── Radio ─────────────────────────────────────────────────────

pub struct MockRadio {
    enabled: Mutex<bool>,
    attachment: Mutex<Attachment>,
    pub set_calls: Mutex<Vec<bool>>,
    pub fail: AtomicBool,
}

impl MockRadio {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Mutex::new(enabled),
            attachment: Mutex::new(Attachment::detached()),
            set_calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn enabled(&self) -> bool {
        *self.enabled.lock().unwrap()
    }

    pub fn set_state(&self, enabled: bool) {
        *self.enabled.lock().unwrap() = enabled;
    }

    pub fn attach(&self, attachment: Attachment) {
        *self.attachment.lock().unwrap() = attachment;
    }

    pub fn set_calls(&self) -> Vec<bool> {
        self.set_calls.lock().unwrap().clone()
    }

    fn check(&self) -> PortResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(PortError::Failed("radio driver crashed".to_string()))
        } else {
            Ok(())
        }
    }
}

impl RadioControl for MockRadio {
    fn is_enabled(&self) -> PortResult<bool> {
        self.check()?;
        Ok(self.enabled())
    }

    fn set_enabled(&self, enabled: bool) -> PortResult<()> {
        self.check()?;
        self.set_calls.lock().unwrap().push(enabled);
        self.set_state(enabled);
        Ok(())
    }

    fn current_attachment(&self) -> PortResult<Attachment> {
        self.check()?;
        Ok(self.attachment.lock().unwrap().clone())
    }
}

pub fn wifi_completed() -> Attachment {
    Attachment {
        transport: Transport::Wifi,
        association: AssociationState::Completed,
        network: Some("HomeNetwork".to_string()),
    }
}

pub fn wifi_associating() -> Attachment {
    Attachment {
        transport: Transport::Wifi,
        association: AssociationState::Associating,
        network: Some("HomeNetwork".to_string()),
    }
}

pub fn cellular() -> Attachment {
    Attachment {
        transport: Transport::Cellular,
        association: AssociationState::Disconnected,
        network: None,
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCall {
    Recurring { tag: String, interval: Duration },
    Once(String),
    Cancel(String),
    Complete(String),
}

#[derive(Default)]
pub struct MockScheduler {
    pub calls: Mutex<Vec<SchedulerCall>>,
    pub fail: AtomicBool,
}

impl MockScheduler {
    pub fn calls(&self) -> Vec<SchedulerCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether the most recent schedule/cancel call for `tag` left it scheduled.
    pub fn is_scheduled(&self, tag: &str) -> bool {
        self.calls()
            .iter()
            .rev()
            .find_map(|call| match call {
                SchedulerCall::Recurring { tag: t, .. } | SchedulerCall::Once(t) if t == tag => {
                    Some(true)
                }
                SchedulerCall::Cancel(t) if t == tag => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn completions(&self, tag: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, SchedulerCall::Complete(t) if t == tag))
            .count()
    }

    fn check(&self) -> PortResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(PortError::Unavailable("scheduler offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl JobScheduler for MockScheduler {
    fn schedule_recurring(&self, tag: &str, interval: Duration) -> PortResult<()> {
        self.check()?;
        self.calls.lock().unwrap().push(SchedulerCall::Recurring {
            tag: tag.to_string(),
            interval,
        });
        Ok(())
    }

    fn schedule_once(&self, tag: &str) -> PortResult<()> {
        self.check()?;
        self.calls
            .lock()
            .unwrap()
            .push(SchedulerCall::Once(tag.to_string()));
        Ok(())
    }

    fn cancel(&self, tag: &str) -> PortResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(SchedulerCall::Cancel(tag.to_string()));
        Ok(())
    }

    fn complete(&self, tag: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(SchedulerCall::Complete(tag.to_string()));
    }
}

// ── Location ──────────────────────────────────────────────────

pub struct MockLocation {
    pub settings_ok: AtomicBool,
    pub subscription: Mutex<Option<LocationProfile>>,
    pub subscribe_calls: AtomicUsize,
    pub unsubscribe_calls: AtomicUsize,
    /// Runs inside `subscribe`, to interleave other work with it.
    pub during_subscribe: Mutex<Option<Box<dyn Fn() + Send>>>,
}

impl MockLocation {
    pub fn is_subscribed(&self) -> bool {
        self.subscription.lock().unwrap().is_some()
    }
}

impl Default for MockLocation {
    fn default() -> Self {
        Self {
            settings_ok: AtomicBool::new(true),
            subscription: Mutex::new(None),
            subscribe_calls: AtomicUsize::new(0),
            unsubscribe_calls: AtomicUsize::new(0),
            during_subscribe: Mutex::new(None),
        }
    }
}

impl LocationService for MockLocation {
    fn check_settings(&self, _profile: &LocationProfile) -> PortResult<()> {
        if self.settings_ok.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PortError::Unavailable("location services disabled".to_string()))
        }
    }

    fn subscribe(&self, profile: &LocationProfile, _target: EventSender) -> PortResult<()> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        *self.subscription.lock().unwrap() = Some(*profile);
        if let Some(hook) = self.during_subscribe.lock().unwrap().as_ref() {
            hook();
        }
        Ok(())
    }

    fn unsubscribe(&self) -> PortResult<()> {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        *self.subscription.lock().unwrap() = None;
        Ok(())
    }
}

// ── Geofence ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockGeofence {
    /// Regions currently live with the service, by id.
    pub live: Mutex<Vec<GeofenceRegion>>,
    pub register_calls: AtomicUsize,
    pub unregister_calls: AtomicUsize,
    pub reject: Mutex<Option<PortError>>,
}

impl MockGeofence {
    pub fn live(&self) -> Vec<GeofenceRegion> {
        self.live.lock().unwrap().clone()
    }

    pub fn reject_with(&self, error: Option<PortError>) {
        *self.reject.lock().unwrap() = error;
    }
}

impl GeofenceService for MockGeofence {
    fn register(&self, region: &GeofenceRegion, _target: EventSender) -> PortResult<()> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.reject.lock().unwrap().clone() {
            return Err(error);
        }
        let mut live = self.live.lock().unwrap();
        live.retain(|existing| existing.id != region.id);
        live.push(region.clone());
        Ok(())
    }

    fn unregister(&self, region_id: &str) -> PortResult<()> {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        self.live
            .lock()
            .unwrap()
            .retain(|existing| existing.id != region_id);
        Ok(())
    }
}

// ── Permissions, indicator, clock ─────────────────────────────

pub struct MockPermissions(pub AtomicBool);

impl MockPermissions {
    pub fn granted(granted: bool) -> Self {
        Self(AtomicBool::new(granted))
    }

    pub fn set(&self, granted: bool) {
        self.0.store(granted, Ordering::SeqCst);
    }
}

impl PermissionQuery for MockPermissions {
    fn is_granted(&self, _capability: Capability) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MockIndicator {
    pub shown: AtomicBool,
    pub show_calls: AtomicUsize,
}

impl MockIndicator {
    pub fn is_shown(&self) -> bool {
        self.shown.load(Ordering::SeqCst)
    }
}

impl KeepAliveIndicator for MockIndicator {
    fn show(&self) {
        self.show_calls.fetch_add(1, Ordering::SeqCst);
        self.shown.store(true, Ordering::SeqCst);
    }

    fn hide(&self) {
        self.shown.store(false, Ordering::SeqCst);
    }
}

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new() -> Self {
        Self(Mutex::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()))
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

// ── Harness ───────────────────────────────────────────────────

pub struct Harness {
    pub radio: Arc<MockRadio>,
    pub scheduler: Arc<MockScheduler>,
    pub location: Arc<MockLocation>,
    pub geofence: Arc<MockGeofence>,
    pub store: Arc<MemoryStore>,
    pub log: Arc<MemoryEventLog>,
    pub permissions: Arc<MockPermissions>,
    pub indicator: Arc<MockIndicator>,
    pub clock: Arc<ManualClock>,
    pub engine: Engine,
    pub events: EventReceiver,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::default())
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        Self::with_store(settings, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(settings: EngineSettings, store: Arc<MemoryStore>) -> Self {
        let radio = Arc::new(MockRadio::new(true));
        let scheduler = Arc::new(MockScheduler::default());
        let location = Arc::new(MockLocation::default());
        let geofence = Arc::new(MockGeofence::default());
        let log = Arc::new(MemoryEventLog::new());
        let permissions = Arc::new(MockPermissions::granted(true));
        let indicator = Arc::new(MockIndicator::default());
        let clock = Arc::new(ManualClock::new());

        let platform = Platform {
            radio: radio.clone(),
            scheduler: scheduler.clone(),
            location: location.clone(),
            geofence: geofence.clone(),
            store: store.clone(),
            log: log.clone(),
            permissions: permissions.clone(),
            indicator: indicator.clone(),
            clock: clock.clone(),
        };

        let (sender, events) = channel();
        let engine = Engine::new(platform, settings, sender);

        Self {
            radio,
            scheduler,
            location,
            geofence,
            store,
            log,
            permissions,
            indicator,
            clock,
            engine,
            events,
        }
    }

    /// Log messages appended since the harness was built.
    pub fn log_entries(&self) -> Vec<String> {
        self.log.entries()
    }
}
