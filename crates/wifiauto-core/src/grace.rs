//! Suppression window for the periodic monitor.
//!
//! While the window is open the monitor leaves the radio alone, so an enable
//! that just happened is not undone by the next idle check. The window is a
//! single persisted timestamp ([`keys::GRACE_PERIOD_EXPIRES_AT`], epoch
//! milliseconds). Activations only ever push it later; it is never shortened
//! and never cleared early.
//!
//! Which code paths open the window is a [`GracePolicy`] setting.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::ports::Clock;
use crate::store::{keys, ConfigStore, SharedStore, StoreValue};

/// Default window length.
pub const DEFAULT_GRACE_MINUTES: u32 = 15;

/// Code paths that may open the grace window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GraceTrigger {
    /// The geofence trigger switched the radio on.
    GeofenceEnable,
    /// A new region was registered from a location fix.
    GeofenceRegistered,
    /// The monitoring schedule was (re)armed.
    MonitoringStarted,
}

/// Window length and activation points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct GracePolicy {
    /// Length of the window in minutes.
    pub duration_minutes: u32,
    /// Code paths that open the window.
    pub activate_on: Vec<GraceTrigger>,
}

impl Default for GracePolicy {
    fn default() -> Self {
        Self {
            duration_minutes: DEFAULT_GRACE_MINUTES,
            activate_on: vec![GraceTrigger::GeofenceEnable],
        }
    }
}

impl GracePolicy {
    /// Window length.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Whether `trigger` opens the window under this policy.
    #[must_use]
    pub fn activates_on(&self, trigger: GraceTrigger) -> bool {
        self.activate_on.contains(&trigger)
    }
}

/// The persisted grace window.
pub struct GracePeriod {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    policy: GracePolicy,
}

impl GracePeriod {
    /// Create a grace window over `store`.
    #[must_use]
    pub fn new(store: SharedStore, clock: Arc<dyn Clock>, policy: GracePolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// The active policy.
    #[must_use]
    pub const fn policy(&self) -> &GracePolicy {
        &self.policy
    }

    /// End of the window, if one was ever opened.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.store
            .get_i64(keys::GRACE_PERIOD_EXPIRES_AT)
            .and_then(DateTime::from_timestamp_millis)
    }

    /// Whether the window is open right now.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.expires_at()
            .is_some_and(|expires_at| self.clock.now() < expires_at)
    }

    /// Time left in the window, if it is open.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.expires_at()
            .filter(|expires_at| now < *expires_at)
            .map(|expires_at| expires_at - now)
    }

    /// Open the window for the policy's duration from now. An already-open
    /// window that ends later is kept. Returns the resulting end time.
    pub fn activate(&self) -> Option<DateTime<Utc>> {
        let candidate = (self.clock.now() + self.policy.duration()).timestamp_millis();
        let stored = self.store.update(keys::GRACE_PERIOD_EXPIRES_AT, &|current| {
            let next = match current {
                Some(StoreValue::Int(existing)) => existing.max(candidate),
                _ => candidate,
            };
            Some(StoreValue::Int(next))
        });

        match stored {
            Ok(Some(StoreValue::Int(millis))) => {
                let expires_at = DateTime::from_timestamp_millis(millis);
                debug!(?expires_at, "Grace period activated");
                expires_at
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Failed to persist grace period");
                None
            }
        }
    }

    /// Open the window if the policy lists `trigger`.
    pub fn activate_for(&self, trigger: GraceTrigger) -> Option<DateTime<Utc>> {
        if self.policy.activates_on(trigger) {
            self.activate()
        } else {
            None
        }
    }
}

impl std::fmt::Debug for GracePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GracePeriod")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct FixedClock(Mutex<DateTime<Utc>>);

    impl FixedClock {
        fn at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(now)))
        }

        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_absent_window_is_inactive() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let grace = GracePeriod::new(store, FixedClock::at(start()), GracePolicy::default());
        assert!(!grace.is_active());
        assert!(grace.expires_at().is_none());
        assert!(grace.remaining().is_none());
    }

    #[test]
    fn test_activate_opens_window_for_duration() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let clock = FixedClock::at(start());
        let grace = GracePeriod::new(store, clock.clone(), GracePolicy::default());

        let expires_at = grace.activate().unwrap();
        assert_eq!(expires_at, start() + Duration::minutes(15));
        assert!(grace.is_active());

        clock.advance(Duration::minutes(14));
        assert!(grace.is_active());
        assert_eq!(grace.remaining(), Some(Duration::minutes(1)));

        clock.advance(Duration::minutes(1));
        assert!(!grace.is_active());
    }

    #[test]
    fn test_activation_never_shortens_window() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let far = (start() + Duration::hours(2)).timestamp_millis();
        store
            .set(keys::GRACE_PERIOD_EXPIRES_AT, StoreValue::Int(far))
            .unwrap();

        let grace = GracePeriod::new(store, FixedClock::at(start()), GracePolicy::default());
        let expires_at = grace.activate().unwrap();
        assert_eq!(expires_at.timestamp_millis(), far);
    }

    #[test]
    fn test_activate_for_follows_policy() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let grace = GracePeriod::new(store, FixedClock::at(start()), GracePolicy::default());

        assert!(grace.activate_for(GraceTrigger::MonitoringStarted).is_none());
        assert!(!grace.is_active());

        assert!(grace.activate_for(GraceTrigger::GeofenceEnable).is_some());
        assert!(grace.is_active());
    }

    #[test]
    fn test_policy_deserializes_with_defaults() {
        let policy: GracePolicy =
            toml::from_str(r#"activate_on = ["geofence_enable", "monitoring_started"]"#).unwrap();
        assert_eq!(policy.duration_minutes, DEFAULT_GRACE_MINUTES);
        assert!(policy.activates_on(GraceTrigger::MonitoringStarted));
        assert!(!policy.activates_on(GraceTrigger::GeofenceRegistered));
    }
}
