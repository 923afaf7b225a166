//! Switch handling, restarts and the revert contract.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{Harness, SchedulerCall};
use wifiauto_core::dispatcher::{BootReport, Event, EventOutcome};
use wifiauto_core::engine::EngineSettings;
use wifiauto_core::error::WifiAutoError;
use wifiauto_core::grace::{GracePolicy, GraceTrigger};
use wifiauto_core::location::LOCATION_TAG;
use wifiauto_core::monitor::MONITORING_TAG;
use wifiauto_core::store::{keys, ConfigStore, MemoryStore, StoreValue};

fn settings(harness: &Harness, event: Event) -> wifiauto_core::Result<wifiauto_core::Settings> {
    harness.engine.handle(event).map(|outcome| match outcome {
        EventOutcome::Settings(settings) => settings,
        other => panic!("unexpected outcome: {other:?}"),
    })
}

// ── Monitoring switch ────────────────────────────────────────

#[test]
fn enabling_monitoring_schedules_recurring_job() {
    let harness = Harness::new();
    let result = settings(&harness, Event::SetMonitoring { enabled: true }).unwrap();

    assert!(result.monitoring_enabled);
    assert!(!result.geofence_enabled);
    assert_eq!(
        harness.scheduler.calls(),
        vec![SchedulerCall::Recurring {
            tag: MONITORING_TAG.to_string(),
            interval: Duration::from_secs(15 * 60),
        }]
    );
    assert_eq!(
        harness.log_entries(),
        vec!["Setup Wi-Fi monitoring: enabled".to_string()]
    );
}

#[test]
fn disabling_monitoring_cancels_and_hides_indicator() {
    let harness = Harness::new();
    settings(&harness, Event::SetMonitoring { enabled: true }).unwrap();
    harness
        .engine
        .handle(Event::JobFired {
            tag: MONITORING_TAG.to_string(),
        })
        .unwrap();
    assert!(harness.indicator.is_shown());

    let result = settings(&harness, Event::SetMonitoring { enabled: false }).unwrap();
    assert!(!result.monitoring_enabled);
    assert!(!harness.scheduler.is_scheduled(MONITORING_TAG));
    assert!(!harness.indicator.is_shown());
}

#[test]
fn scheduler_failure_surfaces() {
    let harness = Harness::new();
    harness.scheduler.fail.store(true, Ordering::SeqCst);
    assert!(matches!(
        settings(&harness, Event::SetMonitoring { enabled: true }),
        Err(WifiAutoError::SchedulerFailed(_))
    ));
}

#[test]
fn monitoring_start_can_open_grace_window() {
    let harness = Harness::with_settings(EngineSettings {
        grace: GracePolicy {
            duration_minutes: 15,
            activate_on: vec![GraceTrigger::MonitoringStarted],
        },
        ..EngineSettings::default()
    });
    settings(&harness, Event::SetMonitoring { enabled: true }).unwrap();
    assert!(harness.engine.grace().is_active());
}

// ── Geofencing switch ────────────────────────────────────────

#[test]
fn enabling_geofencing_schedules_location_job() {
    let harness = Harness::new();
    let result = settings(&harness, Event::SetGeofencing { enabled: true }).unwrap();

    assert!(result.geofence_enabled);
    assert!(harness.scheduler.is_scheduled(LOCATION_TAG));
    assert_eq!(harness.log_entries(), vec!["Geofence: enabled".to_string()]);

    let outcome = harness
        .engine
        .handle(Event::JobFired {
            tag: LOCATION_TAG.to_string(),
        })
        .unwrap();
    assert_eq!(outcome, EventOutcome::LocationRequested { active: true });
    assert_eq!(harness.scheduler.completions(LOCATION_TAG), 1);
    assert_eq!(harness.location.subscribe_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn switching_off_during_location_start_closes_the_subscription() {
    let harness = Harness::new();
    settings(&harness, Event::SetGeofencing { enabled: true }).unwrap();

    // The switch flips after the enabled check but before the subscription
    // is marked active, so the disabling side's stop() finds nothing to stop.
    let store = harness.store.clone();
    *harness.location.during_subscribe.lock().unwrap() = Some(Box::new(move || {
        store
            .set(keys::GEOFENCE_ENABLED, StoreValue::Bool(false))
            .unwrap();
    }));

    let outcome = harness
        .engine
        .handle(Event::JobFired {
            tag: LOCATION_TAG.to_string(),
        })
        .unwrap();
    assert_eq!(outcome, EventOutcome::LocationRequested { active: false });
    assert_eq!(harness.location.subscribe_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.location.unsubscribe_calls.load(Ordering::SeqCst), 1);
    assert!(!harness.location.is_subscribed());
}

#[test]
fn permission_denied_reverts_switch() {
    let harness = Harness::new();
    harness.permissions.set(false);

    let err = settings(&harness, Event::SetGeofencing { enabled: true }).unwrap_err();
    assert!(matches!(err, WifiAutoError::PermissionDenied { .. }));
    assert!(!harness.store.get_bool(keys::GEOFENCE_ENABLED, true));
    assert!(!harness.scheduler.is_scheduled(LOCATION_TAG));
    assert_eq!(harness.location.subscribe_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unusable_location_settings_revert_switch() {
    let harness = Harness::new();
    harness.location.settings_ok.store(false, Ordering::SeqCst);

    let err = settings(&harness, Event::SetGeofencing { enabled: true }).unwrap_err();
    assert!(matches!(err, WifiAutoError::GeofenceUnavailable(_)));
    assert!(!harness.store.get_bool(keys::GEOFENCE_ENABLED, true));
}

#[test]
fn permission_revoked_before_location_job_reverts_switch() {
    let harness = Harness::new();
    settings(&harness, Event::SetGeofencing { enabled: true }).unwrap();
    harness.permissions.set(false);

    let err = harness
        .engine
        .handle(Event::JobFired {
            tag: LOCATION_TAG.to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, WifiAutoError::PermissionDenied { .. }));
    assert!(!harness.store.get_bool(keys::GEOFENCE_ENABLED, true));
    assert!(!harness.location.is_subscribed());
}

#[test]
fn location_job_after_disable_does_nothing() {
    let harness = Harness::new();
    settings(&harness, Event::SetGeofencing { enabled: true }).unwrap();
    settings(&harness, Event::SetGeofencing { enabled: false }).unwrap();

    let outcome = harness
        .engine
        .handle(Event::JobFired {
            tag: LOCATION_TAG.to_string(),
        })
        .unwrap();
    assert_eq!(outcome, EventOutcome::LocationRequested { active: false });
    assert_eq!(harness.location.subscribe_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn disabling_twice_is_harmless() {
    let harness = Harness::new();
    settings(&harness, Event::SetGeofencing { enabled: false }).unwrap();
    settings(&harness, Event::SetGeofencing { enabled: false }).unwrap();
    assert_eq!(harness.location.unsubscribe_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn geofence_enabled_implies_region_or_no_permission() {
    let harness = Harness::new();
    let toggles = [true, false, true, true, false, true];

    for (i, enabled) in toggles.into_iter().enumerate() {
        let _ = settings(&harness, Event::SetGeofencing { enabled });
        let _ = harness.engine.handle(Event::JobFired {
            tag: LOCATION_TAG.to_string(),
        });
        #[allow(clippy::cast_precision_loss)]
        let _ = harness.engine.handle(Event::LocationFix {
            latitude: 48.0 + i as f64 / 10.0,
            longitude: 2.3,
        });

        if harness.store.get_bool(keys::GEOFENCE_ENABLED, false) {
            assert!(
                harness.engine.geofence().persisted_center().is_some(),
                "enabled without region after toggle {i}"
            );
        }
    }

    harness.permissions.set(false);
    let _ = settings(&harness, Event::SetGeofencing { enabled: true });
    assert!(!harness.store.get_bool(keys::GEOFENCE_ENABLED, false));
}

// ── Restart ──────────────────────────────────────────────────

fn preset(entries: &[(&str, StoreValue)]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for (key, value) in entries {
        store.set(key, *value).unwrap();
    }
    store
}

fn boot(harness: &Harness) -> BootReport {
    match harness.engine.handle(Event::Boot) {
        Ok(EventOutcome::Booted(report)) => report,
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn boot_rearms_monitoring_from_persisted_switch() {
    let store = preset(&[(keys::MONITORING_ENABLED, StoreValue::Bool(true))]);
    let harness = Harness::with_store(EngineSettings::default(), store);

    let report = boot(&harness);
    assert!(report.monitoring_scheduled);
    assert!(!report.geofence_restored);
    assert!(harness.scheduler.is_scheduled(MONITORING_TAG));
}

#[test]
fn boot_with_everything_off_does_nothing() {
    let harness = Harness::new();
    assert_eq!(boot(&harness), BootReport::default());
    assert!(harness.scheduler.calls().is_empty());
}

#[test]
fn boot_restores_persisted_region_without_new_fix() {
    let store = preset(&[
        (keys::GEOFENCE_ENABLED, StoreValue::Bool(true)),
        (keys::GEOFENCE_LATITUDE, StoreValue::Float(48.8)),
        (keys::GEOFENCE_LONGITUDE, StoreValue::Float(2.3)),
    ]);
    let harness = Harness::with_store(EngineSettings::default(), store);

    let report = boot(&harness);
    assert!(report.geofence_restored);
    let live = harness.geofence.live();
    assert_eq!(live.len(), 1);
    assert!((live[0].center.latitude - 48.8).abs() < f64::EPSILON);
    assert_eq!(harness.location.subscribe_calls.load(Ordering::SeqCst), 0);

    // Restoring again is idempotent.
    boot(&harness);
    assert_eq!(harness.geofence.live().len(), 1);
}

#[test]
fn boot_heals_stale_geofencing_switch() {
    let store = preset(&[(keys::GEOFENCE_ENABLED, StoreValue::Bool(true))]);
    let harness = Harness::with_store(EngineSettings::default(), store);

    assert!(matches!(
        harness.engine.controller().on_restore_geofence(),
        Err(WifiAutoError::StaleConfiguration)
    ));
    assert!(!harness.store.get_bool(keys::GEOFENCE_ENABLED, true));
    assert!(harness.geofence.live().is_empty());

    // A full boot with the healed switch succeeds quietly.
    assert!(!boot(&harness).geofence_restored);
}

#[test]
fn boot_without_permission_disables_geofencing() {
    let store = preset(&[
        (keys::GEOFENCE_ENABLED, StoreValue::Bool(true)),
        (keys::GEOFENCE_LATITUDE, StoreValue::Float(48.8)),
        (keys::GEOFENCE_LONGITUDE, StoreValue::Float(2.3)),
    ]);
    let harness = Harness::with_store(EngineSettings::default(), store);
    harness.permissions.set(false);

    let report = boot(&harness);
    assert!(!report.geofence_restored);
    assert!(!harness.store.get_bool(keys::GEOFENCE_ENABLED, true));
    assert!(harness.store.get(keys::GEOFENCE_LATITUDE).is_none());
    assert_eq!(harness.geofence.register_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unknown_job_is_ignored() {
    let harness = Harness::new();
    let outcome = harness
        .engine
        .handle(Event::JobFired {
            tag: "something.else".to_string(),
        })
        .unwrap();
    assert!(matches!(outcome, EventOutcome::Ignored { .. }));
}
