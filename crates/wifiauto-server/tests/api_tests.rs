//! HTTP surface against a fake radio and temporary storage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;
use wifiauto_core::ports::{
    AssociationState, Attachment, PortError, PortResult, RadioControl, Transport,
};
use wifiauto_core::DaemonConfig;
use wifiauto_server::api::create_router;
use wifiauto_server::platform::StaticPermissions;
use wifiauto_server::state::assemble;

// ── Fake radio ───────────────────────────────────────────────

struct FakeRadio {
    enabled: AtomicBool,
    attachment: Mutex<Attachment>,
    fail: AtomicBool,
}

impl FakeRadio {
    fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            attachment: Mutex::new(Attachment {
                transport: Transport::Wifi,
                association: AssociationState::Completed,
                network: Some("HomeNetwork".to_string()),
            }),
            fail: AtomicBool::new(false),
        }
    }

    fn attach(&self, attachment: Attachment) {
        *self.attachment.lock().unwrap() = attachment;
    }

    fn check(&self) -> PortResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(PortError::Unavailable("nmcli not installed".to_string()))
        } else {
            Ok(())
        }
    }
}

impl RadioControl for FakeRadio {
    fn is_enabled(&self) -> PortResult<bool> {
        self.check()?;
        Ok(self.enabled.load(Ordering::SeqCst))
    }

    fn set_enabled(&self, enabled: bool) -> PortResult<()> {
        self.check()?;
        self.enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    fn current_attachment(&self) -> PortResult<Attachment> {
        self.check()?;
        Ok(self.attachment.lock().unwrap().clone())
    }
}

fn cellular() -> Attachment {
    Attachment {
        transport: Transport::Cellular,
        association: AssociationState::Disconnected,
        network: None,
    }
}

// ── Setup ────────────────────────────────────────────────────

struct TestApp {
    server: TestServer,
    radio: Arc<FakeRadio>,
    _dir: TempDir,
}

fn test_config(dir: &TempDir) -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.storage.state_file = dir.path().join("state.toml");
    config.storage.event_log = dir.path().join("events.log");
    config
}

fn spawn_app(configure: impl FnOnce(&mut DaemonConfig)) -> TestApp {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    configure(&mut config);

    let radio = Arc::new(FakeRadio::new());
    let permissions = Arc::new(StaticPermissions::from_config(&config.platform));
    let (state, dispatcher) = assemble(&config, radio.clone(), permissions).unwrap();
    tokio::spawn(dispatcher.run());

    TestApp {
        server: TestServer::new(create_router(state)).unwrap(),
        radio,
        _dir: dir,
    }
}

async fn wait_for_subscription(server: &TestServer) {
    for _ in 0..200 {
        let body: Value = server.get("/api/location").await.json();
        if body["active"] == json!(true) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("location subscription never became active");
}

async fn log_entries(server: &TestServer) -> Vec<String> {
    let body: Value = server.get("/api/log").await.json();
    body["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e.as_str().unwrap().to_string())
        .collect()
}

// ── System ───────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_ok() {
    let app = spawn_app(|_| {});
    let response = app.server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["dispatcher_running"], true);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = spawn_app(|_| {});
    let body: Value = app.server.get("/api/openapi.json").await.json();
    assert_eq!(body["info"]["title"], "wifiauto API");
    assert!(body["paths"]["/api/events/geofence"].is_object());
}

#[tokio::test]
async fn status_tolerates_radio_failure() {
    let app = spawn_app(|_| {});
    app.radio.fail.store(true, Ordering::SeqCst);

    let body: Value = app.server.get("/api/status").await.json();
    assert!(body["engine"]["radio_enabled"].is_null());
    assert!(body["engine"]["attachment"].is_null());
    assert_eq!(body["engine"]["grace_active"], false);
}

// ── Settings ─────────────────────────────────────────────────

#[tokio::test]
async fn switches_default_to_off() {
    let app = spawn_app(|_| {});
    let body: Value = app.server.get("/api/settings").await.json();
    assert_eq!(
        body,
        json!({ "monitoring_enabled": false, "geofence_enabled": false })
    );
}

#[tokio::test]
async fn enabling_monitoring_is_logged() {
    let app = spawn_app(|_| {});
    let response = app
        .server
        .put("/api/settings/monitoring")
        .json(&json!({ "enabled": true }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["monitoring_enabled"], true);

    let entries = log_entries(&app.server).await;
    assert!(entries
        .iter()
        .any(|e| e.ends_with("Setup Wi-Fi monitoring: enabled")));
}

#[tokio::test]
async fn geofencing_without_permission_is_forbidden_and_reverted() {
    let app = spawn_app(|config| config.platform.location_permission = false);

    let response = app
        .server
        .put("/api/settings/geofencing")
        .json(&json!({ "enabled": true }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error"], "permission_denied");

    let settings: Value = app.server.get("/api/settings").await.json();
    assert_eq!(settings["geofence_enabled"], false);
}

#[tokio::test]
async fn geofencing_without_location_provider_is_unavailable() {
    let app = spawn_app(|config| config.platform.location_available = false);

    let response = app
        .server
        .put("/api/settings/geofencing")
        .json(&json!({ "enabled": true }))
        .await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let settings: Value = app.server.get("/api/settings").await.json();
    assert_eq!(settings["geofence_enabled"], false);
}

// ── Events ───────────────────────────────────────────────────

#[tokio::test]
async fn tick_disables_idle_radio() {
    let app = spawn_app(|_| {});
    app.radio.attach(cellular());

    let body: Value = app.server.post("/api/events/tick").await.json();
    assert_eq!(body["result"], "disabled");
    assert!(!app.radio.enabled.load(Ordering::SeqCst));

    let entries = log_entries(&app.server).await;
    assert!(entries.iter().any(|e| e.ends_with("Wi-Fi has been disabled")));
}

#[tokio::test]
async fn boot_with_nothing_enabled_reports_nothing() {
    let app = spawn_app(|_| {});
    let body: Value = app.server.post("/api/events/boot").await.json();
    assert_eq!(
        body,
        json!({ "monitoring_scheduled": false, "geofence_restored": false })
    );
}

#[tokio::test]
async fn location_fix_without_subscription_conflicts() {
    let app = spawn_app(|_| {});
    let response = app
        .server
        .post("/api/events/location")
        .json(&json!({ "latitude": 48.8, "longitude": 2.3 }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn no_region_until_a_fix_arrives() {
    let app = spawn_app(|_| {});
    app.server
        .get("/api/geofence")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stale_geofence_notification_is_ignored() {
    let app = spawn_app(|_| {});
    app.radio.enabled.store(false, Ordering::SeqCst);

    let body: Value = app
        .server
        .post("/api/events/geofence")
        .json(&json!({ "transition": "enter", "region_ids": ["wifiauto"] }))
        .await
        .json();
    assert_eq!(body["result"], "feature_disabled");
    assert!(!app.radio.enabled.load(Ordering::SeqCst));
}

#[tokio::test]
async fn full_geofence_flow() {
    let app = spawn_app(|_| {});

    app.server
        .put("/api/settings/geofencing")
        .json(&json!({ "enabled": true }))
        .await
        .assert_status_ok();
    wait_for_subscription(&app.server).await;

    let fix: Value = app
        .server
        .post("/api/events/location")
        .json(&json!({ "latitude": 48.8, "longitude": 2.3 }))
        .await
        .json();
    assert_eq!(fix["result"], "registered");

    let region: Value = app.server.get("/api/geofence").await.json();
    assert_eq!(region["id"], "wifiauto");
    assert_eq!(region["center"], json!({ "latitude": 48.8, "longitude": 2.3 }));
    assert_eq!(region["transitions"], json!(["enter", "dwell"]));

    // Later fixes within the subscription move the region.
    let fix: Value = app
        .server
        .post("/api/events/location")
        .json(&json!({ "latitude": 48.9, "longitude": 2.4 }))
        .await
        .json();
    assert_eq!(fix["result"], "registered");
    let region: Value = app.server.get("/api/geofence").await.json();
    assert_eq!(region["center"]["latitude"], 48.9);

    app.radio.enabled.store(false, Ordering::SeqCst);
    let trigger: Value = app
        .server
        .post("/api/events/geofence")
        .json(&json!({ "transition": "dwell", "region_ids": ["wifiauto"] }))
        .await
        .json();
    assert_eq!(trigger["result"], "radio_enabled");
    assert!(app.radio.enabled.load(Ordering::SeqCst));

    let status: Value = app.server.get("/api/status").await.json();
    assert_eq!(status["engine"]["grace_active"], true);
    assert_eq!(status["engine"]["settings"]["geofence_enabled"], true);

    // The grace window keeps the idle check away.
    app.radio.attach(cellular());
    let tick: Value = app.server.post("/api/events/tick").await.json();
    assert_eq!(tick["result"], "grace_active");

    app.server
        .put("/api/settings/geofencing")
        .json(&json!({ "enabled": false }))
        .await
        .assert_status_ok();
    app.server
        .get("/api/geofence")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// ── Log ──────────────────────────────────────────────────────

#[tokio::test]
async fn log_can_be_cleared() {
    let app = spawn_app(|_| {});
    app.server
        .put("/api/settings/monitoring")
        .json(&json!({ "enabled": false }))
        .await
        .assert_status_ok();
    assert!(!log_entries(&app.server).await.is_empty());

    app.server
        .delete("/api/log")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    assert!(log_entries(&app.server).await.is_empty());
}
