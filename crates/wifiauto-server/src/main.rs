//! # wifiauto-server
//!
//! Daemon that runs the wifiauto automation engine on a Linux host.
//!
//! This binary provides:
//! - The idle check and geofence automation, driving the radio via `nmcli`
//! - REST API for the switches, status, diagnostic log and provider callbacks
//! - OpenAPI documentation via Swagger UI
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development
//! WIFIAUTO_CONFIG=./config.toml cargo run --package wifiauto-server
//!
//! # Production
//! ./wifiauto-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use wifiauto_core::dispatcher::{Event, EventOutcome};
use wifiauto_core::DaemonConfig;
use wifiauto_server::platform::{NmcliRadio, StaticPermissions};
use wifiauto_server::{api, logging, state};

/// Overrides the configuration file location.
const CONFIG_PATH_ENV: &str = "WIFIAUTO_CONFIG";

fn load_config() -> anyhow::Result<DaemonConfig> {
    let config = match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => DaemonConfig::load_from(&PathBuf::from(path))?,
        None => DaemonConfig::load()?,
    };
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("loading configuration")?;
    logging::init(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting wifiauto-server");

    let radio = Arc::new(NmcliRadio::new(&config.platform.nmcli_path));
    let permissions = Arc::new(StaticPermissions::from_config(&config.platform));
    let (state, dispatcher) = state::assemble(&config, radio, permissions)?;
    tokio::spawn(dispatcher.run());

    match state.events.request(Event::Boot).await {
        Ok(EventOutcome::Booted(report)) => info!(
            monitoring_scheduled = report.monitoring_scheduled,
            geofence_restored = report.geofence_restored,
            "Startup work finished"
        ),
        Ok(other) => warn!(outcome = ?other, "Unexpected startup outcome"),
        Err(e) => error!(error = %e, "Startup work failed"),
    }

    let app = api::create_router(state);
    let listener = TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("binding {}", config.server.bind_address))?;

    info!(address = %config.server.bind_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
