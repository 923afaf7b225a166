//! Daemon tracing setup, driven by the `[logging]` configuration section.
//!
//! With `production = true` events go to JSON files rolled in
//! `logging.directory` and to compact stdout for the journal. Otherwise they
//! go to pretty stdout with span events.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wifiauto_core::{LogRotation, LoggingConfig};

/// Keep the non-blocking writers alive for the lifetime of the program.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static STDOUT_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber described by `config`.
///
/// A non-empty `RUST_LOG` replaces `config.level`.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid, or in production if
/// the log directory cannot be created or a subscriber is already installed.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = env_filter(&config.level)?;
    if config.production {
        init_production(config, filter)
    } else {
        init_development(filter)
    }
}

fn env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    let directive = std::env::var("RUST_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| level.to_string());
    EnvFilter::try_new(&directive).with_context(|| format!("invalid log filter '{directive}'"))
}

const fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}

fn file_appender(config: &LoggingConfig) -> anyhow::Result<RollingFileAppender> {
    prepare_directory(&config.directory)?;
    RollingFileAppender::builder()
        .rotation(rotation(config.rotation))
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .build(&config.directory)
        .with_context(|| format!("opening log files in {}", config.directory.display()))
}

fn prepare_directory(dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))
}

fn init_production(config: &LoggingConfig, filter: EnvFilter) -> anyhow::Result<()> {
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender(config)?);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // The journal adds its own timestamps.
    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .without_time()
        .with_writer(stdout_writer)
        .with_target(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    let _ = FILE_GUARD.set(file_guard);
    let _ = STDOUT_GUARD.set(stdout_guard);
    Ok(())
}

fn init_development(filter: EnvFilter) -> anyhow::Result<()> {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .try_init()
        .context("installing tracing subscriber")
}
