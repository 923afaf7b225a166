//! Daemon configuration.
//!
//! Loaded with the `config` crate from a TOML file layered with environment
//! overrides, then validated:
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0:3000"
//!
//! [logging]
//! production = true
//! directory = "/var/log/wifiauto"
//! level = "info"
//! rotation = "daily"
//!
//! [monitoring]
//! interval_minutes = 15
//!
//! [grace]
//! duration_minutes = 15
//! activate_on = ["geofence_enable"]
//!
//! [geofence]
//! radius_meters = 100.0
//! dwell_delay_millis = 120000
//! ```
//!
//! Every key can be overridden from the environment with the `WIFIAUTO__`
//! prefix and `__` between sections, e.g. `WIFIAUTO__SERVER__BIND_ADDRESS`.
//!
//! This is static daemon configuration. The two user-facing switches live in
//! the persisted [`store`](crate::store) instead.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::event_log::{DEFAULT_MAX_BYTES, EVENT_LOG_FILE_NAME};
use crate::grace::GracePolicy;
use crate::monitor::DEFAULT_INTERVAL;
use crate::types::{LocationProfile, RegionSettings};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "WIFIAUTO";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The sources could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] ::config::ConfigError),

    /// A value is out of range.
    #[error("Invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted key of the offending value.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several values are out of range.
    #[error("{} configuration errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// `[server]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP API listens on.
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// How often the daemon log file is rolled over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    /// A new file every hour.
    Hourly,
    /// A new file every day.
    #[default]
    Daily,
    /// One file that is never rolled.
    Never,
}

/// `[logging]`: the daemon's own tracing output, not the diagnostic log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// JSON files in `directory` plus compact stdout, instead of pretty stdout.
    pub production: bool,
    /// Where production log files are written.
    pub directory: PathBuf,
    /// File name prefix of production log files.
    pub file_prefix: String,
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Roll-over period of production log files.
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            production: false,
            directory: log_directory(),
            file_prefix: "wifiauto".to_string(),
            level: "info".to_string(),
            rotation: LogRotation::default(),
        }
    }
}

/// `[storage]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Persisted switches, region center and grace window.
    pub state_file: PathBuf,
    /// User-facing diagnostic log.
    pub event_log: PathBuf,
    /// Size past which the diagnostic log is emptied.
    pub event_log_max_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let dir = data_directory();
        Self {
            state_file: dir.join("state.toml"),
            event_log: dir.join(EVENT_LOG_FILE_NAME),
            event_log_max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

/// `[monitoring]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Minutes between idle checks.
    pub interval_minutes: u32,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_minutes: u32::try_from(DEFAULT_INTERVAL.as_secs() / 60).unwrap_or(15),
        }
    }
}

impl MonitoringConfig {
    /// Interval as a [`Duration`].
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_minutes) * 60)
    }
}

/// `[platform]`: how the Linux adapters reach the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// NetworkManager command line tool.
    pub nmcli_path: PathBuf,
    /// Whether the daemon may use the device location.
    pub location_permission: bool,
    /// Whether a location provider is available at all.
    pub location_available: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            nmcli_path: PathBuf::from("nmcli"),
            location_permission: true,
            location_available: true,
        }
    }
}

// ============================================================================
// DaemonConfig
// ============================================================================

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// HTTP server.
    pub server: ServerConfig,
    /// Daemon tracing output.
    pub logging: LoggingConfig,
    /// File locations.
    pub storage: StorageConfig,
    /// Idle check schedule.
    pub monitoring: MonitoringConfig,
    /// Grace window policy.
    pub grace: GracePolicy,
    /// Region shape.
    pub geofence: RegionSettings,
    /// Location subscription profile.
    pub location: LocationProfile,
    /// Platform adapters.
    pub platform: PlatformConfig,
}

impl DaemonConfig {
    /// Load from the default file location if it exists, plus environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(&default_config_path(), false)
    }

    /// Load from `path`, which must exist, plus environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if `path` does not exist, or any
    /// parse or validation error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::build(path, true)
    }

    fn build(path: &Path, required: bool) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), required, "Loading configuration");
        let config: Self = ::config::Config::builder()
            .add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document directly, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = ::config::Config::builder()
            .add_source(::config::File::from_str(content, ::config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value for range errors.
    ///
    /// # Errors
    ///
    /// Returns the single error found, or
    /// [`ConfigError::MultipleValidationErrors`] listing all of them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ConfigError::invalid(
                "server.bind_address",
                format!("'{}' is not a socket address", self.server.bind_address),
            ));
        }
        if self.logging.level.trim().is_empty() {
            errors.push(ConfigError::invalid("logging.level", "must not be empty"));
        }
        if self.logging.production && self.logging.file_prefix.is_empty() {
            errors.push(ConfigError::invalid(
                "logging.file_prefix",
                "must not be empty in production",
            ));
        }
        if self.storage.event_log_max_bytes == 0 {
            errors.push(ConfigError::invalid(
                "storage.event_log_max_bytes",
                "must be greater than zero",
            ));
        }
        if self.monitoring.interval_minutes == 0 {
            errors.push(ConfigError::invalid(
                "monitoring.interval_minutes",
                "must be at least one minute",
            ));
        }
        if !(self.geofence.radius_meters.is_finite() && self.geofence.radius_meters > 0.0) {
            errors.push(ConfigError::invalid(
                "geofence.radius_meters",
                "must be a positive number",
            ));
        }
        if self.location.interval_millis == 0 {
            errors.push(ConfigError::invalid(
                "location.interval_millis",
                "must be greater than zero",
            ));
        }
        if self.location.fastest_interval_millis > self.location.interval_millis {
            errors.push(ConfigError::invalid(
                "location.fastest_interval_millis",
                "must not exceed location.interval_millis",
            ));
        }
        if self.location.expiration_millis == 0 {
            errors.push(ConfigError::invalid(
                "location.expiration_millis",
                "must be greater than zero",
            ));
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}

/// Default configuration file path.
#[must_use]
pub fn default_config_path() -> PathBuf {
    // On the device: /etc/wifiauto/config.toml
    // For development: ~/.config/wifiauto/config.toml
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/etc/wifiauto/config.toml")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "wifiauto").map_or_else(
            || PathBuf::from("config.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }
}

/// Default directory for persisted state and the diagnostic log.
#[must_use]
pub fn data_directory() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/lib/wifiauto")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "wifiauto")
            .map_or_else(|| PathBuf::from("./data"), |dirs| dirs.data_dir().to_path_buf())
    }
}

/// Default directory for the daemon's own log files.
#[must_use]
pub fn log_directory() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/log/wifiauto")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "wifiauto").map_or_else(
            || PathBuf::from("./logs"),
            |dirs| dirs.data_dir().join("logs"),
        )
    }
}
