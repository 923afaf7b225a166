//! Unified error types for the wifiauto core library.
//!
//! [`WifiAutoError`] covers every failure mode the automation engine can
//! surface. Module-specific errors ([`ConfigError`](crate::config::ConfigError),
//! [`StoreError`](crate::store::StoreError), [`PortError`](crate::ports::PortError))
//! convert into it at component boundaries.
//!
//! Not every "nothing happened" result is an error: a monitor tick that finds
//! the radio in use, or a geofence notification that arrives while the radio
//! is already on, are reported through outcome enums
//! ([`MonitorOutcome`](crate::monitor::MonitorOutcome),
//! [`TriggerOutcome`](crate::trigger::TriggerOutcome)) instead.
//!
//! # Example
//!
//! ```rust
//! use wifiauto_core::error::{Result, WifiAutoError};
//! use wifiauto_core::ports::Capability;
//!
//! fn require_location(granted: bool) -> Result<()> {
//!     if !granted {
//!         return Err(WifiAutoError::PermissionDenied {
//!             capability: Capability::FineLocation,
//!         });
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::ports::Capability;

/// The unified error type for all wifiauto operations.
#[derive(Debug, Error)]
pub enum WifiAutoError {
    // =========================================================================
    // AUTOMATION ERRORS
    // =========================================================================
    /// A platform capability required by the operation has not been granted.
    #[error("Permission denied: {capability} has not been granted")]
    PermissionDenied {
        /// The missing capability.
        capability: Capability,
    },

    /// The geofencing service rejected a registration, usually because
    /// location services are disabled on the device.
    #[error("Geofence unavailable: {0}")]
    GeofenceUnavailable(String),

    /// Geofencing is enabled but no region was ever persisted.
    #[error("Geofencing was enabled without a known region; the setting has been reset")]
    StaleConfiguration,

    /// A location fix carried coordinates outside the valid range.
    #[error("Invalid coordinates: latitude={latitude}, longitude={longitude}")]
    InvalidCoordinates {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
    },

    // =========================================================================
    // PLATFORM ERRORS
    // =========================================================================
    /// The location provider refused or failed a subscription.
    #[error("Location service unavailable: {0}")]
    LocationUnavailable(String),

    /// The job scheduler refused a schedule or cancel request.
    #[error("Job scheduler failed: {0}")]
    SchedulerFailed(String),

    /// The event dispatcher has shut down and can no longer accept events.
    #[error("Event dispatcher is not running")]
    DispatcherClosed,

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration file exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // PERSISTENCE & I/O ERRORS
    // =========================================================================
    /// Persisted state could not be read or written.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for wifiauto operations.
pub type Result<T> = std::result::Result<T, WifiAutoError>;

impl WifiAutoError {
    /// Returns `true` if this error comes from a platform collaborator.
    #[inline]
    #[must_use]
    pub const fn is_platform_error(&self) -> bool {
        matches!(
            self,
            Self::LocationUnavailable(_) | Self::SchedulerFailed(_) | Self::GeofenceUnavailable(_)
        )
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error is related to I/O or persistence.
    #[inline]
    #[must_use]
    pub const fn is_io_error(&self) -> bool {
        matches!(self, Self::PersistenceError(_) | Self::IoError(_))
    }

    /// Returns `true` if this error represents an expected operational state
    /// rather than a fault.
    ///
    /// Location services being switched off by the user, or a stale
    /// geofencing flag that has already been healed, are normal conditions.
    #[inline]
    #[must_use]
    pub const fn is_expected_state(&self) -> bool {
        matches!(self, Self::GeofenceUnavailable(_) | Self::StaleConfiguration)
    }

    /// Returns `true` if the next scheduled tick or location fix naturally
    /// retries the failed operation.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::GeofenceUnavailable(_) | Self::LocationUnavailable(_)
        )
    }

    /// Returns `true` if the UI-facing geofencing toggle must be reverted to
    /// "off" when this error is returned while enabling it.
    #[inline]
    #[must_use]
    pub const fn reverts_geofencing(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::GeofenceUnavailable(_)
        )
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidCoordinates { .. } => 400,
            Self::PermissionDenied { .. } => 403,
            Self::ConfigNotFound(_) => 404,
            Self::StaleConfiguration => 409,
            Self::ConfigParseError(_) | Self::ConfigValidationError(_) => 422,
            Self::PersistenceError(_) | Self::IoError(_) => 500,
            Self::GeofenceUnavailable(_)
            | Self::LocationUnavailable(_)
            | Self::SchedulerFailed(_)
            | Self::DispatcherClosed => 503,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::GeofenceUnavailable(_) => "GEOFENCE_UNAVAILABLE",
            Self::StaleConfiguration => "STALE_CONFIGURATION",
            Self::InvalidCoordinates { .. } => "INVALID_COORDINATES",
            Self::LocationUnavailable(_) => "LOCATION_UNAVAILABLE",
            Self::SchedulerFailed(_) => "SCHEDULER_FAILED",
            Self::DispatcherClosed => "DISPATCHER_CLOSED",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::config::ConfigError> for WifiAutoError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path),
            ConfigError::LoadError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

impl From<crate::store::StoreError> for WifiAutoError {
    fn from(err: crate::store::StoreError) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoErr, ErrorKind};

    #[test]
    fn test_platform_error_classification() {
        assert!(WifiAutoError::SchedulerFailed("runtime shut down".into()).is_platform_error());
        assert!(WifiAutoError::GeofenceUnavailable("location off".into()).is_platform_error());
        assert!(!WifiAutoError::StaleConfiguration.is_platform_error());
    }

    #[test]
    fn test_config_error_classification() {
        assert!(WifiAutoError::ConfigNotFound(PathBuf::from("/test")).is_config_error());
        assert!(WifiAutoError::ConfigParseError("syntax".into()).is_config_error());
        assert!(!WifiAutoError::StaleConfiguration.is_config_error());
    }

    #[test]
    fn test_expected_state() {
        assert!(WifiAutoError::GeofenceUnavailable("off".into()).is_expected_state());
        assert!(WifiAutoError::StaleConfiguration.is_expected_state());
        assert!(!WifiAutoError::PermissionDenied {
            capability: Capability::FineLocation
        }
        .is_expected_state());
    }

    #[test]
    fn test_reverts_geofencing() {
        assert!(WifiAutoError::PermissionDenied {
            capability: Capability::FineLocation
        }
        .reverts_geofencing());
        assert!(WifiAutoError::GeofenceUnavailable("settings".into()).reverts_geofencing());
        assert!(!WifiAutoError::SchedulerFailed("busy".into()).reverts_geofencing());
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(
            WifiAutoError::PermissionDenied {
                capability: Capability::FineLocation
            }
            .http_status_code(),
            403
        );
        assert_eq!(
            WifiAutoError::InvalidCoordinates {
                latitude: 91.0,
                longitude: 0.0
            }
            .http_status_code(),
            400
        );
        assert_eq!(WifiAutoError::StaleConfiguration.http_status_code(), 409);
        assert_eq!(
            WifiAutoError::GeofenceUnavailable("off".into()).http_status_code(),
            503
        );
        assert_eq!(
            WifiAutoError::PersistenceError("disk".into()).http_status_code(),
            500
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            WifiAutoError::StaleConfiguration.error_code(),
            "STALE_CONFIGURATION"
        );
        assert_eq!(
            WifiAutoError::DispatcherClosed.error_code(),
            "DISPATCHER_CLOSED"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoErr::new(ErrorKind::NotFound, "file not found");
        let err: WifiAutoError = io_err.into();
        assert!(matches!(err, WifiAutoError::IoError(_)));
        assert!(err.is_io_error());
    }

    #[test]
    fn test_error_display_messages() {
        let err = WifiAutoError::PermissionDenied {
            capability: Capability::FineLocation,
        };
        assert!(err.to_string().contains("fine location"));

        let err = WifiAutoError::GeofenceUnavailable("location services disabled".into());
        assert!(err.to_string().contains("location services disabled"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<WifiAutoError>();
        assert_sync::<WifiAutoError>();
    }
}
