//! Linux adapters for the engine's platform ports.
//!
//! - [`NmcliRadio`] drives the Wi-Fi radio through NetworkManager's `nmcli`
//! - [`PushLocationService`] and [`PublishedGeofenceService`] stand in for a
//!   location provider that lives outside this process: the subscription and
//!   the registered region are published over HTTP, and the provider pushes
//!   fixes and region notifications back through the API
//! - [`StaticPermissions`] answers capability checks from configuration
//! - [`LogIndicator`] reports the monitoring indicator through `tracing`

use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};
use wifiauto_core::config::PlatformConfig;
use wifiauto_core::dispatcher::EventSender;
use wifiauto_core::ports::{
    AssociationState, Attachment, Capability, GeofenceService, KeepAliveIndicator,
    LocationService, PermissionQuery, PortError, PortResult, RadioControl, Transport,
};
use wifiauto_core::types::{GeofenceRegion, LocationProfile};

// ============================================================================
// nmcli radio
// ============================================================================

/// Failure running `nmcli`.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that was run.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The program exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    Status {
        /// Program that was run.
        program: String,
        /// Exit status.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The program printed something unexpected.
    #[error("unexpected output from {program}: {output}")]
    Output {
        /// Program that was run.
        program: String,
        /// What it printed.
        output: String,
    },
}

impl From<CommandError> for PortError {
    fn from(err: CommandError) -> Self {
        let message = err.to_string();
        match err {
            CommandError::Spawn { ref source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::Unavailable(message)
            }
            _ => Self::Failed(message),
        }
    }
}

/// [`RadioControl`] backed by NetworkManager.
#[derive(Debug, Clone)]
pub struct NmcliRadio {
    program: PathBuf,
}

impl NmcliRadio {
    /// Use the `nmcli` binary at `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<String, CommandError> {
        let program = self.program.display().to_string();
        debug!(program = %program, ?args, "Running command");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| CommandError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CommandError::Status {
                program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl RadioControl for NmcliRadio {
    fn is_enabled(&self) -> PortResult<bool> {
        let output = self.run(&["radio", "wifi"])?;
        match output.trim() {
            "enabled" => Ok(true),
            "disabled" => Ok(false),
            other => Err(CommandError::Output {
                program: self.program.display().to_string(),
                output: other.to_string(),
            }
            .into()),
        }
    }

    fn set_enabled(&self, enabled: bool) -> PortResult<()> {
        let state = if enabled { "on" } else { "off" };
        self.run(&["radio", "wifi", state])?;
        info!(enabled, "Wi-Fi radio switched");
        Ok(())
    }

    fn current_attachment(&self) -> PortResult<Attachment> {
        let output = self.run(&["-t", "-f", "TYPE,STATE,CONNECTION", "device", "status"])?;
        Ok(parse_device_status(&output))
    }
}

/// Split a terse `nmcli` line on unescaped colons.
fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn transport_of(device_type: &str) -> Option<Transport> {
    match device_type {
        "wifi" => Some(Transport::Wifi),
        "ethernet" => Some(Transport::Ethernet),
        "gsm" | "cdma" | "modem" => Some(Transport::Cellular),
        "loopback" | "wifi-p2p" => None,
        _ => Some(Transport::Other),
    }
}

// `connected (externally)` is a connection NetworkManager did not start
// itself but still carries traffic.
fn association_of(state: &str) -> AssociationState {
    if state == "connected" || state.starts_with("connected ") {
        AssociationState::Completed
    } else if state.starts_with("connecting") {
        AssociationState::Associating
    } else if state == "disconnected" {
        AssociationState::Disconnected
    } else {
        AssociationState::Unknown
    }
}

/// Derive the active attachment from `nmcli -t -f TYPE,STATE,CONNECTION
/// device status`.
///
/// NetworkManager lists devices in priority order, so the first connected
/// device carries the active connection. Without one, a Wi-Fi device that is
/// still connecting is reported as associating.
#[must_use]
pub fn parse_device_status(output: &str) -> Attachment {
    let devices: Vec<(Transport, AssociationState, Option<String>)> = output
        .lines()
        .filter_map(|line| {
            let fields = split_terse(line);
            let transport = transport_of(fields.first()?)?;
            let association = association_of(fields.get(1)?);
            let network = fields
                .get(2)
                .filter(|name| !name.is_empty() && name.as_str() != "--")
                .cloned();
            Some((transport, association, network))
        })
        .collect();

    let active = devices
        .iter()
        .find(|(_, association, _)| *association == AssociationState::Completed)
        .or_else(|| {
            devices.iter().find(|(transport, association, _)| {
                *transport == Transport::Wifi && *association == AssociationState::Associating
            })
        });

    active.map_or_else(Attachment::detached, |(transport, association, network)| {
        Attachment {
            transport: *transport,
            association: *association,
            network: network.clone(),
        }
    })
}

// ============================================================================
// Push-based location and geofence services
// ============================================================================

struct Subscription {
    profile: LocationProfile,
    target: EventSender,
    expires_at: Instant,
}

/// [`LocationService`] fed by an external provider over HTTP.
///
/// A subscription lives for the profile's expiration time; fixes pushed after
/// that are refused as they would be by a platform provider.
pub struct PushLocationService {
    available: bool,
    subscription: Mutex<Option<Subscription>>,
}

impl PushLocationService {
    /// Create the service. When `available` is false every request fails as
    /// if location services were switched off.
    #[must_use]
    pub const fn new(available: bool) -> Self {
        Self {
            available,
            subscription: Mutex::new(None),
        }
    }

    /// Where to deliver a fix right now, if a subscription is live.
    pub fn target(&self) -> Option<EventSender> {
        let mut subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match subscription.as_ref() {
            Some(active) if Instant::now() < active.expires_at => Some(active.target.clone()),
            Some(_) => {
                debug!("Location subscription expired");
                *subscription = None;
                None
            }
            None => None,
        }
    }

    /// The live subscription's profile.
    pub fn active_profile(&self) -> Option<LocationProfile> {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscription
            .as_ref()
            .filter(|active| Instant::now() < active.expires_at)
            .map(|active| active.profile)
    }

    fn ensure_available(&self) -> PortResult<()> {
        if self.available {
            Ok(())
        } else {
            Err(PortError::Unavailable(
                "no location provider available".to_string(),
            ))
        }
    }
}

impl LocationService for PushLocationService {
    fn check_settings(&self, _profile: &LocationProfile) -> PortResult<()> {
        self.ensure_available()
    }

    fn subscribe(&self, profile: &LocationProfile, target: EventSender) -> PortResult<()> {
        self.ensure_available()?;
        let expires_at = Instant::now() + Duration::from_millis(profile.expiration_millis);
        *self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Subscription {
            profile: *profile,
            target,
            expires_at,
        });
        info!(
            expiration_millis = profile.expiration_millis,
            "Location subscription opened"
        );
        Ok(())
    }

    fn unsubscribe(&self) -> PortResult<()> {
        *self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// [`GeofenceService`] that publishes the registered region for an external
/// provider to watch.
pub struct PublishedGeofenceService {
    available: bool,
    registration: Mutex<Option<(GeofenceRegion, EventSender)>>,
}

impl PublishedGeofenceService {
    /// Create the service. When `available` is false registration fails with
    /// the "geofencing not available" status.
    #[must_use]
    pub const fn new(available: bool) -> Self {
        Self {
            available,
            registration: Mutex::new(None),
        }
    }

    /// The registered region.
    pub fn region(&self) -> Option<GeofenceRegion> {
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(region, _)| region.clone())
    }

    /// Where the registered region's notifications go.
    pub fn target(&self) -> Option<EventSender> {
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, target)| target.clone())
    }
}

impl GeofenceService for PublishedGeofenceService {
    fn register(&self, region: &GeofenceRegion, target: EventSender) -> PortResult<()> {
        if !self.available {
            return Err(PortError::Rejected {
                code: 1000,
                reason: "geofencing not available".to_string(),
            });
        }
        *self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some((region.clone(), target));
        Ok(())
    }

    fn unregister(&self, region_id: &str) -> PortResult<()> {
        let mut registration = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if registration
            .as_ref()
            .is_some_and(|(region, _)| region.id == region_id)
        {
            *registration = None;
        }
        Ok(())
    }
}

// ============================================================================
// Permissions and indicator
// ============================================================================

/// Capability grants from configuration.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermissions {
    fine_location: bool,
}

impl StaticPermissions {
    /// Grants as configured in `[platform]`.
    #[must_use]
    pub const fn from_config(config: &PlatformConfig) -> Self {
        Self {
            fine_location: config.location_permission,
        }
    }
}

impl PermissionQuery for StaticPermissions {
    fn is_granted(&self, capability: Capability) -> bool {
        match capability {
            Capability::FineLocation => self.fine_location,
        }
    }
}

/// Monitoring indicator rendered as log lines.
#[derive(Debug, Default)]
pub struct LogIndicator {
    shown: AtomicBool,
}

impl LogIndicator {
    /// Whether the indicator is showing.
    pub fn is_shown(&self) -> bool {
        self.shown.load(Ordering::Acquire)
    }
}

impl KeepAliveIndicator for LogIndicator {
    fn show(&self) {
        if !self.shown.swap(true, Ordering::AcqRel) {
            info!("Wi-Fi monitoring active");
        }
    }

    fn hide(&self) {
        if self.shown.swap(false, Ordering::AcqRel) {
            info!("Wi-Fi monitoring stopped");
        }
    }
}
