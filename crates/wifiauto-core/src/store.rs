//! Persisted key/value state shared between components.
//!
//! The engine only ever stores a handful of scalar values ([`keys`]). Each
//! key is independently readable and writable, and [`ConfigStore::apply`]
//! commits a batch of edits atomically so that, for example, a region's
//! latitude and longitude can never be observed half-written.
//!
//! Two backends are provided:
//! - [`MemoryStore`] for embedding and tests
//! - [`FileStore`], a TOML file rewritten through a temp file and rename

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Well-known keys.
pub mod keys {
    /// Master switch for the periodic disable behaviour.
    pub const MONITORING_ENABLED: &str = "monitoring_enabled";
    /// Master switch for the location-based enable behaviour.
    pub const GEOFENCE_ENABLED: &str = "geofence_enabled";
    /// Latitude of the registered region center.
    pub const GEOFENCE_LATITUDE: &str = "geofence_latitude";
    /// Longitude of the registered region center.
    pub const GEOFENCE_LONGITUDE: &str = "geofence_longitude";
    /// End of the grace window, in epoch milliseconds.
    pub const GRACE_PERIOD_EXPIRES_AT: &str = "grace_period_expires_at";
}

/// Errors from store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The state file could not be read.
    #[error("Failed to read state file {path}: {source}")]
    ReadError {
        /// Path of the state file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The state file could not be written.
    #[error("Failed to write state file {path}: {source}")]
    WriteError {
        /// Path of the state file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The state file is not valid TOML.
    #[error("Failed to parse state file {path}: {source}")]
    ParseError {
        /// Path of the state file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// The in-memory state could not be serialized.
    #[error("Failed to serialize state: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Store handle shared between components.
pub type SharedStore = Arc<dyn ConfigStore>;

/// A scalar stored under a key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer (timestamps).
    Int(i64),
    /// Floating point (coordinates).
    Float(f64),
}

/// One change in an atomic batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Edit<'a> {
    /// Write `value` under the key.
    Set(&'a str, StoreValue),
    /// Delete the key. Deleting a missing key is a no-op.
    Remove(&'a str),
}

/// Persisted key/value configuration.
pub trait ConfigStore: Send + Sync {
    /// Read the raw value under `key`.
    fn get(&self, key: &str) -> Option<StoreValue>;

    /// Apply all `edits` atomically: either every edit is persisted or none.
    fn apply(&self, edits: &[Edit<'_>]) -> StoreResult<()>;

    /// Atomic read-modify-write of a single key. `f` receives the current
    /// value and returns the new one (`None` deletes the key). Returns the
    /// value that was stored.
    fn update(
        &self,
        key: &str,
        f: &dyn Fn(Option<StoreValue>) -> Option<StoreValue>,
    ) -> StoreResult<Option<StoreValue>>;

    /// Write a single key.
    fn set(&self, key: &str, value: StoreValue) -> StoreResult<()> {
        self.apply(&[Edit::Set(key, value)])
    }

    /// Delete a single key.
    fn remove(&self, key: &str) -> StoreResult<()> {
        self.apply(&[Edit::Remove(key)])
    }

    /// Read a boolean, falling back to `default` when absent or mistyped.
    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(StoreValue::Bool(value)) => value,
            _ => default,
        }
    }

    /// Read a float. Integers are widened.
    #[allow(clippy::cast_precision_loss)]
    fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            StoreValue::Float(value) => Some(value),
            StoreValue::Int(value) => Some(value as f64),
            StoreValue::Bool(_) => None,
        }
    }

    /// Read an integer.
    fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            StoreValue::Int(value) => Some(value),
            _ => None,
        }
    }
}

/// The two master switches, read together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Settings {
    /// Periodic disable behaviour is active.
    pub monitoring_enabled: bool,
    /// Location-based enable behaviour is active.
    pub geofence_enabled: bool,
}

impl Settings {
    /// Read both switches from `store`. Missing keys default to `false`.
    pub fn read(store: &dyn ConfigStore) -> Self {
        Self {
            monitoring_enabled: store.get_bool(keys::MONITORING_ENABLED, false),
            geofence_enabled: store.get_bool(keys::GEOFENCE_ENABLED, false),
        }
    }
}

type Entries = BTreeMap<String, StoreValue>;

fn apply_edits(entries: &mut Entries, edits: &[Edit<'_>]) {
    for edit in edits {
        match *edit {
            Edit::Set(key, value) => {
                entries.insert(key.to_string(), value);
            }
            Edit::Remove(key) => {
                entries.remove(key);
            }
        }
    }
}

fn update_entry(
    entries: &mut Entries,
    key: &str,
    f: &dyn Fn(Option<StoreValue>) -> Option<StoreValue>,
) -> Option<StoreValue> {
    let next = f(entries.get(key).copied());
    match next {
        Some(value) => {
            entries.insert(key.to_string(), value);
        }
        None => {
            entries.remove(key);
        }
    }
    next
}

// ============================================================================
// MemoryStore
// ============================================================================

/// Volatile store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Entries>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str) -> Option<StoreValue> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).copied()
    }

    fn apply(&self, edits: &[Edit<'_>]) -> StoreResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        apply_edits(&mut entries, edits);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        f: &dyn Fn(Option<StoreValue>) -> Option<StoreValue>,
    ) -> StoreResult<Option<StoreValue>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(update_entry(&mut entries, key, f))
    }
}

// ============================================================================
// FileStore
// ============================================================================

/// Durable store backed by a TOML file.
///
/// All writes go through a single mutex; the file is rewritten in full to a
/// sibling temp file and renamed into place, so a crash leaves either the old
/// or the new contents.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl FileStore {
    /// Open the store at `path`, loading existing contents. A missing file
    /// starts empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| {
                StoreError::ReadError {
                    path: path.clone(),
                    source,
                }
            })?;
            toml::from_str(&content).map_err(|source| StoreError::ParseError {
                path: path.clone(),
                source,
            })?
        } else {
            debug!(path = %path.display(), "State file not found, starting empty");
            Entries::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &Entries) -> StoreResult<()> {
        let content = toml::to_string_pretty(entries)?;
        let write_err = |source| StoreError::WriteError {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, content).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}

impl ConfigStore for FileStore {
    fn get(&self, key: &str) -> Option<StoreValue> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).copied()
    }

    fn apply(&self, edits: &[Edit<'_>]) -> StoreResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = entries.clone();
        apply_edits(&mut next, edits);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        f: &dyn Fn(Option<StoreValue>) -> Option<StoreValue>,
    ) -> StoreResult<Option<StoreValue>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = entries.clone();
        let stored = update_entry(&mut next, key, f);
        self.persist(&next)?;
        *entries = next;
        Ok(stored)
    }
}
