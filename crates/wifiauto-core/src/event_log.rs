//! User-facing diagnostic event log.
//!
//! A plain text file with one `YYYY-MM-DD HH:MM:SS message` line per entry.
//! When the file grows past its size limit it is emptied before the next
//! append, so it never holds more than roughly one limit's worth of history.
//!
//! Appends never fail from the caller's point of view: I/O errors are
//! reported through `tracing` and otherwise dropped.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;
use tracing::warn;

use crate::ports::{Clock, DiagnosticLog, SystemClock};

/// File name of the event log inside the data directory.
pub const EVENT_LOG_FILE_NAME: &str = "events.log";

/// Size past which the log is emptied.
pub const DEFAULT_MAX_BYTES: u64 = 128 * 1024;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// [`DiagnosticLog`] backed by a text file.
pub struct FileEventLog {
    path: PathBuf,
    max_bytes: u64,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl FileEventLog {
    /// Create a log writing to `path` with the default size limit.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_options(path, DEFAULT_MAX_BYTES, Arc::new(SystemClock))
    }

    /// Create a log with an explicit size limit and clock.
    #[must_use]
    pub fn with_options(path: impl Into<PathBuf>, max_bytes: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            max_bytes,
            clock,
            lock: Mutex::new(()),
        }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole log. A missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn read_all(&self) -> std::io::Result<String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    /// Empty the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be truncated.
    pub fn reset(&self) -> std::io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.path.exists() {
            std::fs::write(&self.path, b"")?;
        }
        Ok(())
    }

    fn try_append(&self, message: &str) -> std::io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let oversized = std::fs::metadata(&self.path)
            .map(|meta| meta.len() > self.max_bytes)
            .unwrap_or(false);

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(!oversized)
            .truncate(oversized)
            .open(&self.path)?;

        let timestamp = self.clock.now().with_timezone(&Local).format(TIMESTAMP_FORMAT);
        writeln!(file, "{timestamp} {message}")
    }
}

impl DiagnosticLog for FileEventLog {
    fn append(&self, message: &str) {
        if let Err(e) = self.try_append(message) {
            warn!(path = %self.path.display(), error = %e, "Failed to write event log entry");
        }
    }
}

impl std::fmt::Debug for FileEventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileEventLog")
            .field("path", &self.path)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

/// In-memory [`DiagnosticLog`] that keeps every message.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    entries: Mutex<Vec<String>>,
}

impl MemoryEventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the messages appended so far, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of messages appended so far.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticLog for MemoryEventLog {
    fn append(&self, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}
