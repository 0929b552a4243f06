//! Pending highlight relay
//!
//! A one-slot key/value channel that carries the snippet of a note across a
//! navigation: the "open" action writes it before the page changes, and the
//! anchoring engine reads it once (clearing it) when the new page starts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Snippet waiting to be anchored on the next page load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingHighlight {
    #[serde(rename = "highlightText")]
    pub highlight_text: String,
}

impl PendingHighlight {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            highlight_text: text.into(),
        }
    }
}

/// Errors writing to a relay
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Cross-navigation channel for a pending highlight
pub trait PendingRelay: Send + Sync {
    /// Store a record, replacing any previous one
    fn put(&self, record: PendingHighlight) -> Result<(), RelayError>;

    /// Read the record once and clear it
    ///
    /// An absent or unreadable record yields `None`.
    fn take(&self) -> Option<PendingHighlight>;
}

/// In-process relay
#[derive(Debug, Default)]
pub struct MemoryRelay {
    slot: Mutex<Option<PendingHighlight>>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PendingRelay for MemoryRelay {
    fn put(&self, record: PendingHighlight) -> Result<(), RelayError> {
        *self.slot.lock() = Some(record);
        Ok(())
    }

    fn take(&self) -> Option<PendingHighlight> {
        self.slot.lock().take()
    }
}

/// Relay backed by a JSON file, surviving process restarts
#[derive(Debug, Clone)]
pub struct FileRelay {
    path: PathBuf,
}

impl FileRelay {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PendingRelay for FileRelay {
    fn put(&self, record: PendingHighlight) -> Result<(), RelayError> {
        let json = serde_json::to_vec(&record)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn take(&self) -> Option<PendingHighlight> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read pending highlight");
                return None;
            }
        };

        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to clear pending highlight");
        }

        match serde_json::from_slice(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Discarding malformed pending highlight");
                None
            }
        }
    }
}
