//! Durable storage for the session record.
//!
//! DESIGN
//! ======
//! The store writes through to a `SessionStorage` after every mutation so a
//! restarted process (the CLI's equivalent of a page reload) picks the session
//! back up. The record lives under the fixed key [`STORAGE_KEY`]; storage is a
//! mirror, never the source of truth while the process is running.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tracing::warn;

use crate::types::PersistedSession;

pub const STORAGE_KEY: &str = "auth-storage";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage record malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Backend for the persisted session record.
pub trait SessionStorage: Send + Sync {
    /// Load the record, `None` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be read or holds garbage.
    fn load(&self) -> Result<Option<PersistedSession>, StorageError>;

    /// Replace the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be written.
    fn save(&self, record: &PersistedSession) -> Result<(), StorageError>;

    /// Remove the record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be written.
    fn clear(&self) -> Result<(), StorageError>;
}

// =============================================================================
// FILE STORAGE
// =============================================================================

/// JSON file keyed like browser local storage: `{ "auth-storage": { ... } }`.
/// Other keys in the file are preserved.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    /// Like `read_map`, but a malformed file is logged and treated as empty so
    /// a write can replace it. Io errors still propagate.
    fn read_map_for_write(&self) -> Result<Map<String, Value>, StorageError> {
        match self.read_map() {
            Err(StorageError::Malformed(e)) => {
                warn!(path = %self.path.display(), error = %e, "session file malformed; overwriting");
                Ok(Map::new())
            }
            other => other,
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(map)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<Option<PersistedSession>, StorageError> {
        let mut map = self.read_map()?;
        match map.remove(STORAGE_KEY) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn save(&self, record: &PersistedSession) -> Result<(), StorageError> {
        let mut map = self.read_map_for_write()?;
        map.insert(STORAGE_KEY.to_string(), serde_json::to_value(record)?);
        self.write_map(&map)
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut map = self.read_map_for_write()?;
        if map.remove(STORAGE_KEY).is_none() && !self.path.exists() {
            return Ok(());
        }
        self.write_map(&map)
    }
}

// =============================================================================
// MEMORY STORAGE
// =============================================================================

/// Process-local storage; nothing survives a restart.
#[derive(Default)]
pub struct MemoryStorage {
    record: Mutex<Option<PersistedSession>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_record(record: PersistedSession) -> Self {
        Self { record: Mutex::new(Some(record)) }
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<PersistedSession>, StorageError> {
        Ok(self.record.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone())
    }

    fn save(&self, record: &PersistedSession) -> Result<(), StorageError> {
        *self.record.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.record.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
