use crate::domain::models::WidgetTodo;
use crate::infrastructure::error::InfraError;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Shared document holding the widget's copy of the todo list. Both the app
/// process and the widget process go through this interface; every write
/// replaces the whole snapshot, so the last writer wins outright.
pub trait WidgetSnapshotStore: Send + Sync {
    /// `Ok(None)` means the snapshot has never been written. A document that
    /// exists but fails to decode is an error; callers decide whether that
    /// counts as absence.
    fn read(&self) -> Result<Option<Vec<WidgetTodo>>, InfraError>;
    fn write(&self, records: &[WidgetTodo]) -> Result<(), InfraError>;
}

/// Tells the out-of-process widget surface to recompute its timeline. The
/// surface coalesces refreshes on its own schedule; this is fire-and-forget.
pub trait WidgetRefresher: Send + Sync {
    fn request_reload(&self);
}

#[derive(Debug, Clone)]
pub struct JsonFileWidgetStore {
    snapshot_path: PathBuf,
}

impl JsonFileWidgetStore {
    pub fn new(snapshot_path: impl AsRef<Path>) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }
}

impl WidgetSnapshotStore for JsonFileWidgetStore {
    fn read(&self) -> Result<Option<Vec<WidgetTodo>>, InfraError> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.snapshot_path)?;
        let records = serde_json::from_str(&raw)?;
        Ok(Some(records))
    }

    fn write(&self, records: &[WidgetTodo]) -> Result<(), InfraError> {
        let encoded = serde_json::to_string(records)?;
        fs::write(&self.snapshot_path, encoded)?;
        Ok(())
    }
}

/// Bumps a marker file the widget surface watches for reload cues.
#[derive(Debug, Clone)]
pub struct MarkerFileWidgetRefresher {
    marker_path: PathBuf,
}

impl MarkerFileWidgetRefresher {
    pub fn new(marker_path: impl AsRef<Path>) -> Self {
        Self {
            marker_path: marker_path.as_ref().to_path_buf(),
        }
    }
}

impl WidgetRefresher for MarkerFileWidgetRefresher {
    fn request_reload(&self) {
        let _ = fs::write(&self.marker_path, Utc::now().to_rfc3339());
    }
}

/// Keeps the serialized document in memory, raw, so tests can observe exact
/// bytes and inject corruption the way a damaged shared store would present.
#[derive(Debug, Default)]
pub struct InMemoryWidgetStore {
    document: Mutex<Option<String>>,
}

impl InMemoryWidgetStore {
    pub fn raw_document(&self) -> Option<String> {
        self.lock_document()
            .ok()
            .and_then(|document| document.clone())
    }

    pub fn set_raw_document(&self, raw: &str) {
        if let Ok(mut document) = self.lock_document() {
            *document = Some(raw.to_string());
        }
    }

    fn lock_document(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, InfraError> {
        self.document.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("widget store lock poisoned: {error}"))
        })
    }
}

impl WidgetSnapshotStore for InMemoryWidgetStore {
    fn read(&self) -> Result<Option<Vec<WidgetTodo>>, InfraError> {
        let document = self.lock_document()?;
        let Some(raw) = document.as_deref() else {
            return Ok(None);
        };
        let records = serde_json::from_str(raw)?;
        Ok(Some(records))
    }

    fn write(&self, records: &[WidgetTodo]) -> Result<(), InfraError> {
        let encoded = serde_json::to_string(records)?;
        let mut document = self.lock_document()?;
        *document = Some(encoded);
        Ok(())
    }
}
