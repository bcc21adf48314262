use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{GuestCounterError, Result};

/// One persisted outcome of a processing request. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    /// ISO-8601, second precision.
    pub timestamp: String,
    pub people_count: u64,
    #[serde(rename = "result_image")]
    pub result_image_path: String,
}

impl HistoryRecord {
    /// Record stamped with the current local time.
    pub fn now(id: impl Into<String>, people_count: u64, result_image_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp: chrono::Local::now()
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string(),
            people_count,
            result_image_path: result_image_path.into(),
        }
    }
}

/// Ordered history, insertion order = creation order.
pub type HistoryLog = Vec<HistoryRecord>;

/// Append-only history of processing outcomes.
pub trait HistoryStore: Send + Sync {
    /// Add a record to the end of the log and persist the full log.
    fn append(&self, record: &HistoryRecord) -> Result<()>;

    /// Full log, or an empty one when nothing has been persisted yet.
    fn read_all(&self) -> Result<HistoryLog>;
}

/// History persisted as a single JSON array document.
///
/// Appends are read-modify-write. They are serialized through an internal
/// lock, and the new document replaces the old one by rename, so readers see
/// either the previous or the next complete log.
pub struct JsonHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonHistoryStore {
    pub fn open<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HistoryLog> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw).map_err(|e| GuestCounterError::StoreCorrupt {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn persist(&self, log: &HistoryLog) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let payload = serde_json::to_vec_pretty(log).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&payload)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl HistoryStore for JsonHistoryStore {
    fn append(&self, record: &HistoryRecord) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| std::io::Error::other("history write lock poisoned"))?;
        let mut log = self.load()?;
        log.push(record.clone());
        self.persist(&log)?;
        log::debug!(
            "history {} now holds {} records",
            self.path.display(),
            log.len()
        );
        Ok(())
    }

    fn read_all(&self) -> Result<HistoryLog> {
        self.load()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    records: Mutex<HistoryLog>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn append(&self, record: &HistoryRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| std::io::Error::other("history lock poisoned"))?
            .push(record.clone());
        Ok(())
    }

    fn read_all(&self) -> Result<HistoryLog> {
        Ok(self
            .records
            .lock()
            .map_err(|_| std::io::Error::other("history lock poisoned"))?
            .clone())
    }
}
