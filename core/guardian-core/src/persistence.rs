//! Durable storage for the single session record.
//!
//! # File Format
//!
//! One key, holding the serialized session. A missing file means idle.
//!
//! ```json
//! {
//!   "currentSession": {
//!     "taskId": "task-1",
//!     "startTime": 1706600000000,
//!     "allowedSites": ["github.com"],
//!     "distractions": [{ "site": "twitter.com", "timestamp": 1706600005000, "url": "https://twitter.com/" }]
//!   }
//! }
//! ```
//!
//! Empty or corrupt files are treated as absent (with a warning) so a bad
//! write can never wedge the daemon at startup. Writes go through a temp file
//! and rename.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::NamedTempFile;

use focus_guardian_protocol::Session;

use crate::error::{GuardianError, Result};

pub trait SessionPersistence {
    fn load(&self) -> Result<Option<Session>>;
    fn save(&self, session: &Session) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionFile {
    #[serde(default)]
    current_session: Option<Session>,
}

/// JSON file persistence used by the daemon.
#[derive(Debug, Clone)]
pub struct FileSessionPersistence {
    path: PathBuf,
}

impl FileSessionPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomic(&self, content: &str) -> std::result::Result<(), String> {
        let parent_dir = self
            .path
            .parent()
            .ok_or_else(|| "Session file path has no parent directory".to_string())?;
        fs::create_dir_all(parent_dir)
            .map_err(|e| format!("Failed to create session directory: {}", e))?;
        let mut temp_file =
            NamedTempFile::new_in(parent_dir).map_err(|e| format!("Temp file error: {}", e))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| format!("Failed to write temp session file: {}", e))?;
        temp_file
            .flush()
            .map_err(|e| format!("Failed to flush temp session file: {}", e))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| format!("Failed to commit session file: {}", e.error))?;
        Ok(())
    }
}

impl SessionPersistence for FileSessionPersistence {
    fn load(&self) -> Result<Option<Session>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(GuardianError::io("Failed to read session file", err)),
        };

        if content.trim().is_empty() {
            tracing::warn!(path = %self.path.display(), "Empty session file; treating as idle");
            return Ok(None);
        }

        match serde_json::from_str::<SessionFile>(&content) {
            Ok(file) => Ok(file.current_session),
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Corrupt session file; treating as idle"
                );
                Ok(None)
            }
        }
    }

    fn save(&self, session: &Session) -> Result<()> {
        let file = SessionFile {
            current_session: Some(session.clone()),
        };
        let content = serde_json::to_string_pretty(&file)
            .map_err(|err| GuardianError::json("Failed to serialize session", err))?;
        self.write_atomic(&content)
            .map_err(|details| GuardianError::PersistenceFailed {
                path: self.path.clone(),
                details,
            })
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(GuardianError::io("Failed to remove session file", err)),
        }
    }
}

/// In-memory persistence. Clones share the same slot, so a test can drop a
/// store and build a new one over the same "disk" to simulate a restart.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionPersistence {
    slot: Arc<Mutex<Option<Session>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemorySessionPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `save`/`clear` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn stored(&self) -> Option<Session> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GuardianError::PersistenceFailed {
                path: PathBuf::from("<memory>"),
                details: "writes disabled".to_string(),
            });
        }
        Ok(())
    }
}

impl SessionPersistence for MemorySessionPersistence {
    fn load(&self) -> Result<Option<Session>> {
        Ok(self.stored())
    }

    fn save(&self, session: &Session) -> Result<()> {
        self.check_writable()?;
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.check_writable()?;
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
