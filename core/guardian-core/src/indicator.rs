//! Visible status marker for an active session.
//!
//! Purely observational: set on start/restore, cleared on end. Nothing in the
//! protocol reads it back.

use fs_err as fs;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{GuardianError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub text: &'static str,
    pub color: &'static str,
}

impl Badge {
    pub const ACTIVE: Badge = Badge {
        text: "🔥",
        color: "#10b981",
    };
}

pub trait StatusIndicator {
    fn show(&self, badge: &Badge) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Writes the badge to a small JSON file that status UIs can watch.
#[derive(Debug, Clone)]
pub struct FileStatusIndicator {
    path: PathBuf,
}

impl FileStatusIndicator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatusIndicator for FileStatusIndicator {
    fn show(&self, badge: &Badge) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| GuardianError::io("Failed to create badge directory", err))?;
        }
        let content = serde_json::to_string(badge)
            .map_err(|err| GuardianError::json("Failed to serialize badge", err))?;
        fs::write(&self.path, content).map_err(|err| GuardianError::io("Failed to write badge", err))
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(GuardianError::io("Failed to clear badge", err)),
        }
    }
}

/// Records the current badge in memory; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatusIndicator {
    current: Arc<Mutex<Option<Badge>>>,
}

impl MemoryStatusIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Badge> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StatusIndicator for MemoryStatusIndicator {
    fn show(&self, badge: &Badge) -> Result<()> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(*badge);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
