//! Storage configuration and path management for the focus guardian.
//!
//! All file paths the daemon and bridge touch are resolved here, so tests can
//! point everything at a temp directory with [`StorageConfig::with_root`].
//!
//! ## Layout
//!
//! ```text
//! ~/.focus-guardian/
//! ├── session.json     persisted current session (absent when idle)
//! ├── badge.json       visible status marker (absent when idle)
//! ├── config.json      user preferences (default allow-list)
//! ├── guardian.sock    daemon socket
//! └── logs/            bridge log files
//! ```

use fs_err as fs;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{GuardianError, Result};

/// Overrides the storage root (useful for sandboxes and integration tests).
pub const HOME_ENV: &str = "FOCUS_GUARDIAN_HOME";
const ROOT_DIR_NAME: &str = ".focus-guardian";

/// Central configuration for all guardian storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl StorageConfig {
    /// Resolves the production root: `$FOCUS_GUARDIAN_HOME`, else
    /// `~/.focus-guardian`.
    pub fn resolve() -> Result<Self> {
        if let Ok(root) = env::var(HOME_ENV) {
            if !root.trim().is_empty() {
                return Ok(Self::with_root(PathBuf::from(root)));
            }
        }
        let home = dirs::home_dir().ok_or(GuardianError::HomeDirNotFound)?;
        Ok(Self::with_root(home.join(ROOT_DIR_NAME)))
    }

    /// Creates a StorageConfig with a custom root directory.
    /// Used for testing with temp directories.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the root directory if it does not exist yet.
    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .map_err(|err| GuardianError::io("Failed to create guardian directory", err))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to session.json (the single persisted session record).
    pub fn session_file(&self) -> PathBuf {
        self.root.join("session.json")
    }

    /// Path to badge.json (status marker shown while a session is active).
    pub fn badge_file(&self) -> PathBuf {
        self.root.join("badge.json")
    }

    /// Path to config.json (preferences).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.root.join("guardian.sock")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}
