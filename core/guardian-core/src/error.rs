//! Error types for guardian-core operations.
//!
//! Most guardian paths are best-effort and log instead of failing; these
//! errors cover the places where a caller can still make a decision
//! (path resolution, config and session file I/O).

use std::path::PathBuf;

/// All errors that can occur in guardian-core operations.
#[derive(Debug, thiserror::Error)]
pub enum GuardianError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Persistence Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Session file write failed: {path}: {details}")]
    PersistenceFailed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl GuardianError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        GuardianError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        GuardianError::Json {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using GuardianError.
pub type Result<T> = std::result::Result<T, GuardianError>;

impl From<GuardianError> for String {
    fn from(err: GuardianError) -> String {
        err.to_string()
    }
}
