//! Configuration loading and saving utilities.
//!
//! The guardian has a single preference today: the allow-list the bridge
//! uses when a session is started without explicit sites.

use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::error::{GuardianError, Result};
use crate::storage::StorageConfig;

/// Sites a coding task is allowed to touch by default.
pub const DEFAULT_ALLOWED_SITES: [&str; 6] = [
    "github.com",
    "stackoverflow.com",
    "developer.mozilla.org",
    "react.dev",
    "localhost",
    "127.0.0.1",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardianConfig {
    #[serde(default = "default_allowed_sites")]
    pub default_allowed_sites: Vec<String>,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            default_allowed_sites: default_allowed_sites(),
        }
    }
}

fn default_allowed_sites() -> Vec<String> {
    DEFAULT_ALLOWED_SITES.iter().map(|s| s.to_string()).collect()
}

/// Loads the configuration, returning defaults if the file is missing or
/// malformed.
pub fn load_config(storage: &StorageConfig) -> GuardianConfig {
    match try_load_config(storage) {
        Ok(Some(config)) => config,
        Ok(None) => GuardianConfig::default(),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to load guardian config; using defaults");
            GuardianConfig::default()
        }
    }
}

fn try_load_config(storage: &StorageConfig) -> Result<Option<GuardianConfig>> {
    let path = storage.config_file();
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(GuardianError::io("Failed to read config", err)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|err| GuardianError::ConfigMalformed {
            path,
            details: err.to_string(),
        })
}

/// Saves the configuration to disk.
pub fn save_config(storage: &StorageConfig, config: &GuardianConfig) -> Result<()> {
    storage.ensure_root()?;
    let content = serde_json::to_string_pretty(config)
        .map_err(|err| GuardianError::json("Failed to serialize config", err))?;
    fs::write(storage.config_file(), content)
        .map_err(|err| GuardianError::io("Failed to write config", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        let config = load_config(&storage);
        assert_eq!(config, GuardianConfig::default());
        assert!(config
            .default_allowed_sites
            .contains(&"github.com".to_string()));
    }

    #[test]
    fn malformed_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        std::fs::write(storage.config_file(), "{ not json").unwrap();
        assert_eq!(load_config(&storage), GuardianConfig::default());
    }

    #[test]
    fn saved_config_is_loaded_back() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().join("guardian"));
        let config = GuardianConfig {
            default_allowed_sites: vec!["docs.rs".to_string()],
        };
        save_config(&storage, &config).unwrap();
        assert_eq!(load_config(&storage), config);
    }

    #[test]
    fn missing_field_falls_back_to_default_sites() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        std::fs::write(storage.config_file(), "{}").unwrap();
        assert_eq!(load_config(&storage), GuardianConfig::default());
    }
}
