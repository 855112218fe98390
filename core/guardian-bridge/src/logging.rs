//! File logging for the bridge.
//!
//! stdout carries command output (and the relay may run inside a host that
//! owns stderr), so logs go to `~/.focus-guardian/logs/bridge.log.<date>`.
//! Logging is optional: if the directory cannot be created the bridge runs
//! without a subscriber.

use fs_err as fs;
use guardian_core::StorageConfig;
use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "bridge.log";
const DEBUG_LOG_ENV: &str = "FOCUS_GUARDIAN_DEBUG_LOG";

/// Installs the global subscriber. Keep the returned guard alive for the
/// whole process or buffered lines are lost on exit.
pub fn init() -> Option<WorkerGuard> {
    let storage = StorageConfig::resolve().ok()?;
    let logs_dir = storage.logs_dir();
    fs::create_dir_all(&logs_dir).ok()?;

    let appender = tracing_appender::rolling::daily(&logs_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let debug_enabled = env::var(DEBUG_LOG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;

    Some(guard)
}
