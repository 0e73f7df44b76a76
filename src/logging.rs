//! Logging configuration for QueryGate.
//!
//! Logs go to stderr by default so stdout stays clean for query output, or
//! to a file when one is requested.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes logging to the given file.
///
/// The file is truncated on each run. If it cannot be created, logging falls
/// back to stderr.
pub fn init_file_logging(log_path: &Path) {
    if let Some(parent) = log_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Warning: Could not create log directory: {e}");
            init_stderr_logging();
            return;
        }
    }

    let log_file = match File::create(log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {e}");
            init_stderr_logging();
            return;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(log_file)
        .with_ansi(false)
        .init();
}

/// Initializes logging to stderr.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Returns the default log file path.
///
/// Uses the XDG state directory on Linux (`~/.local/state/querygate/querygate.log`),
/// or falls back to the config directory on other platforms.
pub fn get_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        return state_dir.join("querygate").join("querygate.log");
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("querygate").join("querygate.log");
    }

    std::env::temp_dir().join("querygate.log")
}
