//! Configuration management for QueryGate.
//!
//! Handles loading configuration from TOML files and environment variables,
//! with support for SQLite connection strings and executor settings.

use crate::error::{QueryGateError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

/// Environment variable consulted when no database is configured.
pub const DATABASE_ENV_VAR: &str = "QUERYGATE_DATABASE";

/// Main configuration structure for QueryGate.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Target store.
    #[serde(default)]
    pub store: StoreConfig,

    /// Executor settings.
    #[serde(default)]
    pub executor: ExecutorConfig,
}

/// Store connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub path: Option<PathBuf>,

    /// Open connections read-only (default: true).
    #[serde(default = "default_read_only")]
    pub read_only: bool,
}

fn default_read_only() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            read_only: default_read_only(),
        }
    }
}

impl StoreConfig {
    /// Creates a store config from a connection string.
    ///
    /// Accepts `sqlite:///abs/path.db`, `sqlite://rel/path.db`,
    /// `sqlite:path.db`, or a bare file path.
    pub fn from_connection_string(conn_str: &str) -> Result<Self> {
        let conn_str = conn_str.trim();
        if conn_str.is_empty() {
            return Err(QueryGateError::config("Connection string is empty"));
        }

        let path = if let Some(rest) = conn_str.strip_prefix("sqlite:") {
            let rest = rest.strip_prefix("//").unwrap_or(rest);
            let rest = rest.split('?').next().unwrap_or_default();
            if rest.is_empty() {
                return Err(QueryGateError::config(
                    "Connection string has no database path",
                ));
            }
            PathBuf::from(rest)
        } else {
            match Url::parse(conn_str) {
                // Single-letter schemes are Windows drive letters, not URLs
                Ok(url) if url.scheme().len() > 1 => {
                    return Err(QueryGateError::config(format!(
                        "Invalid scheme '{}'. Expected 'sqlite' or a file path",
                        url.scheme()
                    )));
                }
                _ => PathBuf::from(conn_str),
            }
        };

        Ok(Self {
            path: Some(path),
            ..Self::default()
        })
    }

    /// Merges another config into this one, with the other taking precedence.
    pub fn merge(&mut self, other: &StoreConfig) {
        if other.path.is_some() {
            self.path = other.path.clone();
        }
        if !other.read_only {
            self.read_only = false;
        }
    }

    /// Applies `QUERYGATE_DATABASE` as the path if none is set.
    pub fn apply_env_defaults(&mut self) -> Result<()> {
        if self.path.is_none() {
            if let Ok(value) = std::env::var(DATABASE_ENV_VAR) {
                self.path = Self::from_connection_string(&value)?.path;
            }
        }
        Ok(())
    }

    /// Returns a display string for logs and messages.
    pub fn display_string(&self) -> String {
        let path = self
            .path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let mode = if self.read_only { "read-only" } else { "read-write" };
        format!("{path} ({mode})")
    }
}

/// Executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutorConfig {
    /// Deadline for a single query, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ExecutorConfig {
    /// Returns the query deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("querygate")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| QueryGateError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            QueryGateError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;

        if config.executor.timeout_secs == 0 {
            return Err(QueryGateError::config(format!(
                "Configuration error in {}:\n  executor.timeout_secs must be greater than 0",
                path.display()
            )));
        }

        Ok(config)
    }
}
