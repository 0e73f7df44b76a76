//! Command-line argument parsing for QueryGate.

use querygate::config::{Config, StoreConfig};
use querygate::error::Result;
use clap::Parser;
use std::path::PathBuf;

/// Validate machine-generated SQL and run it read-only against SQLite.
#[derive(Parser, Debug)]
#[command(name = "querygate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Candidate SQL statement
    #[arg(value_name = "SQL", required_unless_present = "check")]
    pub sql: Option<String>,

    /// Database file or connection string (e.g., sqlite://data/shop.db)
    #[arg(short = 'd', long, value_name = "DATABASE")]
    pub database: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Query deadline in seconds (overrides config)
    #[arg(short = 't', long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Only validate the statement; never open the database
    #[arg(long)]
    pub validate_only: bool,

    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,

    /// Check that the database can be opened and has tables, then exit
    #[arg(long, conflicts_with = "validate_only")]
    pub check: bool,

    /// Write logs to a file instead of stderr (default location if no path is given)
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    pub log_file: Option<Option<PathBuf>>,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Converts the `--database` argument to a StoreConfig, if given.
    pub fn to_store_config(&self) -> Result<Option<StoreConfig>> {
        self.database
            .as_deref()
            .map(StoreConfig::from_connection_string)
            .transpose()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Returns the log file to write to, if file logging was requested.
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file
            .as_ref()
            .map(|path| path.clone().unwrap_or_else(querygate::logging::get_log_path))
    }
}
