//! Store abstraction layer for QueryGate.
//!
//! Provides a trait-based interface so the executor can run against SQLite in
//! production and a recording double in tests. A connection lives for exactly
//! one `run`: it is opened, used, and closed by the caller.

mod mock;
mod sqlite;
mod types;

pub use mock::RecordingStore;
pub use sqlite::SqliteStore;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::StoreConfig;
use crate::error::{QueryGateError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Creates the store described by the configuration.
pub fn open_store(config: &StoreConfig) -> Result<SqliteStore> {
    SqliteStore::from_config(config)
}

/// The error a store reports when a statement outlives its deadline.
pub fn deadline_exceeded(timeout: Duration) -> QueryGateError {
    QueryGateError::timeout(format!("Query timed out after {timeout:?}"))
}

/// A target that hands out fresh connections.
#[async_trait]
pub trait QueryStore: Send + Sync {
    /// Opens a new connection. Nothing is cached between calls.
    async fn connect(&self) -> Result<Box<dyn StoreConnection>>;

    /// Returns a display-safe description of the target.
    fn describe(&self) -> String;
}

/// A single open connection to a store.
#[async_trait]
pub trait StoreConnection: Send {
    /// Runs one read statement and materializes the whole result set.
    ///
    /// The statement must stop on its own once `timeout` has elapsed and
    /// fail with `QueryGateError::Timeout`, leaving the connection closable.
    async fn fetch_all(&mut self, sql: &str, timeout: Duration) -> Result<QueryResult>;

    /// Closes the connection. Calling it twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}
