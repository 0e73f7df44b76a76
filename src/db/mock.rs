//! Recording store for testing.
//!
//! Stands in for a real database and records every connection it hands out,
//! every statement it is asked to run, and every close.

use super::{deadline_exceeded, ColumnInfo, QueryResult, QueryStore, StoreConnection, Value};
use crate::audit::AuditLog;
use crate::error::{QueryGateError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a recording connection does when asked to run a statement.
#[derive(Debug, Clone)]
enum Behavior {
    Rows(QueryResult),
    QueryFailure(String),
    ConnectFailure(String),
}

#[derive(Debug, Default)]
struct Recorder {
    connects: AtomicUsize,
    closes: AtomicUsize,
    executed: AuditLog<String>,
}

/// A store double that returns canned results and records its use.
#[derive(Debug, Clone)]
pub struct RecordingStore {
    behavior: Behavior,
    fail_on: Option<(String, String)>,
    delay: Option<Duration>,
    recorder: Arc<Recorder>,
}

impl RecordingStore {
    /// Creates a store that answers every statement with a single row.
    pub fn new() -> Self {
        let columns = vec![ColumnInfo::new("result", "TEXT")];
        let rows = vec![vec![Value::from("ok")]];
        Self::with_result(QueryResult::with_data(columns, rows))
    }

    /// Creates a store that answers every statement with `result`.
    pub fn with_result(result: QueryResult) -> Self {
        Self::with_behavior(Behavior::Rows(result))
    }

    /// Creates a store whose statements all fail with `message`.
    pub fn failing_query(message: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::QueryFailure(message.into()))
    }

    /// Creates a store that cannot be connected to.
    pub fn failing_connect(message: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::ConnectFailure(message.into()))
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            fail_on: None,
            delay: None,
            recorder: Arc::new(Recorder::default()),
        }
    }

    /// Makes statements containing `fragment` fail with `message`.
    pub fn fail_when_contains(
        mut self,
        fragment: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.fail_on = Some((fragment.into(), message.into()));
        self
    }

    /// Makes every statement take `delay` before answering. Statements whose
    /// deadline is shorter fail with a timeout once it passes.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times `connect` was called, including failed attempts.
    pub fn connection_attempts(&self) -> usize {
        self.recorder.connects.load(Ordering::SeqCst)
    }

    /// Number of connections that were closed.
    pub fn closed_connections(&self) -> usize {
        self.recorder.closes.load(Ordering::SeqCst)
    }

    /// Every statement the store was asked to run, in order.
    pub fn executed_sql(&self) -> Vec<String> {
        self.recorder.executed.snapshot()
    }
}

impl Default for RecordingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryStore for RecordingStore {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>> {
        self.recorder.connects.fetch_add(1, Ordering::SeqCst);

        if let Behavior::ConnectFailure(message) = &self.behavior {
            return Err(QueryGateError::connection(message.clone()));
        }

        Ok(Box::new(RecordingConnection {
            behavior: self.behavior.clone(),
            fail_on: self.fail_on.clone(),
            delay: self.delay,
            recorder: Arc::clone(&self.recorder),
            closed: false,
        }))
    }

    fn describe(&self) -> String {
        "recording store".to_string()
    }
}

struct RecordingConnection {
    behavior: Behavior,
    fail_on: Option<(String, String)>,
    delay: Option<Duration>,
    recorder: Arc<Recorder>,
    closed: bool,
}

#[async_trait]
impl StoreConnection for RecordingConnection {
    async fn fetch_all(&mut self, sql: &str, timeout: Duration) -> Result<QueryResult> {
        if self.closed {
            return Err(QueryGateError::connection("Connection is already closed"));
        }
        self.recorder.executed.append(sql.to_string());

        if let Some(delay) = self.delay {
            if delay > timeout {
                tokio::time::sleep(timeout).await;
                return Err(deadline_exceeded(timeout));
            }
            tokio::time::sleep(delay).await;
        }

        if let Some((fragment, message)) = &self.fail_on {
            if sql.contains(fragment.as_str()) {
                return Err(QueryGateError::query(message.clone()));
            }
        }

        match &self.behavior {
            Behavior::Rows(result) => Ok(result.clone()),
            Behavior::QueryFailure(message) => Err(QueryGateError::query(message.clone())),
            Behavior::ConnectFailure(message) => Err(QueryGateError::connection(message.clone())),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.recorder.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEADLINE: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_records_connections_and_statements() {
        let store = RecordingStore::new();

        let mut conn = store.connect().await.unwrap();
        let result = conn.fetch_all("SELECT 1", DEADLINE).await.unwrap();
        conn.close().await.unwrap();

        assert_eq!(result.row_count, 1);
        assert_eq!(store.connection_attempts(), 1);
        assert_eq!(store.closed_connections(), 1);
        assert_eq!(store.executed_sql(), vec!["SELECT 1"]);
    }

    #[tokio::test]
    async fn test_failing_query() {
        let store = RecordingStore::failing_query("no such table: missing");

        let mut conn = store.connect().await.unwrap();
        let err = conn.fetch_all("SELECT * FROM missing", DEADLINE).await.unwrap_err();

        assert_eq!(err, QueryGateError::query("no such table: missing"));
    }

    #[tokio::test]
    async fn test_fail_when_contains() {
        let store = RecordingStore::new().fail_when_contains("missing", "no such table: missing");

        let mut conn = store.connect().await.unwrap();
        assert!(conn.fetch_all("SELECT * FROM orders", DEADLINE).await.is_ok());
        assert!(conn.fetch_all("SELECT * FROM missing", DEADLINE).await.is_err());
        assert_eq!(store.executed_sql().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_connect_still_counts_attempt() {
        let store = RecordingStore::failing_connect("unable to open database file");

        assert!(store.connect().await.is_err());
        assert_eq!(store.connection_attempts(), 1);
        assert!(store.executed_sql().is_empty());
    }

    #[tokio::test]
    async fn test_delay_longer_than_deadline_times_out() {
        let store = RecordingStore::new().with_delay(Duration::from_millis(500));

        let mut conn = store.connect().await.unwrap();
        let err = conn
            .fetch_all("SELECT 1", Duration::from_millis(10))
            .await
            .unwrap_err();

        assert!(matches!(err, QueryGateError::Timeout(_)));
        assert!(conn.fetch_all("SELECT 1", DEADLINE).await.is_ok());
    }

    #[test]
    fn test_clones_share_recorder() {
        let store = RecordingStore::new();
        let handle = store.clone();

        tokio_test::block_on(async {
            let mut conn = store.connect().await.unwrap();
            conn.close().await.unwrap();
        });

        assert_eq!(handle.connection_attempts(), 1);
        assert_eq!(handle.closed_connections(), 1);
    }
}
