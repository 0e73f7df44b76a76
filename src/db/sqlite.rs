//! SQLite store implementation.
//!
//! Provides `SqliteStore`, which opens one sqlx `SqliteConnection` per call.
//! Connections are read-only unless configured otherwise, and a missing
//! database file is an error rather than being created.

use crate::config::StoreConfig;
use crate::db::{
    deadline_exceeded, ColumnInfo, QueryResult, QueryStore, Row, StoreConnection, Value,
};
use crate::error::{QueryGateError, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteColumn, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{
    Column as SqlxColumn, Connection, Executor, Row as SqlxRow, Statement, TypeInfo, ValueRef,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Virtual machine instructions between deadline checks.
const PROGRESS_INTERVAL: i32 = 1_000;

/// A SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    options: SqliteConnectOptions,
}

impl SqliteStore {
    /// Creates a read-only store for the database file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_access(path.into(), true)
    }

    /// Creates a store from configuration.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let path = config
            .path
            .clone()
            .ok_or_else(|| QueryGateError::config("Database path is required"))?;
        Ok(Self::with_access(path, config.read_only))
    }

    fn with_access(path: PathBuf, read_only: bool) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .read_only(read_only)
            .create_if_missing(false);
        Self { path, options }
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the database can be opened and holds at least one table.
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.open_connection().await?;
        let count: std::result::Result<i64, sqlx::Error> =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
                .fetch_one(&mut conn)
                .await;
        if let Err(e) = conn.close().await {
            warn!("Failed to close connection after health check: {e}");
        }

        let count = count.map_err(|e| QueryGateError::query(format_query_error(e)))?;
        debug!(tables = count, "Health check complete");
        Ok(count > 0)
    }

    async fn open_connection(&self) -> Result<SqliteConnection> {
        SqliteConnection::connect_with(&self.options)
            .await
            .map_err(|e| map_connection_error(e, &self.path))
    }
}

#[async_trait]
impl QueryStore for SqliteStore {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>> {
        debug!(path = %self.path.display(), "Opening SQLite connection");
        let conn = self.open_connection().await?;
        Ok(Box::new(SqliteStoreConnection { conn: Some(conn) }))
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

/// One open SQLite connection.
struct SqliteStoreConnection {
    conn: Option<SqliteConnection>,
}

#[async_trait]
impl StoreConnection for SqliteStoreConnection {
    async fn fetch_all(&mut self, sql: &str, timeout: Duration) -> Result<QueryResult> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| QueryGateError::connection("Connection is already closed"))?;

        // Cancelling the future leaves sqlite3_step running; interrupt the
        // statement itself once the deadline passes.
        let deadline = Instant::now() + timeout;
        conn.lock_handle()
            .await
            .map_err(|e| QueryGateError::query(format_query_error(e)))?
            .set_progress_handler(PROGRESS_INTERVAL, move || Instant::now() < deadline);

        let start = Instant::now();
        let fetched = sqlx::query(sql).fetch_all(&mut *conn).await;
        let execution_time = start.elapsed();

        if let Ok(mut handle) = conn.lock_handle().await {
            handle.remove_progress_handler();
        }

        let result = match fetched {
            Ok(rows) => rows,
            Err(_) if Instant::now() >= deadline => return Err(deadline_exceeded(timeout)),
            Err(e) => return Err(QueryGateError::query(format_query_error(e))),
        };

        // Empty results carry no row to read column names from
        let columns = match result.first() {
            Some(first_row) => first_row.columns().iter().map(column_info).collect(),
            None => fetch_column_metadata(conn, sql).await,
        };

        let rows: Vec<Row> = result.iter().map(convert_row).collect();

        Ok(QueryResult::with_data(columns, rows).with_execution_time(execution_time))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await.map_err(|e| {
                QueryGateError::connection(format!("Failed to close connection: {e}"))
            })?;
            debug!("SQLite connection closed");
        }
        Ok(())
    }
}

/// Reads column metadata from a prepared statement without stepping it.
async fn fetch_column_metadata(conn: &mut SqliteConnection, sql: &str) -> Vec<ColumnInfo> {
    match (&mut *conn).prepare(sql).await {
        Ok(statement) => statement.columns().iter().map(column_info).collect(),
        Err(e) => {
            debug!("Could not prepare statement for column metadata: {e}");
            Vec::new()
        }
    }
}

fn column_info(col: &SqliteColumn) -> ColumnInfo {
    ColumnInfo::new(col.name(), col.type_info().name())
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.len()).map(|i| convert_value(row, i)).collect()
}

/// Converts a single value using its runtime storage class.
///
/// SQLite columns are dynamically typed, so the declared column type is not
/// a reliable guide; the storage class of each value is.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let storage_class = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_uppercase(),
        Err(_) => return Value::Null,
    };

    match storage_class.as_str() {
        "INTEGER" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "REAL" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "BLOB" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        // TEXT and anything else
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Maps sqlx connection errors to messages naming the database file.
fn map_connection_error(error: sqlx::Error, path: &Path) -> QueryGateError {
    let detail = match error.as_database_error() {
        Some(db_error) => db_error.message().to_string(),
        None => error.to_string(),
    };
    QueryGateError::connection(format!(
        "Cannot open database at {}: {detail}",
        path.display()
    ))
}

/// Extracts the store's own message so it can be surfaced verbatim.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => db_error.message().to_string(),
        None => error.to_string(),
    }
}
