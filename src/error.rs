//! Error types for QueryGate.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Main error type for QueryGate operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryGateError {
    /// Store connection errors (missing file, permission denied, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution errors (no such table, type mismatch, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Query exceeded the execution deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration errors (invalid config file, bad connection string, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueryGateError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a timeout error with the given message.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Timeout(_) => "Timeout",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the bare message without the category prefix.
    ///
    /// Store errors are surfaced to callers verbatim through this accessor.
    pub fn message(&self) -> &str {
        match self {
            Self::Connection(msg)
            | Self::Query(msg)
            | Self::Timeout(msg)
            | Self::Config(msg)
            | Self::Internal(msg) => msg,
        }
    }
}

/// Result type alias using QueryGateError.
pub type Result<T> = std::result::Result<T, QueryGateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_connection() {
        let err = QueryGateError::connection("unable to open database file");
        assert_eq!(
            err.to_string(),
            "Connection error: unable to open database file"
        );
        assert_eq!(err.category(), "Connection Error");
    }

    #[test]
    fn test_error_display_query() {
        let err = QueryGateError::query("no such table: orderz");
        assert_eq!(err.to_string(), "Query error: no such table: orderz");
        assert_eq!(err.category(), "Query Error");
    }

    #[test]
    fn test_error_display_timeout() {
        let err = QueryGateError::timeout("Query timed out after 30 seconds");
        assert_eq!(err.to_string(), "Timeout: Query timed out after 30 seconds");
        assert_eq!(err.category(), "Timeout");
    }

    #[test]
    fn test_error_display_config() {
        let err = QueryGateError::config("missing field 'path' in [store]");
        assert_eq!(
            err.to_string(),
            "Configuration error: missing field 'path' in [store]"
        );
        assert_eq!(err.category(), "Configuration Error");
    }

    #[test]
    fn test_message_is_unprefixed() {
        let err = QueryGateError::query("no such table: orderz");
        assert_eq!(err.message(), "no such table: orderz");

        let err = QueryGateError::internal("unexpected state");
        assert_eq!(err.message(), "unexpected state");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<QueryGateError>();
    }
}
