//! Validated query execution.
//!
//! Runs only validator-approved statements against a store and reports a
//! uniform outcome whatever went wrong. Every statement that reaches the
//! store leaves an audit entry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::audit::{self, AuditLog};
use crate::config::ExecutorConfig;
use crate::db::{deadline_exceeded, QueryResult, QueryStore};
use crate::error::{QueryGateError, Result};
use crate::safety::{SqlValidator, ValidationResult};

/// Message reported when the validator rejects a candidate.
pub const VALIDATION_FAILED: &str = "query validation failed";

/// Default per-query deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long closing a connection may take before it is dropped instead.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a run did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Rejected before any connection was opened.
    Validation,
    /// The store could not be opened.
    Connection,
    /// The store rejected or failed the statement.
    Query,
    /// The statement exceeded the deadline.
    Timeout,
}

impl FailureKind {
    fn from_error(error: &QueryGateError) -> Self {
        match error {
            QueryGateError::Connection(_) => Self::Connection,
            QueryGateError::Timeout(_) => Self::Timeout,
            _ => Self::Query,
        }
    }
}

/// Summary of one run.
///
/// A successful outcome never carries an error; a failed one always reports
/// zero rows and no columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    success: bool,
    rows_returned: usize,
    column_names: Vec<String>,
    error_message: Option<String>,
    failure: Option<FailureKind>,
}

impl ExecutionOutcome {
    fn succeeded(result: &QueryResult) -> Self {
        Self {
            success: true,
            rows_returned: result.row_count,
            column_names: result.column_names(),
            error_message: None,
            failure: None,
        }
    }

    fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            rows_returned: 0,
            column_names: Vec::new(),
            error_message: Some(message.into()),
            failure: Some(kind),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn rows_returned(&self) -> usize {
        self.rows_returned
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// The failure message, verbatim from the validator or the store.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn failure(&self) -> Option<FailureKind> {
        self.failure
    }
}

/// Everything known about a run besides the rows themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunMetadata {
    /// Candidate text as submitted.
    pub original_query: String,
    /// Statement sent to the store. Empty when rejected.
    pub cleaned_query: String,
    /// Full validator verdict.
    pub validation: ValidationResult,
    /// Validator errors, copied out for callers that only need the reasons.
    pub validation_errors: Vec<String>,
    /// Wall time spent on the store, when it was reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
}

/// What `QueryExecutor::run` hands back.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: ExecutionOutcome,
    /// Rows and columns, present only on success.
    pub result: Option<QueryResult>,
    pub metadata: RunMetadata,
}

impl RunReport {
    /// Returns true if the statement ran and its rows are available.
    pub fn is_success(&self) -> bool {
        self.outcome.success()
    }
}

/// How an audited statement ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AuditOutcome {
    Success { rows: usize },
    Failure { error: String },
}

/// One statement that reached the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub query: String,
    pub outcome: AuditOutcome,
    pub execution_time_ms: u64,
}

impl AuditEntry {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AuditOutcome::Success { .. })
    }
}

/// Aggregate counts over the executor's audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: String,
}

impl QueryStats {
    /// Computes statistics over audit entries.
    pub fn from_entries(entries: &[AuditEntry]) -> Self {
        let total = entries.len();
        let successful = entries.iter().filter(|e| e.is_success()).count();
        Self {
            total,
            successful,
            failed: total - successful,
            success_rate: audit::success_rate(successful, total),
        }
    }
}

/// Validates candidates and runs the approved ones.
pub struct QueryExecutor {
    store: Arc<dyn QueryStore>,
    validator: SqlValidator,
    audit: Arc<AuditLog<AuditEntry>>,
    timeout: Duration,
}

impl QueryExecutor {
    /// Creates an executor with a fresh validator and audit log.
    pub fn new(store: Arc<dyn QueryStore>) -> Self {
        Self {
            store,
            validator: SqlValidator::new(),
            audit: Arc::new(AuditLog::new()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates an executor using configured settings.
    pub fn from_config(store: Arc<dyn QueryStore>, config: &ExecutorConfig) -> Self {
        Self::new(store).with_timeout(config.timeout())
    }

    /// Replaces the validator.
    pub fn with_validator(mut self, validator: SqlValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Appends audit entries to the given log instead of a private one.
    pub fn with_audit_log(mut self, audit: Arc<AuditLog<AuditEntry>>) -> Self {
        self.audit = audit;
        self
    }

    /// Sets the per-query deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validator(&self) -> &SqlValidator {
        &self.validator
    }

    pub fn audit_log(&self) -> &Arc<AuditLog<AuditEntry>> {
        &self.audit
    }

    /// Validates `candidate` and, if approved, runs it.
    ///
    /// Never returns an error: every failure is folded into the report. A
    /// rejected candidate never causes a connection to be opened.
    pub async fn run(&self, candidate: &str) -> RunReport {
        let validation = self.validator.validate(candidate);
        let mut metadata = RunMetadata {
            original_query: candidate.to_string(),
            cleaned_query: validation.cleaned_text().to_string(),
            validation_errors: validation.errors().to_vec(),
            validation,
            execution_time_ms: None,
        };

        if !metadata.validation.is_valid() {
            warn!(
                errors = ?metadata.validation_errors,
                "Not executing rejected query"
            );
            return RunReport {
                outcome: ExecutionOutcome::failed(FailureKind::Validation, VALIDATION_FAILED),
                result: None,
                metadata,
            };
        }

        let sql = metadata.cleaned_query.clone();
        let start = Instant::now();
        let result = self.execute(&sql).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        metadata.execution_time_ms = Some(elapsed_ms);

        match result {
            Ok(query_result) => {
                info!(rows = query_result.row_count, elapsed_ms, "Query succeeded");
                self.audit.append(AuditEntry {
                    query: sql,
                    outcome: AuditOutcome::Success {
                        rows: query_result.row_count,
                    },
                    execution_time_ms: elapsed_ms,
                });
                RunReport {
                    outcome: ExecutionOutcome::succeeded(&query_result),
                    result: Some(query_result),
                    metadata,
                }
            }
            Err(e) => {
                warn!("{}: {}", e.category(), e.message());
                self.audit.append(AuditEntry {
                    query: sql,
                    outcome: AuditOutcome::Failure {
                        error: e.message().to_string(),
                    },
                    execution_time_ms: elapsed_ms,
                });
                RunReport {
                    outcome: ExecutionOutcome::failed(FailureKind::from_error(&e), e.message()),
                    result: None,
                    metadata,
                }
            }
        }
    }

    /// Reports totals over every statement that reached the store.
    pub fn query_stats(&self) -> QueryStats {
        self.audit.with_entries(QueryStats::from_entries)
    }

    /// Opens a connection, runs `sql` under the deadline, and closes the
    /// connection whatever happened.
    ///
    /// The store interrupts the statement at the deadline; the outer timeout
    /// only catches stores that do not. A close that hangs is abandoned and
    /// the connection dropped.
    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        debug!(store = %self.store.describe(), "Connecting");
        let mut conn = self.store.connect().await?;

        let fetch = conn.fetch_all(sql, self.timeout);
        let result = match tokio::time::timeout(self.timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(deadline_exceeded(self.timeout)),
        };

        match tokio::time::timeout(CLOSE_TIMEOUT, conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to close connection: {e}"),
            Err(_) => warn!("Connection did not close within {CLOSE_TIMEOUT:?}, dropping it"),
        }

        result
    }
}
