//! Query execution for QueryGate.
//!
//! Couples the validator to a store: only approved statements run, and every
//! run is summarized in a uniform report.

pub mod executor;

pub use executor::{
    AuditEntry, AuditOutcome, ExecutionOutcome, FailureKind, QueryExecutor, QueryStats,
    RunMetadata, RunReport, DEFAULT_TIMEOUT, VALIDATION_FAILED,
};
