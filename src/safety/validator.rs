//! Candidate SQL validator.
//!
//! Runs the ordered checks that decide whether a model-generated statement is
//! safe to hand to the executor, and records every verdict in its audit log.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::audit::{self, AuditLog};

use super::{
    clean_query, first_statement, Classification, ResultBuilder, SqlClassifier,
    ValidationResult, DESTRUCTIVE_KEYWORDS, EMPTY_QUERY_ERROR, ENTRY_POINT_ERROR,
    MULTIPLE_STATEMENTS_WARNING, READ_ONLY_ENTRY_POINTS, UNPARSED_WARNING,
};

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("word pattern"));

/// Advisory patterns, checked in order. The first match is reported.
static INJECTION_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("Union-based", r"(?i)\bUNION\s+SELECT\b"),
        ("Comment-based", r"--\s*$|/\*|\*/"),
        ("Hex-encoded", r"(?i)\b0x[0-9a-f]+"),
        ("Stacked queries", r"(?i);\s*(?:SELECT|DROP|DELETE)\b"),
    ]
    .into_iter()
    .map(|(label, pattern)| (label, Regex::new(pattern).expect("injection pattern")))
    .collect()
});

/// Aggregate counts over a validator's audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationStats {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub success_rate: String,
}

/// Validates candidate SQL statements.
#[derive(Debug)]
pub struct SqlValidator {
    classifier: SqlClassifier,
    audit: Arc<AuditLog<ValidationResult>>,
}

impl Default for SqlValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlValidator {
    /// Creates a validator with its own, empty audit log.
    pub fn new() -> Self {
        Self::with_audit_log(Arc::new(AuditLog::new()))
    }

    /// Creates a validator that appends to the given audit log.
    pub fn with_audit_log(audit: Arc<AuditLog<ValidationResult>>) -> Self {
        Self {
            classifier: SqlClassifier::new(),
            audit,
        }
    }

    /// Returns the audit log this validator appends to.
    pub fn audit_log(&self) -> &Arc<AuditLog<ValidationResult>> {
        &self.audit
    }

    /// Validates a candidate statement and records the verdict.
    ///
    /// Checks run in this order, stopping at the first error:
    /// 1. comment stripping and whitespace collapse; empty text is rejected
    /// 2. multiple statements are noted (warning) and the first one kept
    /// 3. destructive keywords, scanned over the whole submitted text so a
    ///    trailing `; DROP ...` is rejected rather than silently cut off
    /// 4. the kept statement must start with `SELECT` or `WITH`
    /// 5. heuristic injection patterns (warning only)
    /// 6. the kept statement must parse as a read-only query; a parse
    ///    failure is only a warning
    pub fn validate(&self, raw: &str) -> ValidationResult {
        let result = self.evaluate(raw);

        if result.is_valid() {
            debug!(
                sql = result.cleaned_text(),
                warnings = ?result.warnings(),
                "Candidate SQL accepted"
            );
        } else {
            warn!(errors = ?result.errors(), "Candidate SQL rejected");
        }

        self.audit.append(result.clone());
        result
    }

    /// Reports totals over every validation recorded so far.
    pub fn validation_stats(&self) -> ValidationStats {
        self.audit.with_entries(|entries| {
            let total = entries.len();
            let valid = entries.iter().filter(|r| r.is_valid()).count();
            ValidationStats {
                total,
                valid,
                invalid: total - valid,
                success_rate: audit::success_rate(valid, total),
            }
        })
    }

    fn evaluate(&self, raw: &str) -> ValidationResult {
        let mut builder = ResultBuilder::new(raw);

        let cleaned = clean_query(raw);
        if cleaned.is_empty() {
            return builder.reject(EMPTY_QUERY_ERROR);
        }

        let statement = match first_statement(&cleaned) {
            Some(head) => {
                debug!("Separator found, keeping only the first statement");
                builder.warn(MULTIPLE_STATEMENTS_WARNING);
                head
            }
            None => cleaned.as_str(),
        };

        let destructive = find_destructive_keywords(&cleaned);
        if !destructive.is_empty() {
            return builder.reject(format!(
                "destructive keywords found: {}",
                destructive.join(", ")
            ));
        }

        if !starts_with_read_only_clause(statement) {
            return builder.reject(ENTRY_POINT_ERROR);
        }

        if let Some(label) = detect_injection_pattern(&cleaned) {
            debug!(pattern = label, "Injection heuristic matched");
            builder.warn(format!("potential injection pattern: {label}"));
        }

        match self.classifier.classify(statement) {
            Classification::ReadOnly => {}
            Classification::Modifying(kind) => {
                return builder.reject(format!("statement is not read-only: {kind}"));
            }
            Classification::Unparsed(reason) => {
                debug!(%reason, "Structural check could not parse statement");
                builder.warn(UNPARSED_WARNING);
            }
        }

        builder.accept(statement)
    }
}

/// Returns every denylisted keyword that appears as a whole word, in
/// denylist order.
///
/// Words are `\w+` runs, so identifiers such as `created_at` or
/// `last_update` never match `CREATE` or `UPDATE`.
pub fn find_destructive_keywords(sql: &str) -> Vec<&'static str> {
    let upper = sql.to_uppercase();
    let words: HashSet<&str> = WORD.find_iter(&upper).map(|m| m.as_str()).collect();

    DESTRUCTIVE_KEYWORDS
        .iter()
        .copied()
        .filter(|keyword| words.contains(keyword))
        .collect()
}

/// Returns true if the first word of the statement is `SELECT` or `WITH`.
pub fn starts_with_read_only_clause(sql: &str) -> bool {
    let first_word = sql
        .trim_start()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or_default()
        .to_uppercase();

    READ_ONLY_ENTRY_POINTS.contains(&first_word.as_str())
}

/// Returns the label of the first injection heuristic that matches.
pub fn detect_injection_pattern(sql: &str) -> Option<&'static str> {
    INJECTION_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(sql))
        .map(|(label, _)| *label)
}
