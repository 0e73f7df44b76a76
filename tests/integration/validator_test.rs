//! Validator integration tests.
//!
//! Exercises the public validation surface the way a caller embedding the
//! library would.

use pretty_assertions::assert_eq;
use querygate::audit::AuditLog;
use querygate::safety::{SqlValidator, MULTIPLE_STATEMENTS_WARNING};
use std::sync::Arc;

#[test]
fn test_plain_select_passes_unchanged() {
    let result = SqlValidator::new().validate("SELECT * FROM orders LIMIT 10");

    assert!(result.is_valid());
    assert_eq!(result.cleaned_text(), "SELECT * FROM orders LIMIT 10");
    assert!(result.errors().is_empty());
    assert!(result.warnings().is_empty());
}

#[test]
fn test_drop_is_rejected() {
    let result = SqlValidator::new().validate("DROP TABLE orders");

    assert!(!result.is_valid());
    assert!(result.errors().iter().any(|e| e.contains("DROP")));
    assert_eq!(result.cleaned_text(), "");
}

#[test]
fn test_stacked_drop_is_rejected_with_warning() {
    let result = SqlValidator::new().validate("SELECT * FROM orders; DROP TABLE orders;");

    assert!(!result.is_valid());
    assert_eq!(result.errors(), ["destructive keywords found: DROP"]);
    assert!(result
        .warnings()
        .iter()
        .any(|w| w == MULTIPLE_STATEMENTS_WARNING));
}

#[test]
fn test_stacked_selects_keep_only_first() {
    let result = SqlValidator::new().validate("SELECT id FROM orders; SELECT name FROM customers");

    assert!(result.is_valid());
    assert_eq!(result.cleaned_text(), "SELECT id FROM orders");
    assert!(result
        .warnings()
        .iter()
        .any(|w| w == MULTIPLE_STATEMENTS_WARNING));
}

#[test]
fn test_comments_and_whitespace_are_normalized() {
    let result = SqlValidator::new().validate("  -- comment\nSELECT   1   ");

    assert!(result.is_valid());
    assert_eq!(result.cleaned_text(), "SELECT 1");
}

#[test]
fn test_comment_only_input_is_empty() {
    let result = SqlValidator::new().validate("-- just a note\n/* and another */");

    assert!(!result.is_valid());
    assert_eq!(result.errors(), ["empty query after cleaning"]);
}

#[test]
fn test_keyword_hidden_by_comment_is_rejected() {
    let result = SqlValidator::new().validate("SELECT 1; DR/**/OP TABLE orders");
    assert!(!result.is_valid());
    assert!(result.errors()[0].contains("DROP"));
}

#[test]
fn test_identifiers_containing_keywords_pass() {
    let result =
        SqlValidator::new().validate("SELECT created_at, last_update FROM orders WHERE deleted = 0");
    assert!(result.is_valid(), "errors: {:?}", result.errors());
}

#[test]
fn test_cte_is_accepted() {
    let result = SqlValidator::new().validate(
        "WITH spend AS (SELECT customer_id, SUM(total) AS t FROM orders GROUP BY customer_id) \
         SELECT * FROM spend ORDER BY t DESC",
    );
    assert!(result.is_valid(), "errors: {:?}", result.errors());
}

#[test]
fn test_pragma_is_rejected() {
    let result = SqlValidator::new().validate("PRAGMA table_info(orders)");
    assert!(!result.is_valid());
    assert_eq!(result.errors(), ["query must start with SELECT or WITH"]);
}

#[test]
fn test_union_select_warns_but_passes() {
    let result =
        SqlValidator::new().validate("SELECT name FROM customers UNION SELECT status FROM orders");

    assert!(result.is_valid());
    assert_eq!(result.warnings(), ["potential injection pattern: Union-based"]);
}

#[test]
fn test_shared_audit_log_records_every_verdict() {
    let log = Arc::new(AuditLog::new());
    let validator = SqlValidator::with_audit_log(Arc::clone(&log));

    validator.validate("SELECT 1");
    validator.validate("SELECT 2");
    validator.validate("DELETE FROM orders");

    assert_eq!(log.len(), 3);
    let stats = validator.validation_stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.valid, 2);
    assert_eq!(stats.invalid, 1);
    assert_eq!(stats.success_rate, "66.7%");
}
