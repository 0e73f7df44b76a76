//! Executor integration tests against a real SQLite file.

use super::seed_orders_database;
use pretty_assertions::assert_eq;
use querygate::db::{QueryStore, SqliteStore, Value};
use querygate::query::{AuditOutcome, FailureKind, QueryExecutor, VALIDATION_FAILED};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn executor_for(store: SqliteStore) -> QueryExecutor {
    QueryExecutor::new(Arc::new(store))
}

#[tokio::test]
async fn test_select_returns_rows() {
    let (_dir, path) = seed_orders_database().await;
    let executor = executor_for(SqliteStore::open(&path));

    let report = executor
        .run("SELECT status, COUNT(*) AS n FROM orders GROUP BY status ORDER BY status")
        .await;

    assert!(report.is_success(), "{:?}", report.outcome.error_message());
    assert_eq!(report.outcome.column_names(), ["status", "n"]);
    assert_eq!(report.outcome.rows_returned(), 3);

    let result = report.result.unwrap();
    assert_eq!(
        result.rows,
        vec![
            vec![Value::from("canceled"), Value::Int(1)],
            vec![Value::from("delivered"), Value::Int(2)],
            vec![Value::from("shipped"), Value::Int(1)],
        ]
    );
}

#[tokio::test]
async fn test_join_with_cte() {
    let (_dir, path) = seed_orders_database().await;
    let executor = executor_for(SqliteStore::open(&path));

    let report = executor
        .run(
            "WITH spend AS (SELECT customer_id, SUM(total) AS total FROM orders GROUP BY customer_id)\n\
             SELECT c.name, s.total FROM customers c JOIN spend s ON s.customer_id = c.id\n\
             WHERE c.state = 'SP' ORDER BY s.total DESC",
        )
        .await;

    assert!(report.is_success(), "{:?}", report.outcome.error_message());
    let result = report.result.unwrap();
    assert_eq!(result.rows[0], vec![Value::from("Ana"), Value::Float(155.5)]);
    assert_eq!(result.rows[1], vec![Value::from("Carla"), Value::Float(12.0)]);
}

#[tokio::test]
async fn test_missing_table_is_a_failed_audit_entry() {
    let (_dir, path) = seed_orders_database().await;
    let executor = executor_for(SqliteStore::open(&path));

    let report = executor.run("SELECT * FROM order_items").await;

    assert!(!report.is_success());
    assert_eq!(report.outcome.failure(), Some(FailureKind::Query));
    assert!(report
        .outcome
        .error_message()
        .unwrap()
        .contains("no such table"));

    let log = executor.audit_log().snapshot();
    assert_eq!(log.len(), 1);
    assert!(matches!(
        &log[0].outcome,
        AuditOutcome::Failure { error } if error.contains("no such table")
    ));
}

#[tokio::test]
async fn test_statistics_after_mixed_runs() {
    let (_dir, path) = seed_orders_database().await;
    let executor = executor_for(SqliteStore::open(&path));

    assert!(executor.run("SELECT COUNT(*) FROM orders").await.is_success());
    assert!(executor.run("SELECT name FROM customers").await.is_success());
    assert!(!executor.run("SELECT * FROM missing").await.is_success());

    let stats = executor.query_stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.successful, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.success_rate, "66.7%");
}

#[tokio::test]
async fn test_rejected_statement_leaves_data_intact() {
    let (_dir, path) = seed_orders_database().await;
    let executor = executor_for(SqliteStore::open(&path));

    let report = executor.run("SELECT 1; DELETE FROM orders").await;
    assert_eq!(report.outcome.error_message(), Some(VALIDATION_FAILED));
    assert_eq!(report.outcome.failure(), Some(FailureKind::Validation));
    assert!(executor.audit_log().is_empty());

    let count = executor.run("SELECT COUNT(*) AS n FROM orders").await;
    assert_eq!(count.result.unwrap().rows[0], vec![Value::Int(4)]);
}

#[tokio::test]
async fn test_empty_result_keeps_columns() {
    let (_dir, path) = seed_orders_database().await;
    let executor = executor_for(SqliteStore::open(&path));

    let report = executor
        .run("SELECT id, status FROM orders WHERE total > 1000")
        .await;

    assert!(report.is_success());
    assert_eq!(report.outcome.rows_returned(), 0);
    assert_eq!(report.outcome.column_names(), ["id", "status"]);
}

#[tokio::test]
async fn test_missing_database_is_connection_failure() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("absent.db"));
    assert!(store.describe().ends_with("absent.db"));
    let executor = executor_for(store);

    let report = executor.run("SELECT 1").await;

    assert_eq!(report.outcome.failure(), Some(FailureKind::Connection));
    assert_eq!(executor.query_stats().failed, 1);
    assert!(!dir.path().join("absent.db").exists());
}

#[tokio::test]
async fn test_runaway_query_stops_at_deadline() {
    let (_dir, path) = seed_orders_database().await;
    let executor = executor_for(SqliteStore::open(&path)).with_timeout(Duration::from_secs(1));

    let start = Instant::now();
    let report = tokio::time::timeout(
        Duration::from_secs(15),
        executor.run(
            "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT count(*) FROM c",
        ),
    )
    .await
    .expect("run did not return after its deadline");

    assert!(report.metadata.validation.is_valid());
    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(report.outcome.failure(), Some(FailureKind::Timeout));
    assert!(report.outcome.error_message().unwrap().contains("timed out"));

    let log = executor.audit_log().snapshot();
    assert_eq!(log.len(), 1);
    assert!(!log[0].is_success());

    // The store is still usable afterwards
    assert!(executor.run("SELECT COUNT(*) FROM orders").await.is_success());
}
