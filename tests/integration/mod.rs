//! Integration tests for QueryGate.

pub mod executor_test;
pub mod validator_test;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use std::path::PathBuf;
use tempfile::TempDir;

/// Creates a small e-commerce database. Keep the `TempDir` alive for as long
/// as the file is needed.
pub async fn seed_orders_database() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ecommerce.db");
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);

    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    for statement in [
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, state TEXT)",
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER, status TEXT, total REAL)",
        "INSERT INTO customers VALUES (1, 'Ana', 'SP'), (2, 'Bruno', 'RJ'), (3, 'Carla', 'SP')",
        "INSERT INTO orders VALUES (1, 1, 'delivered', 120.0), (2, 1, 'shipped', 35.5), (3, 2, 'delivered', 80.0), (4, 3, 'canceled', 12.0)",
    ] {
        sqlx::query(statement).execute(&mut conn).await.unwrap();
    }
    conn.close().await.unwrap();

    (dir, path)
}
