//! QueryGate - a safety gate for machine-generated SQL.
//!
//! This library exposes the core modules for use by the binary and in
//! integration tests.

pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod query;
pub mod safety;
