//! Query safety validation module.
//!
//! Decides, from text alone, whether a candidate SQL statement is guaranteed
//! not to mutate schema or data, and returns it in canonical form. Nothing
//! rejected here ever reaches a store.

mod normalize;
mod parser;
mod validator;

pub use normalize::{clean_query, first_statement};
pub use parser::{Classification, SqlClassifier, StatementType};
pub use validator::{SqlValidator, ValidationStats};

use serde::Serialize;

/// SQL verbs capable of mutating schema or data. Never allowed anywhere in a
/// candidate, even after a leading `SELECT`.
pub const DESTRUCTIVE_KEYWORDS: [&str; 10] = [
    "DROP", "DELETE", "TRUNCATE", "ALTER", "CREATE", "INSERT", "UPDATE", "REPLACE", "GRANT",
    "REVOKE",
];

/// Clauses a read-only statement may start with.
pub const READ_ONLY_ENTRY_POINTS: [&str; 2] = ["SELECT", "WITH"];

pub const EMPTY_QUERY_ERROR: &str = "empty query after cleaning";
pub const ENTRY_POINT_ERROR: &str = "query must start with SELECT or WITH";
pub const MULTIPLE_STATEMENTS_WARNING: &str =
    "multiple statements detected - only the first will execute";
pub const UNPARSED_WARNING: &str = "could not parse SQL; the store will report syntax errors";

/// Outcome of validating one candidate statement.
///
/// Produced only by [`SqlValidator`]; there is no way to build or mutate one
/// from outside this module. When `is_valid()` is true, `cleaned_text()` is
/// non-empty, holds exactly one statement, and starts with `SELECT` or `WITH`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    original_text: String,
    is_valid: bool,
    cleaned_text: String,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    /// The candidate text exactly as submitted.
    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Normalized single statement to execute. Empty when rejected.
    pub fn cleaned_text(&self) -> &str {
        &self.cleaned_text
    }

    /// Reasons for rejection, in the order they were found.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Non-fatal findings. Never affect `is_valid()`.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Accumulates findings while a candidate moves through the checks.
#[derive(Debug)]
struct ResultBuilder {
    original_text: String,
    warnings: Vec<String>,
}

impl ResultBuilder {
    fn new(original_text: &str) -> Self {
        Self {
            original_text: original_text.to_string(),
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    fn reject(self, error: impl Into<String>) -> ValidationResult {
        ValidationResult {
            original_text: self.original_text,
            is_valid: false,
            cleaned_text: String::new(),
            errors: vec![error.into()],
            warnings: self.warnings,
        }
    }

    fn accept(self, cleaned_text: &str) -> ValidationResult {
        debug_assert!(!cleaned_text.is_empty());
        ValidationResult {
            original_text: self.original_text,
            is_valid: true,
            cleaned_text: cleaned_text.to_string(),
            errors: Vec::new(),
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_clears_cleaned_text() {
        let mut builder = ResultBuilder::new("DROP TABLE t");
        builder.warn("something odd");
        let result = builder.reject("destructive keywords found: DROP");

        assert!(!result.is_valid());
        assert_eq!(result.original_text(), "DROP TABLE t");
        assert_eq!(result.cleaned_text(), "");
        assert_eq!(result.errors(), ["destructive keywords found: DROP"]);
        assert_eq!(result.warnings(), ["something odd"]);
    }

    #[test]
    fn test_accept_has_no_errors() {
        let result = ResultBuilder::new(" SELECT 1 ").accept("SELECT 1");

        assert!(result.is_valid());
        assert_eq!(result.original_text(), " SELECT 1 ");
        assert_eq!(result.cleaned_text(), "SELECT 1");
        assert!(result.errors().is_empty());
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn test_result_serializes_all_fields() {
        let result = ResultBuilder::new("SELECT 1").accept("SELECT 1");
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["original_text"], "SELECT 1");
        assert_eq!(json["is_valid"], true);
        assert_eq!(json["cleaned_text"], "SELECT 1");
        assert!(json["errors"].as_array().unwrap().is_empty());
        assert!(json["warnings"].as_array().unwrap().is_empty());
    }
}
