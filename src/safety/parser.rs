//! Structural read-only verification.
//!
//! Uses sqlparser-rs with the SQLite dialect to confirm that a statement which
//! already passed the text checks is a pure query, recursing into CTEs,
//! set operations and derived tables.

use std::fmt;

use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

/// The type of SQL statement detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementType {
    Insert,
    Update,
    Delete,
    Drop,
    Truncate,
    Alter,
    Create,
    Grant,
    Revoke,
    /// Statement type could not be determined.
    Unknown,
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Drop => write!(f, "DROP"),
            Self::Truncate => write!(f, "TRUNCATE"),
            Self::Alter => write!(f, "ALTER"),
            Self::Create => write!(f, "CREATE"),
            Self::Grant => write!(f, "GRANT"),
            Self::Revoke => write!(f, "REVOKE"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Result of structurally classifying a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Every parsed statement is a query without data-modifying parts.
    ReadOnly,
    /// At least one statement (or nested body) is not read-only.
    Modifying(StatementType),
    /// The parser rejected the text; carries the parser message.
    Unparsed(String),
}

/// SQL classifier that parses statements and checks they are read-only.
#[derive(Debug)]
pub struct SqlClassifier {
    dialect: SQLiteDialect,
}

impl Default for SqlClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlClassifier {
    /// Creates a new SQL classifier.
    pub fn new() -> Self {
        Self {
            dialect: SQLiteDialect {},
        }
    }

    /// Classifies a SQL string.
    pub fn classify(&self, sql: &str) -> Classification {
        let statements = match Parser::parse_sql(&self.dialect, sql) {
            Ok(statements) => statements,
            Err(e) => return Classification::Unparsed(e.to_string()),
        };

        if statements.is_empty() {
            return Classification::Unparsed("no statement found".to_string());
        }

        statements
            .iter()
            .find_map(classify_statement)
            .map_or(Classification::ReadOnly, Classification::Modifying)
    }
}

/// Classifies a single parsed statement. `None` means read-only.
fn classify_statement(statement: &Statement) -> Option<StatementType> {
    match statement {
        // Query: may contain data-modifying CTEs, so recurse
        Statement::Query(query) => classify_query(query),

        Statement::Insert(_) => Some(StatementType::Insert),
        Statement::Update { .. } => Some(StatementType::Update),
        Statement::Delete(_) => Some(StatementType::Delete),
        Statement::Drop { .. } => Some(StatementType::Drop),
        Statement::Truncate { .. } => Some(StatementType::Truncate),
        Statement::AlterTable { .. } => Some(StatementType::Alter),
        Statement::CreateTable { .. } => Some(StatementType::Create),
        Statement::CreateIndex { .. } => Some(StatementType::Create),
        Statement::CreateView { .. } => Some(StatementType::Create),
        Statement::Grant { .. } => Some(StatementType::Grant),
        Statement::Revoke { .. } => Some(StatementType::Revoke),

        // Anything else (PRAGMA, ATTACH, VACUUM, ...) is not a plain query
        _ => Some(StatementType::Unknown),
    }
}

/// Classifies a Query, checking CTE bodies before the main body.
fn classify_query(query: &Query) -> Option<StatementType> {
    if let Some(with) = &query.with {
        if let Some(found) = with.cte_tables.iter().find_map(|cte| classify_query(&cte.query)) {
            return Some(found);
        }
    }

    classify_set_expr(&query.body)
}

/// Classifies a SetExpr, detecting mutations and recursing into nested queries.
fn classify_set_expr(set_expr: &SetExpr) -> Option<StatementType> {
    match set_expr {
        SetExpr::Insert(stmt) | SetExpr::Update(stmt) => classify_statement(stmt),
        SetExpr::Query(query) => classify_query(query),
        SetExpr::Select(select) => classify_select(select),
        SetExpr::SetOperation { left, right, .. } => {
            classify_set_expr(left).or_else(|| classify_set_expr(right))
        }
        _ => None,
    }
}

/// Classifies a Select by checking its FROM clause for subqueries.
fn classify_select(select: &Select) -> Option<StatementType> {
    select.from.iter().find_map(classify_table_with_joins)
}

/// Classifies a TableWithJoins, checking the main relation and all joins.
fn classify_table_with_joins(twj: &TableWithJoins) -> Option<StatementType> {
    classify_table_factor(&twj.relation)
        .or_else(|| twj.joins.iter().find_map(|join| classify_table_factor(&join.relation)))
}

/// Classifies a TableFactor, recursing into derived tables (subqueries).
fn classify_table_factor(factor: &TableFactor) -> Option<StatementType> {
    match factor {
        TableFactor::Derived { subquery, .. } => classify_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => classify_table_with_joins(table_with_joins),
        _ => None,
    }
}
