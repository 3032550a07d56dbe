//! Statement execution seam
//!
//! The engine owns no connections; callers hand [`SqlQuery`](super::SqlQuery)
//! an executor wrapping whatever driver or pool they already run.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::Statement;

/// Result type for SQL execution
pub type SqlResult<T> = Result<T, SqlError>;

/// SQL execution errors
#[derive(Debug, Error)]
pub enum SqlError {
    /// The database rejected or failed the statement
    #[error("Query execution failed: {0}")]
    Execution(String),

    /// A row could not be turned into a record
    #[error("Row decode failed: {0}")]
    Decode(String),

    /// A raw predicate's `?` count differs from its parameter count
    #[error("Raw predicate `{sql}` has {placeholders} placeholders but {params} parameters")]
    Placeholder {
        sql: String,
        placeholders: usize,
        params: usize,
    },

    /// Driver-specific failure
    #[error(transparent)]
    Driver(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Runs rendered statements
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Rows as JSON objects keyed by output column name
    async fn fetch_rows(&self, statement: &Statement) -> SqlResult<Vec<Value>>;

    /// Single integer result of a `COUNT(*)` statement
    async fn fetch_count(&self, statement: &Statement) -> SqlResult<u64>;
}
