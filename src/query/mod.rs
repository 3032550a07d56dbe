//! # Query Handles
//!
//! The narrow interface the plan builder drives. One adapter exists per
//! backend:
//!
//! - [`sql::SqlQuery`] renders parameterized SQL for Postgres, SQLite and
//!   MySQL and runs it through a [`sql::SqlExecutor`]
//! - [`memory::MemoryQuery`] evaluates the same plan against in-memory JSON
//!   tables
//!
//! Handles only record the plan; nothing touches the backend until
//! [`QueryHandle::paginate`].

pub mod memory;
pub mod sql;

mod column;
mod plan;
mod predicate;
mod relation;

pub use column::Column;
pub use plan::QueryPlan;
pub use predicate::{CompareOp, Predicate};
pub use relation::{Relation, RelationKind};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::policy::Aggregate;
use crate::request::SortOrder;

/// Where NULLs go in an ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullsPlacement {
    First,
    Last,
}

impl NullsPlacement {
    /// Descending puts NULLs last, ascending puts them first
    pub fn for_order(order: SortOrder) -> Self {
        match order {
            SortOrder::Desc => NullsPlacement::Last,
            SortOrder::Asc => NullsPlacement::First,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            NullsPlacement::First => "NULLS FIRST",
            NullsPlacement::Last => "NULLS LAST",
        }
    }
}

/// One ORDER BY term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub column: Column,
    pub order: SortOrder,
    /// `None` leaves placement to the backend default
    pub nulls: Option<NullsPlacement>,
}

/// A `LEFT JOIN table ON first = second`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub table: String,
    pub first: Column,
    pub second: Column,
}

/// The backend's native pagination result
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
}

impl<T> Page<T> {
    /// Build a page, deriving `last_page` (at least 1)
    pub fn new(data: Vec<T>, current_page: u64, per_page: u64, total: u64) -> Self {
        let per_page = per_page.max(1);
        Self {
            data,
            current_page: current_page.max(1),
            per_page,
            total,
            last_page: total.div_ceil(per_page).max(1),
        }
    }
}

/// An ORM query under construction
///
/// Mutating calls never fail; backend errors surface from `paginate`.
#[async_trait]
pub trait QueryHandle: Send {
    /// One result row
    type Record: Serialize + Send;

    /// Backend failure, propagated unchanged to the caller
    type Error: std::error::Error + Send + Sync + 'static;

    /// Table the query selects from
    fn base_table(&self) -> &str;

    /// AND a predicate onto the WHERE clause
    fn where_clause(&mut self, predicate: Predicate);

    /// Raw predicate with positional `?` placeholders
    fn where_raw(&mut self, sql: &str, params: Vec<serde_json::Value>) {
        self.where_clause(Predicate::raw(sql, params));
    }

    fn left_join(&mut self, table: &str, first: Column, second: Column);

    /// Replace the projection
    fn select(&mut self, columns: Vec<Column>);

    /// Eager load relations onto each result row
    fn with(&mut self, relations: &[String]);

    /// Attach a correlated aggregate as an extra output column
    fn with_aggregate(&mut self, aggregate: &Aggregate);

    fn order_by(&mut self, column: Column, order: SortOrder);

    /// Ordering with explicit NULL placement
    fn order_by_nulls(&mut self, column: Column, order: SortOrder, nulls: NullsPlacement);

    /// Execute, returning page `page` of `limit` rows plus the total count
    async fn paginate(self, limit: u64, page: u64) -> Result<Page<Self::Record>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nulls_for_order() {
        assert_eq!(NullsPlacement::for_order(SortOrder::Desc), NullsPlacement::Last);
        assert_eq!(NullsPlacement::for_order(SortOrder::Asc), NullsPlacement::First);
    }

    #[test]
    fn test_page_last_page() {
        let page: Page<()> = Page::new(vec![], 2, 10, 25);
        assert_eq!(page.last_page, 3);

        let empty: Page<()> = Page::new(vec![], 1, 10, 0);
        assert_eq!(empty.last_page, 1);

        let exact: Page<()> = Page::new(vec![], 1, 5, 10);
        assert_eq!(exact.last_page, 2);
    }
}
