//! In-memory tables and relation definitions

use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::query::Relation;

/// Result type for in-memory evaluation
pub type StoreResult<T> = Result<T, StoreError>;

/// In-memory evaluation errors
///
/// These mirror what a SQL backend would reject.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Table referenced by the plan does not exist
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Raw SQL cannot be evaluated without a database
    #[error("Raw predicates are not supported by the in-memory store: {0}")]
    RawPredicate(String),

    /// Pattern operators are only defined over text
    #[error("Pattern match on non-text value in column {0}; cast it to text")]
    PatternOnNonText(String),
}

/// Named tables of JSON objects
///
/// Read-only once built; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: HashMap<String, Vec<Map<String, Value>>>,
    /// (base table, relation name) -> relation
    relations: HashMap<(String, String), Relation>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a table; non-object rows are skipped
    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        self.tables.insert(name.into(), rows);
        self
    }

    pub fn with_relation(
        mut self,
        base_table: impl Into<String>,
        name: impl Into<String>,
        relation: Relation,
    ) -> Self {
        self.relations
            .insert((base_table.into(), name.into()), relation);
        self
    }

    pub fn table(&self, name: &str) -> StoreResult<&[Map<String, Value>]> {
        self.tables
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }

    pub fn relation(&self, base_table: &str, name: &str) -> Option<&Relation> {
        self.relations
            .get(&(base_table.to_string(), name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::RelationKind;
    use serde_json::json;

    #[test]
    fn test_with_table_skips_non_objects() {
        let store = MemoryStore::new().with_table("t", vec![json!({"id": 1}), json!(2)]);
        assert_eq!(store.table("t").unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_table() {
        let store = MemoryStore::new();
        assert_eq!(
            store.table("missing").unwrap_err(),
            StoreError::UnknownTable("missing".into())
        );
    }

    #[test]
    fn test_relation_lookup() {
        let store = MemoryStore::new().with_relation(
            "products",
            "category",
            Relation::belongs_to("categories", "category_id"),
        );

        let relation = store.relation("products", "category").unwrap();
        assert_eq!(relation.kind, RelationKind::BelongsTo);
        assert_eq!(relation.owner_key, "id");
        assert!(store.relation("orders", "category").is_none());
    }
}
