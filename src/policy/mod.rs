//! # Field Policy
//!
//! Static, per-resource configuration of what a list request may touch.
//!
//! Every column identifier the plan builder emits comes from here. Request
//! input only ever selects *which* policy entry to use.

mod aggregate;

pub use aggregate::{Aggregate, AggregateKind};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::request::SortOrder;

/// Left join used to sort by a column of a related table
///
/// `LEFT JOIN table ON base.foreign_key = table.id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationJoin {
    /// Relation name (informational)
    pub relation: String,

    /// Column on the base table
    pub foreign_key: String,

    /// Joined table
    pub table: String,
}

impl RelationJoin {
    pub fn new(
        relation: impl Into<String>,
        foreign_key: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            relation: relation.into(),
            foreign_key: foreign_key.into(),
            table: table.into(),
        }
    }
}

fn default_sort_order() -> SortOrder {
    SortOrder::Desc
}

/// Which fields a resource exposes to list requests
///
/// Ordered maps are significant: the first `sortable_fields` entry is the
/// fallback sort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldPolicy {
    /// Columns matched by the free-text `search`
    pub search_fields: Vec<String>,

    /// Fields whose columns are cast to text before pattern matching
    pub numeric_fields: Vec<String>,

    /// `columnSearch` alias -> column
    pub column_fields: IndexMap<String, String>,

    /// `sortBy` alias -> column; the first entry is the fallback
    pub sortable_fields: IndexMap<String, String>,

    /// Sort columns that receive explicit NULL placement
    pub nullable_columns: Vec<String>,

    /// `sortBy` alias -> join required to sort by it
    pub relation_joins: IndexMap<String, RelationJoin>,

    /// Generic filter alias -> column
    pub filter_fields: IndexMap<String, String>,

    /// Aggregates attached to every row
    pub aggregates: Vec<Aggregate>,

    /// Eager-loadable relations; empty means unrestricted
    pub relations: Vec<String>,

    /// Direction used when the request does not carry a valid one
    #[serde(default = "default_sort_order")]
    pub default_sort_order: SortOrder,
}

impl Default for FieldPolicy {
    fn default() -> Self {
        Self {
            search_fields: Vec::new(),
            numeric_fields: Vec::new(),
            column_fields: IndexMap::new(),
            sortable_fields: IndexMap::new(),
            nullable_columns: Vec::new(),
            relation_joins: IndexMap::new(),
            filter_fields: IndexMap::new(),
            aggregates: Vec::new(),
            relations: Vec::new(),
            default_sort_order: default_sort_order(),
        }
    }
}

impl FieldPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn numeric<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.numeric_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn column(mut self, alias: impl Into<String>, column: impl Into<String>) -> Self {
        self.column_fields.insert(alias.into(), column.into());
        self
    }

    pub fn sortable(mut self, alias: impl Into<String>, column: impl Into<String>) -> Self {
        self.sortable_fields.insert(alias.into(), column.into());
        self
    }

    pub fn nullable(mut self, column: impl Into<String>) -> Self {
        self.nullable_columns.push(column.into());
        self
    }

    pub fn join(mut self, alias: impl Into<String>, join: RelationJoin) -> Self {
        self.relation_joins.insert(alias.into(), join);
        self
    }

    pub fn filter(mut self, alias: impl Into<String>, column: impl Into<String>) -> Self {
        self.filter_fields.insert(alias.into(), column.into());
        self
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregates.push(aggregate);
        self
    }

    pub fn relation(mut self, name: impl Into<String>) -> Self {
        self.relations.push(name.into());
        self
    }

    pub fn default_order(mut self, order: SortOrder) -> Self {
        self.default_sort_order = order;
        self
    }

    /// Numeric fields are matched by alias or by resolved column
    pub fn is_numeric(&self, field: &str) -> bool {
        self.numeric_fields.iter().any(|f| f == field)
    }

    /// Nullable entries are matched by sort alias or by resolved column
    pub fn is_nullable(&self, column: &str) -> bool {
        self.nullable_columns.iter().any(|c| c == column)
    }

    /// Whether `column` names an aggregate output rather than a table column
    pub fn is_aggregate_alias(&self, column: &str) -> bool {
        self.aggregates.iter().any(|a| a.alias() == column)
    }

    /// Filter requested relations through the allow-list
    pub fn loadable_relations(&self, requested: &[String]) -> Vec<String> {
        requested
            .iter()
            .filter(|r| self.relations.is_empty() || self.relations.contains(r))
            .cloned()
            .collect()
    }
}
