//! Aggregate attachments (`withAvg`, `withCount`, ...)

use std::fmt;

use serde::{Deserialize, Serialize};

/// Aggregate function computed over a related table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
    Avg,
    Count,
    Sum,
    Min,
    Max,
}

impl AggregateKind {
    /// Lowercase name used in aliases
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateKind::Avg => "avg",
            AggregateKind::Count => "count",
            AggregateKind::Sum => "sum",
            AggregateKind::Min => "min",
            AggregateKind::Max => "max",
        }
    }

    /// SQL function name
    pub fn sql_function(&self) -> &'static str {
        match self {
            AggregateKind::Avg => "AVG",
            AggregateKind::Count => "COUNT",
            AggregateKind::Sum => "SUM",
            AggregateKind::Min => "MIN",
            AggregateKind::Max => "MAX",
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_local_key() -> String {
    "id".to_string()
}

/// A correlated aggregate over a has-many relation
///
/// `related.foreign_key = base.local_key`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub kind: AggregateKind,

    /// Relation name, used as the alias prefix
    pub relation: String,

    /// Related table
    pub table: String,

    /// Aggregated column; ignored for `count`
    #[serde(default)]
    pub column: Option<String>,

    /// Column on the related table pointing back at the base row
    pub foreign_key: String,

    /// Column on the base table the foreign key references
    #[serde(default = "default_local_key")]
    pub local_key: String,
}

impl Aggregate {
    pub fn new(
        kind: AggregateKind,
        relation: impl Into<String>,
        table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            relation: relation.into(),
            table: table.into(),
            column: None,
            foreign_key: foreign_key.into(),
            local_key: default_local_key(),
        }
    }

    pub fn avg(relation: &str, table: &str, column: &str, foreign_key: &str) -> Self {
        Self::new(AggregateKind::Avg, relation, table, foreign_key).with_column(column)
    }

    pub fn count(relation: &str, table: &str, foreign_key: &str) -> Self {
        Self::new(AggregateKind::Count, relation, table, foreign_key)
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_local_key(mut self, local_key: impl Into<String>) -> Self {
        self.local_key = local_key.into();
        self
    }

    /// Output column name: `reviews_avg_rating`, `reviews_count`
    pub fn alias(&self) -> String {
        match (&self.kind, &self.column) {
            (AggregateKind::Count, _) | (_, None) => {
                format!("{}_{}", self.relation, self.kind)
            }
            (kind, Some(column)) => format!("{}_{}_{}", self.relation, kind, column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_naming() {
        assert_eq!(
            Aggregate::avg("reviews", "reviews", "rating", "product_id").alias(),
            "reviews_avg_rating"
        );
        assert_eq!(
            Aggregate::count("reviews", "reviews", "product_id").alias(),
            "reviews_count"
        );
        assert_eq!(
            Aggregate::new(AggregateKind::Max, "bids", "bids", "item_id")
                .with_column("amount")
                .alias(),
            "bids_max_amount"
        );
    }

    #[test]
    fn test_deserialize_defaults_local_key() {
        let agg: Aggregate = serde_json::from_value(serde_json::json!({
            "kind": "sum",
            "relation": "orders",
            "table": "orders",
            "column": "total",
            "foreign_key": "customer_id"
        }))
        .unwrap();

        assert_eq!(agg.kind, AggregateKind::Sum);
        assert_eq!(agg.local_key, "id");
        assert_eq!(agg.alias(), "orders_sum_total");
    }
}
