//! The recorded plan shared by every adapter

use super::{Column, Join, NullsPlacement, Ordering, Predicate};
use crate::policy::Aggregate;
use crate::request::SortOrder;

/// Everything a handle has been told, in call order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPlan {
    pub table: String,
    /// Empty means `table.*`
    pub columns: Vec<Column>,
    pub joins: Vec<Join>,
    pub aggregates: Vec<Aggregate>,
    pub relations: Vec<String>,
    /// ANDed together
    pub predicates: Vec<Predicate>,
    pub orderings: Vec<Ordering>,
}

impl QueryPlan {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub(crate) fn push_predicate(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    pub(crate) fn push_join(&mut self, table: &str, first: Column, second: Column) {
        self.joins.push(Join {
            table: table.to_string(),
            first,
            second,
        });
    }

    pub(crate) fn set_columns(&mut self, columns: Vec<Column>) {
        self.columns = columns;
    }

    /// Relations are deduplicated, first request wins the position
    pub(crate) fn add_relations(&mut self, relations: &[String]) {
        for relation in relations {
            if !self.relations.contains(relation) {
                self.relations.push(relation.clone());
            }
        }
    }

    pub(crate) fn push_aggregate(&mut self, aggregate: &Aggregate) {
        self.aggregates.push(aggregate.clone());
    }

    pub(crate) fn push_ordering(
        &mut self,
        column: Column,
        order: SortOrder,
        nulls: Option<NullsPlacement>,
    ) {
        self.orderings.push(Ordering {
            column,
            order,
            nulls,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relations_deduplicated_in_order() {
        let mut plan = QueryPlan::new("products");
        plan.add_relations(&["category".into(), "reviews".into()]);
        plan.add_relations(&["reviews".into(), "tags".into()]);

        assert_eq!(plan.relations, vec!["category", "reviews", "tags"]);
    }
}
