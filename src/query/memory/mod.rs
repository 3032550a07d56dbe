//! # In-Memory Query Handle
//!
//! Evaluates a recorded plan against JSON tables held in a
//! [`MemoryStore`]. Semantics follow SQL where it matters for list
//! pages: left joins multiply rows, NULLs never match comparisons, pattern
//! matching a non-text value needs a cast.

mod eval;
mod store;

pub use store::{MemoryStore, StoreError, StoreResult};

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use self::eval::{compare_rows, compare_values, matches, Row};
use super::{Column, Join, NullsPlacement, Page, Predicate, QueryHandle, QueryPlan};
use crate::policy::{Aggregate, AggregateKind};
use crate::request::SortOrder;

/// A list query against one in-memory table
pub struct MemoryQuery {
    store: Arc<MemoryStore>,
    plan: QueryPlan,
}

impl MemoryQuery {
    pub fn new(store: Arc<MemoryStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            plan: QueryPlan::new(table),
        }
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    /// Base rows with aggregates attached and joins applied
    fn working_rows(&self) -> StoreResult<Vec<Row<'_>>> {
        let plan = &self.plan;
        let base = self.store.table(&plan.table)?;

        let mut rows: Vec<Row<'_>> = base
            .iter()
            .map(|record| -> StoreResult<Row<'_>> {
                let mut record = record.clone();
                for aggregate in &plan.aggregates {
                    let value = self.aggregate(aggregate, &record)?;
                    record.insert(aggregate.alias(), value);
                }
                Ok(Row {
                    base_table: &plan.table,
                    base: record,
                    joined: Vec::new(),
                })
            })
            .collect::<StoreResult<_>>()?;

        for join in &plan.joins {
            rows = self.apply_join(rows, join)?;
        }

        Ok(rows)
    }

    fn aggregate(&self, aggregate: &Aggregate, record: &Map<String, Value>) -> StoreResult<Value> {
        let local = record.get(&aggregate.local_key).unwrap_or(&Value::Null);
        let related = self.store.table(&aggregate.table)?;

        let matching = related.iter().filter(|r| {
            let key = r.get(&aggregate.foreign_key).unwrap_or(&Value::Null);
            compare_values(key, local) == Some(std::cmp::Ordering::Equal)
        });

        let column = aggregate.column.as_deref().unwrap_or_default();
        let values: Vec<&Value> = matching
            .filter_map(|r| match aggregate.kind {
                AggregateKind::Count => Some(&Value::Null),
                _ => r.get(column).filter(|v| v.is_number()),
            })
            .collect();

        let by_value = |a: &&&Value, b: &&&Value| {
            compare_values(a, b).unwrap_or(std::cmp::Ordering::Equal)
        };

        Ok(match aggregate.kind {
            AggregateKind::Count => Value::from(values.len() as u64),
            _ if values.is_empty() => Value::Null,
            AggregateKind::Min => values.iter().min_by(by_value).map_or(Value::Null, |v| (*v).clone()),
            AggregateKind::Max => values.iter().max_by(by_value).map_or(Value::Null, |v| (*v).clone()),
            AggregateKind::Sum => sum(&values),
            AggregateKind::Avg => {
                let total: f64 = values.iter().filter_map(|v| v.as_f64()).sum();
                Value::from(total / values.len() as f64)
            }
        })
    }

    /// LEFT JOIN: one output row per match, or one with no joined record
    fn apply_join<'s>(&'s self, rows: Vec<Row<'s>>, join: &'s Join) -> StoreResult<Vec<Row<'s>>> {
        let related = self.store.table(&join.table)?;

        // Which side of the ON clause belongs to the joined table
        let (outer, inner) = if join.second.table.as_deref() == Some(join.table.as_str()) {
            (&join.first, &join.second)
        } else {
            (&join.second, &join.first)
        };

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let key = row.get(outer).clone();
            let mut found: Vec<&Map<String, Value>> = related
                .iter()
                .filter(|r| {
                    let other = r.get(&inner.name).unwrap_or(&Value::Null);
                    !key.is_null() && compare_values(&key, other) == Some(std::cmp::Ordering::Equal)
                })
                .collect();

            if found.is_empty() {
                let mut row = row;
                row.joined.push((join.table.as_str(), None));
                out.push(row);
                continue;
            }

            let last = found.pop();
            for matched in found {
                let mut copy = Row {
                    base_table: row.base_table,
                    base: row.base.clone(),
                    joined: row.joined.clone(),
                };
                copy.joined.push((join.table.as_str(), Some(matched)));
                out.push(copy);
            }
            let mut row = row;
            row.joined.push((join.table.as_str(), last));
            out.push(row);
        }

        Ok(out)
    }

    /// Attach requested relations to a base record
    fn eager_load(&self, record: &Map<String, Value>, output: &mut Map<String, Value>) -> StoreResult<()> {
        for name in &self.plan.relations {
            let Some(relation) = self.store.relation(&self.plan.table, name) else {
                continue;
            };
            let related = self.store.table(&relation.table)?;
            let value = relation.collect(record, related);

            output.insert(name.clone(), value);
        }
        Ok(())
    }

    /// Build the output record for a row
    fn project(&self, row: &Row<'_>) -> StoreResult<Value> {
        let plan = &self.plan;
        let mut output = Map::new();

        if plan.columns.is_empty() {
            output = row.base.clone();
        }

        for column in &plan.columns {
            match (column.is_wildcard(), column.table.as_deref()) {
                (true, None) => output.extend(row.base.clone()),
                (true, Some(table)) if table == plan.table => output.extend(row.base.clone()),
                (true, Some(table)) => {
                    if let Some((_, Some(joined))) = row.joined.iter().find(|(t, _)| *t == table) {
                        output.extend((*joined).clone());
                    }
                }
                (false, _) => {
                    output.insert(column.name.clone(), row.get(column).clone());
                }
            }
        }

        // aggregates are always part of the projection
        for aggregate in &plan.aggregates {
            let alias = aggregate.alias();
            let value = row.base.get(&alias).cloned().unwrap_or(Value::Null);
            output.insert(alias, value);
        }

        self.eager_load(&row.base, &mut output)?;
        Ok(Value::Object(output))
    }
}

fn sum(values: &[&Value]) -> Value {
    if values.iter().all(|v| v.is_i64()) {
        Value::from(values.iter().filter_map(|v| v.as_i64()).sum::<i64>())
    } else {
        Value::from(values.iter().filter_map(|v| v.as_f64()).sum::<f64>())
    }
}

#[async_trait]
impl QueryHandle for MemoryQuery {
    type Record = Value;
    type Error = StoreError;

    fn base_table(&self) -> &str {
        &self.plan.table
    }

    fn where_clause(&mut self, predicate: Predicate) {
        self.plan.push_predicate(predicate);
    }

    fn left_join(&mut self, table: &str, first: Column, second: Column) {
        self.plan.push_join(table, first, second);
    }

    fn select(&mut self, columns: Vec<Column>) {
        self.plan.set_columns(columns);
    }

    fn with(&mut self, relations: &[String]) {
        self.plan.add_relations(relations);
    }

    fn with_aggregate(&mut self, aggregate: &Aggregate) {
        self.plan.push_aggregate(aggregate);
    }

    fn order_by(&mut self, column: Column, order: SortOrder) {
        self.plan.push_ordering(column, order, None);
    }

    fn order_by_nulls(&mut self, column: Column, order: SortOrder, nulls: NullsPlacement) {
        self.plan.push_ordering(column, order, Some(nulls));
    }

    async fn paginate(self, limit: u64, page: u64) -> Result<Page<Value>, StoreError> {
        let limit = limit.max(1);
        let page = page.max(1);

        let mut rows = Vec::new();
        for row in self.working_rows()? {
            let mut keep = true;
            for predicate in &self.plan.predicates {
                keep &= matches(&row, predicate)?;
            }
            if keep {
                rows.push(row);
            }
        }

        // stable: ties keep table order
        rows.sort_by(|a, b| compare_rows(a, b, &self.plan.orderings));

        let total = rows.len() as u64;
        let offset = usize::try_from(page.saturating_sub(1).saturating_mul(limit)).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(usize::MAX);

        let data = rows
            .iter()
            .skip(offset)
            .take(take)
            .map(|row| self.project(row))
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Page::new(data, page, limit, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Relation;
    use serde_json::json;

    fn store() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::new()
                .with_table(
                    "products",
                    vec![
                        json!({"id": 1, "name": "Desk", "price": 120, "category_id": 2}),
                        json!({"id": 2, "name": "Lamp", "price": 35, "category_id": 1}),
                        json!({"id": 3, "name": "Chair", "price": 80, "category_id": null}),
                    ],
                )
                .with_table(
                    "categories",
                    vec![
                        json!({"id": 1, "name": "Lighting"}),
                        json!({"id": 2, "name": "Furniture"}),
                    ],
                )
                .with_table(
                    "reviews",
                    vec![
                        json!({"id": 10, "product_id": 1, "rating": 4}),
                        json!({"id": 11, "product_id": 1, "rating": 5}),
                        json!({"id": 12, "product_id": 2, "rating": 3}),
                    ],
                )
                .with_relation(
                    "products",
                    "category",
                    Relation::belongs_to("categories", "category_id"),
                )
                .with_relation(
                    "products",
                    "reviews",
                    Relation::has_many("reviews", "product_id"),
                ),
        )
    }

    fn names(page: &Page<Value>) -> Vec<&str> {
        page.data
            .iter()
            .map(|r| r["name"].as_str().unwrap_or_default())
            .collect()
    }

    #[tokio::test]
    async fn test_paginate_slices_and_counts() {
        let mut q = MemoryQuery::new(store(), "products");
        q.order_by(Column::new("price"), SortOrder::Asc);

        let page = q.paginate(2, 2).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.last_page, 2);
        assert_eq!(names(&page), vec!["Desk"]);
    }

    #[tokio::test]
    async fn test_join_sorts_by_related_column() {
        let mut q = MemoryQuery::new(store(), "products");
        q.left_join(
            "categories",
            Column::qualified("products", "category_id"),
            Column::qualified("categories", "id"),
        );
        q.select(vec![Column::all("products")]);
        q.order_by_nulls(
            Column::parse("categories.name"),
            SortOrder::Asc,
            NullsPlacement::First,
        );

        let page = q.paginate(10, 1).await.unwrap();
        assert_eq!(names(&page), vec!["Chair", "Desk", "Lamp"]);
        // joined columns are not projected
        assert_eq!(page.data[1]["name"], "Desk");
        assert!(page.data[1].get("category").is_none());
    }

    #[tokio::test]
    async fn test_aggregates_and_nulls_last() {
        let mut q = MemoryQuery::new(store(), "products");
        q.with_aggregate(&Aggregate::avg("reviews", "reviews", "rating", "product_id"));
        q.with_aggregate(&Aggregate::count("reviews", "reviews", "product_id"));
        q.order_by_nulls(
            Column::new("reviews_avg_rating"),
            SortOrder::Desc,
            NullsPlacement::Last,
        );

        let page = q.paginate(10, 1).await.unwrap();
        assert_eq!(names(&page), vec!["Desk", "Lamp", "Chair"]);
        assert_eq!(page.data[0]["reviews_avg_rating"], json!(4.5));
        assert_eq!(page.data[0]["reviews_count"], json!(2));
        assert_eq!(page.data[2]["reviews_avg_rating"], Value::Null);
        assert_eq!(page.data[2]["reviews_count"], json!(0));
    }

    #[tokio::test]
    async fn test_eager_loading() {
        let mut q = MemoryQuery::new(store(), "products");
        q.with(&["category".into(), "reviews".into(), "unknown".into()]);
        q.where_clause(Predicate::compare(
            Column::new("id"),
            crate::query::CompareOp::Eq,
            json!(1),
        ));

        let page = q.paginate(10, 1).await.unwrap();
        assert_eq!(page.data[0]["category"]["name"], "Furniture");
        assert_eq!(page.data[0]["reviews"].as_array().unwrap().len(), 2);
        assert!(page.data[0].get("unknown").is_none());
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let mut q = MemoryQuery::new(store(), "products");
        q.where_raw("price > ?", vec![json!(1)]);
        assert!(matches!(
            q.paginate(10, 1).await,
            Err(StoreError::RawPredicate(_))
        ));

        let q = MemoryQuery::new(store(), "missing");
        assert_eq!(
            q.paginate(10, 1).await.unwrap_err(),
            StoreError::UnknownTable("missing".into())
        );
    }

    #[test]
    fn test_sum_keeps_integers() {
        assert_eq!(sum(&[&json!(1), &json!(2)]), json!(3));
        assert_eq!(sum(&[&json!(1), &json!(2.5)]), json!(3.5));
    }
}
