//! # SQL Query Handle
//!
//! Records the plan, renders it for one [`Flavor`], and executes it
//! through a [`SqlExecutor`]. Eager relations are loaded with one
//! `SELECT ... WHERE key IN (...)` per relation after the page is fetched.

mod executor;
mod flavor;
mod serializer;

pub use executor::{SqlError, SqlExecutor, SqlResult};
pub use flavor::Flavor;
pub use serializer::Statement;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use self::serializer::Formatter;
use super::{Column, NullsPlacement, Page, Predicate, QueryHandle, QueryPlan, Relation};
use crate::policy::Aggregate;
use crate::request::SortOrder;

/// A list query against one SQL table
pub struct SqlQuery<E: SqlExecutor> {
    executor: Arc<E>,
    flavor: Flavor,
    plan: QueryPlan,
    relations: HashMap<String, Relation>,
    /// First raw predicate with mismatched placeholders, as (sql, placeholders, params)
    placeholder_mismatch: Option<(String, usize, usize)>,
}

impl<E: SqlExecutor> SqlQuery<E> {
    pub fn new(executor: Arc<E>, flavor: Flavor, table: impl Into<String>) -> Self {
        Self {
            executor,
            flavor,
            plan: QueryPlan::new(table),
            relations: HashMap::new(),
            placeholder_mismatch: None,
        }
    }

    /// Define a relation that `with` can name
    pub fn with_relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.relations.insert(name.into(), relation);
        self
    }

    /// Define several relations at once
    pub fn with_relations<'r>(
        mut self,
        relations: impl IntoIterator<Item = (&'r String, &'r Relation)>,
    ) -> Self {
        for (name, relation) in relations {
            self.relations.insert(name.clone(), relation.clone());
        }
        self
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    /// `SELECT ... LIMIT ? OFFSET ?` for page `page` of `limit` rows
    pub fn select_statement(&self, limit: u64, page: u64) -> SqlResult<Statement> {
        self.check_placeholders()?;

        let plan = &self.plan;
        let mut f = Formatter::new(self.flavor, &plan.table, &plan.aggregates);

        f.push("SELECT ");
        f.projection(&plan.columns);
        f.push(" FROM ");
        f.ident(&plan.table);
        f.joins(&plan.joins);
        f.where_clause(&plan.predicates);
        f.order_by(&plan.orderings);
        f.limit_offset(limit, page.saturating_sub(1).saturating_mul(limit));

        Ok(f.finish())
    }

    /// `SELECT COUNT(*)` over the same joins and predicates
    pub fn count_statement(&self) -> SqlResult<Statement> {
        self.check_placeholders()?;

        let plan = &self.plan;
        let mut f = Formatter::new(self.flavor, &plan.table, &plan.aggregates);

        f.push("SELECT COUNT(*) AS ");
        f.ident("aggregate");
        f.push(" FROM ");
        f.ident(&plan.table);
        f.joins(&plan.joins);
        f.where_clause(&plan.predicates);

        Ok(f.finish())
    }

    /// `SELECT * FROM related WHERE related_key IN (...)`
    pub fn relation_statement(&self, relation: &Relation, keys: Vec<Value>) -> Statement {
        let mut f = Formatter::new(self.flavor, &relation.table, &[]);

        f.push("SELECT * FROM ");
        f.ident(&relation.table);
        f.where_clause(&[Predicate::In {
            column: Column::new(relation.related_key()),
            values: keys,
        }]);

        f.finish()
    }

    fn check_placeholders(&self) -> SqlResult<()> {
        match &self.placeholder_mismatch {
            Some((sql, placeholders, params)) => Err(SqlError::Placeholder {
                sql: sql.clone(),
                placeholders: *placeholders,
                params: *params,
            }),
            None => Ok(()),
        }
    }

    /// Attach every requested relation this handle defines
    ///
    /// Names without a definition are skipped, as the in-memory store does.
    async fn load_relations(&self, rows: &mut [Value]) -> SqlResult<()> {
        for name in &self.plan.relations {
            let Some(relation) = self.relations.get(name) else {
                continue;
            };

            let keys = relation.keys(rows.iter().filter_map(Value::as_object));
            let related: Vec<Map<String, Value>> = if keys.is_empty() {
                Vec::new()
            } else {
                self.executor
                    .fetch_rows(&self.relation_statement(relation, keys))
                    .await?
                    .into_iter()
                    .filter_map(|row| match row {
                        Value::Object(map) => Some(map),
                        _ => None,
                    })
                    .collect()
            };

            for row in rows.iter_mut() {
                if let Value::Object(record) = row {
                    let value = relation.collect(record, &related);
                    record.insert(name.clone(), value);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<E: SqlExecutor + 'static> QueryHandle for SqlQuery<E> {
    type Record = Value;
    type Error = SqlError;

    fn base_table(&self) -> &str {
        &self.plan.table
    }

    fn where_clause(&mut self, predicate: Predicate) {
        if self.placeholder_mismatch.is_none() {
            self.placeholder_mismatch = predicate
                .placeholder_mismatch()
                .map(|(sql, placeholders, params)| (sql.to_string(), placeholders, params));
        }
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

    async fn paginate(self, limit: u64, page: u64) -> Result<Page<Value>, SqlError> {
        let limit = limit.max(1);
        let page = page.max(1);

        let total = self.executor.fetch_count(&self.count_statement()?).await?;

        let mut rows = if total == 0 {
            Vec::new()
        } else {
            self.executor
                .fetch_rows(&self.select_statement(limit, page)?)
                .await?
        };

        if !rows.is_empty() {
            self.load_relations(&mut rows).await?;
        }

        Ok(Page::new(rows, page, limit, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::AggregateKind;
    use crate::query::CompareOp;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        statements: Mutex<Vec<Statement>>,
        total: u64,
    }

    #[async_trait]
    impl SqlExecutor for Recorder {
        async fn fetch_rows(&self, statement: &Statement) -> SqlResult<Vec<Value>> {
            self.statements.lock().unwrap().push(statement.clone());
            Ok(vec![json!({"id": 1})])
        }

        async fn fetch_count(&self, statement: &Statement) -> SqlResult<u64> {
            self.statements.lock().unwrap().push(statement.clone());
            Ok(self.total)
        }
    }

    fn query(flavor: Flavor) -> SqlQuery<Recorder> {
        SqlQuery::new(Arc::new(Recorder::default()), flavor, "products")
    }

    #[test]
    fn test_default_projection() {
        let stmt = query(Flavor::Postgresql).select_statement(10, 1).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT \"products\".* FROM \"products\" LIMIT $1 OFFSET $2"
        );
        assert_eq!(stmt.params, vec![json!(10), json!(0)]);
    }

    #[test]
    fn test_or_group_and_cast() {
        let mut q = query(Flavor::Postgresql);
        q.where_clause(Predicate::Any(vec![
            Predicate::contains(Column::new("name"), "42", false),
            Predicate::contains(Column::new("id"), "42", true),
        ]));
        q.where_clause(Predicate::compare(
            Column::new("status"),
            CompareOp::Eq,
            json!("active"),
        ));

        let stmt = q.count_statement().unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT COUNT(*) AS \"aggregate\" FROM \"products\" \
             WHERE (\"name\" ILIKE $1 OR CAST(\"id\" AS TEXT) ILIKE $2) AND \"status\" = $3"
        );
        assert_eq!(stmt.params, vec![json!("%42%"), json!("%42%"), json!("active")]);
    }

    #[test]
    fn test_join_and_nulls_ordering() {
        let mut q = query(Flavor::Sqlite);
        q.left_join(
            "categories",
            Column::qualified("products", "category_id"),
            Column::qualified("categories", "id"),
        );
        q.select(vec![Column::all("products")]);
        q.order_by_nulls(
            Column::parse("categories.name"),
            SortOrder::Desc,
            NullsPlacement::Last,
        );

        let stmt = q.select_statement(5, 3).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT \"products\".* FROM \"products\" \
             LEFT JOIN \"categories\" ON \"products\".\"category_id\" = \"categories\".\"id\" \
             ORDER BY \"categories\".\"name\" DESC NULLS LAST LIMIT ?1 OFFSET ?2"
        );
        assert_eq!(stmt.params, vec![json!(5), json!(10)]);
    }

    #[test]
    fn test_mysql_emulates_nulls_first() {
        let mut q = query(Flavor::Mysql);
        q.order_by_nulls(Column::new("rating"), SortOrder::Asc, NullsPlacement::First);

        let stmt = q.select_statement(10, 1).unwrap();
        assert!(stmt
            .sql
            .contains("ORDER BY `rating` IS NULL DESC, `rating` ASC LIMIT ? OFFSET ?"));
    }

    #[test]
    fn test_aggregate_subselect() {
        let mut q = query(Flavor::Postgresql);
        q.with_aggregate(&Aggregate::avg("reviews", "reviews", "rating", "product_id"));
        q.with_aggregate(&Aggregate::new(
            AggregateKind::Count,
            "reviews",
            "reviews",
            "product_id",
        ));

        let stmt = q.select_statement(10, 1).unwrap();
        assert!(stmt.sql.starts_with(
            "SELECT \"products\".*, \
             (SELECT AVG(\"reviews\".\"rating\") FROM \"reviews\" \
             WHERE \"reviews\".\"product_id\" = \"products\".\"id\") AS \"reviews_avg_rating\", \
             (SELECT COUNT(*) FROM \"reviews\" \
             WHERE \"reviews\".\"product_id\" = \"products\".\"id\") AS \"reviews_count\" FROM"
        ));

        // aggregates never reach the count query
        assert!(!q.count_statement().unwrap().sql.contains("AVG"));
    }

    #[test]
    fn test_raw_predicate_is_renumbered() {
        let mut q = query(Flavor::Postgresql);
        q.where_clause(Predicate::compare(Column::new("a"), CompareOp::Gt, json!(1)));
        q.where_raw("\"b\" BETWEEN ? AND ?", vec![json!(2), json!(3)]);

        let stmt = q.count_statement().unwrap();
        assert!(stmt.sql.ends_with("\"a\" > $1 AND (\"b\" BETWEEN $2 AND $3)"));
        assert_eq!(stmt.params, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_in_and_null_predicates() {
        let mut q = query(Flavor::Postgresql);
        q.where_clause(Predicate::In {
            column: Column::new("tag"),
            values: vec![json!("a"), json!("b")],
        });
        q.where_clause(Predicate::In {
            column: Column::new("tag"),
            values: vec![],
        });
        q.where_clause(Predicate::IsNull {
            column: Column::new("deleted_at"),
            negated: false,
        });

        let stmt = q.count_statement().unwrap();
        assert!(stmt
            .sql
            .ends_with("\"tag\" IN ($1, $2) AND 1 = 0 AND \"deleted_at\" IS NULL"));
    }

    #[test]
    fn test_hostile_identifier_stays_quoted() {
        let mut q = query(Flavor::Postgresql);
        q.order_by(Column::new("name\"; DROP TABLE users;--"), SortOrder::Asc);

        let stmt = q.select_statement(10, 1).unwrap();
        assert!(stmt
            .sql
            .contains("ORDER BY \"name\"\"; DROP TABLE users;--\" ASC"));
    }

    #[tokio::test]
    async fn test_paginate_counts_then_selects() {
        let executor = Arc::new(Recorder {
            total: 25,
            ..Default::default()
        });
        let q = SqlQuery::new(executor.clone(), Flavor::Postgresql, "products");

        let page = q.paginate(10, 2).await.unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.last_page, 3);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.data.len(), 1);

        let statements = executor.statements.lock().unwrap();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].sql.starts_with("SELECT COUNT(*)"));
        assert_eq!(statements[1].params, vec![json!(10), json!(10)]);
    }

    #[tokio::test]
    async fn test_paginate_skips_rows_when_empty() {
        let executor = Arc::new(Recorder::default());
        let q = SqlQuery::new(executor.clone(), Flavor::Sqlite, "products");

        let page = q.paginate(10, 1).await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.last_page, 1);
        assert_eq!(executor.statements.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_aggregate_alias_predicate_uses_subselect() {
        let mut q = query(Flavor::Postgresql);
        q.with_aggregate(&Aggregate::avg("reviews", "reviews", "rating", "product_id"));
        q.where_clause(Predicate::compare(
            Column::new("reviews_avg_rating"),
            CompareOp::Gte,
            json!(4),
        ));

        let subselect = "(SELECT AVG(\"reviews\".\"rating\") FROM \"reviews\" \
                         WHERE \"reviews\".\"product_id\" = \"products\".\"id\")";

        let count = q.count_statement().unwrap();
        assert!(count.sql.ends_with(&format!("WHERE {subselect} >= $1")));

        let select = q.select_statement(10, 1).unwrap();
        assert!(select.sql.contains(&format!("{subselect} AS \"reviews_avg_rating\"")));
        assert!(select.sql.contains(&format!("WHERE {subselect} >= $1")));
    }

    #[tokio::test]
    async fn test_raw_placeholder_mismatch_fails() {
        let executor = Arc::new(Recorder::default());
        let mut q = SqlQuery::new(executor.clone(), Flavor::Postgresql, "products");
        q.where_raw("\"a\" = ? AND \"b\" = ?", vec![json!(1)]);
        q.where_raw("\"c\" = ?", vec![json!(2), json!(3)]);

        let err = q.paginate(10, 1).await.unwrap_err();
        assert!(matches!(
            err,
            SqlError::Placeholder { ref sql, placeholders: 2, params: 1 } if sql == "\"a\" = ? AND \"b\" = ?"
        ));
        assert!(executor.statements.lock().unwrap().is_empty());
    }

    #[test]
    fn test_relation_statement() {
        let q = query(Flavor::Sqlite);
        let stmt = q.relation_statement(
            &Relation::has_many("reviews", "product_id"),
            vec![json!(1), json!(2)],
        );
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"reviews\" WHERE \"product_id\" IN (?1, ?2)"
        );
        assert_eq!(stmt.params, vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_undefined_relation_issues_no_query() {
        let executor = Arc::new(Recorder {
            total: 1,
            ..Default::default()
        });
        let mut q = SqlQuery::new(executor.clone(), Flavor::Postgresql, "products");
        q.with(&["reviews".into()]);

        let page = q.paginate(10, 1).await.unwrap();
        assert!(page.data[0].get("reviews").is_none());
        assert_eq!(executor.statements.lock().unwrap().len(), 2);
    }
}
