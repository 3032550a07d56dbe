//! # Query Plan Builder
//!
//! Compiles a [`ListQueryRequest`] into calls on a [`QueryHandle`] under a
//! [`FieldPolicy`]. Steps run in a fixed order:
//!
//! 1. relation join (only when `sortBy` names one)
//! 2. aggregate attachments
//! 3. eager relation loading
//! 4. global search, one OR group
//! 5. per-column search, then generic filters
//! 6. caller filter hook
//! 7. sort validation against the whitelist
//! 8. ordering, with NULL placement for nullable columns
//!
//! Column identifiers come only from the policy. Request strings are used
//! to look up policy entries or bound as parameters, never emitted as
//! identifiers.
//!
//! Malformed input never fails the build. It is dropped, or for the sort
//! key replaced by the first whitelist entry and reported through the
//! [`DiagnosticLog`].

use std::collections::BTreeMap;

use serde_json::{Number, Value};

use crate::observability::{DiagnosticLog, EVENT_SORT_FALLBACK};
use crate::policy::FieldPolicy;
use crate::query::{Column, CompareOp, NullsPlacement, Predicate, QueryHandle};
use crate::request::{FilterValue, ListQueryRequest};

/// Resource-specific filter: `(query, columnSearch, qualified base table)`
///
/// The table argument is `Some` only when a join made qualification
/// necessary.
pub type FilterHook<Q> = dyn Fn(&mut Q, &BTreeMap<String, String>, Option<&str>) + Send + Sync;

/// Applies one request to one query handle
pub struct QueryPlanBuilder<'a, L: DiagnosticLog + ?Sized> {
    policy: &'a FieldPolicy,
    log: &'a L,
}

impl<'a, L: DiagnosticLog + ?Sized> QueryPlanBuilder<'a, L> {
    pub fn new(policy: &'a FieldPolicy, log: &'a L) -> Self {
        Self { policy, log }
    }

    /// Apply every step to `query` and hand it back
    pub fn build<Q: QueryHandle>(
        &self,
        mut query: Q,
        req: &ListQueryRequest,
        hook: Option<&FilterHook<Q>>,
    ) -> Q {
        let base = query.base_table().to_string();

        let joined = self.apply_relation_join(&mut query, &base, &req.sort_by);
        let qualifier = joined.then_some(base.as_str());

        for aggregate in &self.policy.aggregates {
            query.with_aggregate(aggregate);
        }

        let relations = self.policy.loadable_relations(&req.relations);
        if !relations.is_empty() {
            query.with(&relations);
        }

        self.apply_search(&mut query, &req.search, qualifier);
        self.apply_column_search(&mut query, &req.column_search, qualifier);
        self.apply_filters(&mut query, &req.filters, qualifier);

        if let Some(hook) = hook {
            hook(&mut query, &req.column_search, qualifier);
        }

        if let Some((sort_alias, sort_column)) = self.resolve_sort_entry(&req.sort_by) {
            let order = req.sort_order.unwrap_or(self.policy.default_sort_order);
            let column = self.column(sort_column, qualifier);

            if self.is_nullable(sort_alias, sort_column) {
                query.order_by_nulls(column, order, NullsPlacement::for_order(order));
            } else {
                query.order_by(column, order);
            }
        }

        query
    }

    /// Whitelisted column for `sort_by`, falling back to the first entry
    ///
    /// `None` when nothing is sortable.
    pub fn resolve_sort(&self, sort_by: &str) -> Option<&'a str> {
        self.resolve_sort_entry(sort_by).map(|(_, column)| column)
    }

    /// `(alias, column)` of the whitelist entry used for `sort_by`
    fn resolve_sort_entry(&self, sort_by: &str) -> Option<(&'a str, &'a str)> {
        let policy = self.policy;
        let (fallback_alias, fallback) = policy.sortable_fields.first()?;

        if let Some((alias, column)) = policy.sortable_fields.get_key_value(sort_by) {
            return Some((alias.as_str(), column.as_str()));
        }

        if !sort_by.is_empty() {
            let allowed = policy
                .sortable_fields
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(",");
            self.log.log(
                EVENT_SORT_FALLBACK,
                &[
                    ("allowed", allowed.as_str()),
                    ("fallback", fallback.as_str()),
                    ("provided", sort_by),
                ],
            );
        }

        Some((fallback_alias.as_str(), fallback.as_str()))
    }

    fn apply_relation_join<Q: QueryHandle>(&self, query: &mut Q, base: &str, sort_by: &str) -> bool {
        let Some(join) = self.policy.relation_joins.get(sort_by) else {
            return false;
        };

        query.left_join(
            &join.table,
            Column::qualified(base, &join.foreign_key),
            Column::qualified(&join.table, "id"),
        );
        query.select(vec![Column::all(base)]);
        true
    }

    fn apply_search<Q: QueryHandle>(&self, query: &mut Q, search: &str, qualifier: Option<&str>) {
        let search = search.trim();
        if search.is_empty() || self.policy.search_fields.is_empty() {
            return;
        }

        let group = self
            .policy
            .search_fields
            .iter()
            .map(|field| {
                Predicate::contains(
                    self.column(field, qualifier),
                    search,
                    self.policy.is_numeric(field),
                )
            })
            .collect();

        query.where_clause(Predicate::Any(group));
    }

    fn apply_column_search<Q: QueryHandle>(
        &self,
        query: &mut Q,
        column_search: &BTreeMap<String, String>,
        qualifier: Option<&str>,
    ) {
        for (alias, value) in column_search {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let Some(column) = self.policy.column_fields.get(alias) else {
                continue;
            };

            query.where_clause(Predicate::contains(
                self.column(column, qualifier),
                value,
                self.is_numeric(alias, column),
            ));
        }
    }

    fn apply_filters<Q: QueryHandle>(
        &self,
        query: &mut Q,
        filters: &BTreeMap<String, FilterValue>,
        qualifier: Option<&str>,
    ) {
        for (alias, value) in filters {
            let Some(column) = self.policy.filter_fields.get(alias) else {
                continue;
            };
            let numeric = self.is_numeric(alias, column);
            let target = self.column(column, qualifier);

            match value {
                FilterValue::Scalar(raw) => {
                    if let Some(value) = bind(raw, numeric) {
                        query.where_clause(Predicate::compare(target, CompareOp::Eq, value));
                    }
                }
                FilterValue::List(items) => {
                    if let Some(predicate) = in_list(target, items.iter().map(String::as_str), numeric) {
                        query.where_clause(predicate);
                    }
                }
                FilterValue::Operators(ops) => {
                    for (op, raw) in ops {
                        if let Some(predicate) = operator(target.clone(), op, raw, numeric) {
                            query.where_clause(predicate);
                        }
                    }
                }
            }
        }
    }

    /// Policy identifier as a column, qualified with the base table after a join
    ///
    /// Aggregate aliases are output columns and stay unqualified.
    fn column(&self, identifier: &str, qualifier: Option<&str>) -> Column {
        let column = Column::parse(identifier);
        match qualifier {
            Some(table) if !self.policy.is_aggregate_alias(identifier) => column.qualify(table),
            _ => column,
        }
    }

    fn is_numeric(&self, alias: &str, column: &str) -> bool {
        self.policy.is_numeric(alias) || self.policy.is_numeric(column)
    }

    fn is_nullable(&self, alias: &str, column: &str) -> bool {
        self.policy.is_nullable(alias) || self.policy.is_nullable(column)
    }
}

/// One `field[op]=value` entry; unknown operators and empty values yield nothing
fn operator(column: Column, op: &str, raw: &str, numeric: bool) -> Option<Predicate> {
    match op {
        "like" => {
            let needle = raw.trim();
            (!needle.is_empty()).then(|| Predicate::contains(column, needle, numeric))
        }
        "in" => in_list(column, raw.split(','), numeric),
        "null" => {
            let negated = match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => false,
                "false" | "0" => true,
                _ => return None,
            };
            Some(Predicate::IsNull { column, negated })
        }
        other => {
            let op = CompareOp::parse(other)?;
            Some(Predicate::compare(column, op, bind(raw, numeric)?))
        }
    }
}

fn in_list<'r>(
    column: Column,
    items: impl Iterator<Item = &'r str>,
    numeric: bool,
) -> Option<Predicate> {
    let values: Vec<Value> = items.filter_map(|item| bind(item, numeric)).collect();
    (!values.is_empty()).then_some(Predicate::In { column, values })
}

/// A request string as a bound parameter
///
/// Numeric fields bind numbers; text that does not parse is dropped.
fn bind(raw: &str, numeric: bool) -> Option<Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if !numeric {
        return Some(Value::String(raw.to_string()));
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Some(Value::from(n));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}
