//! Plan -> SQL text + bound parameters

use serde_json::Value;

use super::flavor::Flavor;
use crate::policy::{Aggregate, AggregateKind};
use crate::query::{Column, Join, Ordering, Predicate};
use crate::request::SortOrder;

/// A rendered statement
///
/// `sql` contains identifiers and placeholders only; every value is in
/// `params`, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

pub(super) struct Formatter<'a> {
    flavor: Flavor,
    dst: String,
    params: Vec<Value>,
    base: &'a str,
    /// Output aliases are not visible in WHERE; predicates on them render
    /// the subselect instead
    aggregates: &'a [Aggregate],
}

impl<'a> Formatter<'a> {
    pub(super) fn new(flavor: Flavor, base: &'a str, aggregates: &'a [Aggregate]) -> Self {
        Self {
            flavor,
            dst: String::with_capacity(256),
            params: Vec::new(),
            base,
            aggregates,
        }
    }

    pub(super) fn finish(self) -> Statement {
        Statement {
            sql: self.dst,
            params: self.params,
        }
    }

    pub(super) fn push(&mut self, sql: &str) {
        self.dst.push_str(sql);
    }

    pub(super) fn param(&mut self, value: Value) {
        self.params.push(value);
        let placeholder = self.flavor.placeholder(self.params.len());
        self.dst.push_str(&placeholder);
    }

    pub(super) fn ident(&mut self, ident: &str) {
        let quoted = self.flavor.quote(ident);
        self.dst.push_str(&quoted);
    }

    pub(super) fn column(&mut self, column: &Column) {
        if let Some(table) = &column.table {
            self.ident(table);
            self.push(".");
        }
        if column.is_wildcard() {
            self.push("*");
        } else {
            self.ident(&column.name);
        }
    }

    pub(super) fn projection(&mut self, columns: &[Column]) {
        let mut first = true;

        if columns.is_empty() {
            self.column(&Column::all(self.base));
            first = false;
        }

        for column in columns {
            if !first {
                self.push(", ");
            }
            self.column(column);
            first = false;
        }

        let aggregates = self.aggregates;
        for aggregate in aggregates {
            if !first {
                self.push(", ");
            }
            self.aggregate(aggregate);
            self.push(" AS ");
            self.ident(&aggregate.alias());
            first = false;
        }
    }

    /// `(SELECT AVG(t.c) FROM t WHERE t.fk = base.pk)`
    fn aggregate(&mut self, aggregate: &Aggregate) {
        self.push("(SELECT ");
        self.push(aggregate.kind.sql_function());
        self.push("(");
        match (&aggregate.kind, &aggregate.column) {
            (AggregateKind::Count, _) | (_, None) => self.push("*"),
            (_, Some(column)) => self.column(&Column::qualified(&aggregate.table, column)),
        }
        self.push(") FROM ");
        self.ident(&aggregate.table);
        self.push(" WHERE ");
        self.column(&Column::qualified(&aggregate.table, &aggregate.foreign_key));
        self.push(" = ");
        self.column(&Column::qualified(self.base, &aggregate.local_key));
        self.push(")");
    }

    /// A predicate operand: the column, or the subselect behind an aggregate alias
    fn operand(&mut self, column: &Column) {
        let aggregates = self.aggregates;
        let aggregate = match column.table {
            None => aggregates.iter().find(|a| a.alias() == column.name),
            Some(_) => None,
        };

        match aggregate {
            Some(aggregate) => self.aggregate(aggregate),
            None => self.column(column),
        }
    }

    pub(super) fn joins(&mut self, joins: &[Join]) {
        for join in joins {
            self.push(" LEFT JOIN ");
            self.ident(&join.table);
            self.push(" ON ");
            self.column(&join.first);
            self.push(" = ");
            self.column(&join.second);
        }
    }

    pub(super) fn where_clause(&mut self, predicates: &[Predicate]) {
        for (i, predicate) in predicates.iter().enumerate() {
            self.push(if i == 0 { " WHERE " } else { " AND " });
            self.predicate(predicate);
        }
    }

    fn predicate(&mut self, predicate: &Predicate) {
        match predicate {
            Predicate::Like {
                column,
                pattern,
                cast_to_text,
            } => {
                if *cast_to_text {
                    self.push("CAST(");
                    self.operand(column);
                    self.push(" AS ");
                    self.push(self.flavor.text_type());
                    self.push(")");
                } else {
                    self.operand(column);
                }
                self.push(" ");
                self.push(self.flavor.like_operator());
                self.push(" ");
                self.param(Value::String(pattern.clone()));
            }
            Predicate::Compare { column, op, value } => {
                self.operand(column);
                self.push(" ");
                self.push(op.as_sql());
                self.push(" ");
                self.param(value.clone());
            }
            Predicate::In { column, values } => {
                if values.is_empty() {
                    self.push("1 = 0");
                    return;
                }
                self.operand(column);
                self.push(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.param(value.clone());
                }
                self.push(")");
            }
            Predicate::IsNull { column, negated } => {
                self.operand(column);
                self.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Predicate::Any(group) => {
                if group.is_empty() {
                    self.push("1 = 0");
                    return;
                }
                self.push("(");
                for (i, predicate) in group.iter().enumerate() {
                    if i > 0 {
                        self.push(" OR ");
                    }
                    self.predicate(predicate);
                }
                self.push(")");
            }
            Predicate::Raw { sql, params } => {
                self.push("(");
                self.raw(sql, params);
                self.push(")");
            }
        }
    }

    /// Renumber `?` placeholders into this statement's parameter list
    ///
    /// Arity is checked before rendering; see [`Predicate::placeholder_mismatch`].
    fn raw(&mut self, sql: &str, params: &[Value]) {
        let mut params = params.iter();
        for c in sql.chars() {
            if c == '?' {
                if let Some(value) = params.next() {
                    self.param(value.clone());
                    continue;
                }
            }
            self.dst.push(c);
        }
    }

    pub(super) fn order_by(&mut self, orderings: &[Ordering]) {
        for (i, ordering) in orderings.iter().enumerate() {
            self.push(if i == 0 { " ORDER BY " } else { ", " });

            match ordering.nulls {
                Some(nulls) if self.flavor.supports_nulls_ordering() => {
                    self.column(&ordering.column);
                    self.push(" ");
                    self.push(ordering.order.as_sql());
                    self.push(" ");
                    self.push(nulls.as_sql());
                }
                Some(nulls) => {
                    // `col IS NULL` sorts false (0) before true (1)
                    let nulls_first = nulls == crate::query::NullsPlacement::First;
                    self.column(&ordering.column);
                    self.push(" IS NULL ");
                    self.push(if nulls_first {
                        SortOrder::Desc.as_sql()
                    } else {
                        SortOrder::Asc.as_sql()
                    });
                    self.push(", ");
                    self.column(&ordering.column);
                    self.push(" ");
                    self.push(ordering.order.as_sql());
                }
                None => {
                    self.column(&ordering.column);
                    self.push(" ");
                    self.push(ordering.order.as_sql());
                }
            }
        }
    }

    pub(super) fn limit_offset(&mut self, limit: u64, offset: u64) {
        self.push(" LIMIT ");
        self.param(Value::from(limit));
        self.push(" OFFSET ");
        self.param(Value::from(offset));
    }
}
