//! # Predicates
//!
//! WHERE-clause building blocks. Values are carried separately from
//! identifiers so every adapter can bind them as parameters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Column;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "eq")]
    Eq,

    #[serde(rename = "neq")]
    Neq,

    #[serde(rename = "gt")]
    Gt,

    #[serde(rename = "gte")]
    Gte,

    #[serde(rename = "lt")]
    Lt,

    #[serde(rename = "lte")]
    Lte,
}

impl CompareOp {
    /// Query-string spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Neq => "neq",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
        }
    }

    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "eq" => Some(CompareOp::Eq),
            "neq" => Some(CompareOp::Neq),
            "gt" => Some(CompareOp::Gt),
            "gte" => Some(CompareOp::Gte),
            "lt" => Some(CompareOp::Lt),
            "lte" => Some(CompareOp::Lte),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Neq => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }
}

/// A WHERE-clause predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Case-insensitive pattern match (`%` and `_` wildcards)
    Like {
        column: Column,
        pattern: String,
        /// Cast the column to text first; pattern operators only apply to text
        cast_to_text: bool,
    },

    Compare {
        column: Column,
        op: CompareOp,
        value: Value,
    },

    In {
        column: Column,
        values: Vec<Value>,
    },

    IsNull {
        column: Column,
        negated: bool,
    },

    /// Parenthesized OR group; an empty group matches nothing
    Any(Vec<Predicate>),

    /// Backend-specific predicate with positional `?` placeholders
    Raw { sql: String, params: Vec<Value> },
}

impl Predicate {
    /// Substring match: `column LIKE %needle%`
    pub fn contains(column: Column, needle: &str, cast_to_text: bool) -> Self {
        Predicate::Like {
            column,
            pattern: format!("%{}%", needle),
            cast_to_text,
        }
    }

    pub fn compare(column: Column, op: CompareOp, value: Value) -> Self {
        Predicate::Compare { column, op, value }
    }

    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Predicate::Raw {
            sql: sql.into(),
            params,
        }
    }

    /// First raw predicate whose `?` count differs from its parameter count,
    /// as `(sql, placeholders, params)`
    pub fn placeholder_mismatch(&self) -> Option<(&str, usize, usize)> {
        match self {
            Predicate::Raw { sql, params } => {
                let placeholders = sql.matches('?').count();
                (placeholders != params.len()).then_some((sql.as_str(), placeholders, params.len()))
            }
            Predicate::Any(group) => group.iter().find_map(Predicate::placeholder_mismatch),
            _ => None,
        }
    }

    /// Columns referenced, in order
    pub fn columns(&self) -> Vec<&Column> {
        match self {
            Predicate::Like { column, .. }
            | Predicate::Compare { column, .. }
            | Predicate::In { column, .. }
            | Predicate::IsNull { column, .. } => vec![column],
            Predicate::Any(group) => group.iter().flat_map(Predicate::columns).collect(),
            Predicate::Raw { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compare_op_round_trip_names() {
        for op in ["eq", "neq", "gt", "gte", "lt", "lte"] {
            assert_eq!(CompareOp::parse(op).unwrap().as_str(), op);
        }
        assert_eq!(CompareOp::parse("like"), None);
        assert_eq!(serde_json::to_value(CompareOp::Gte).unwrap(), json!("gte"));
    }

    #[test]
    fn test_contains_wraps_pattern() {
        let p = Predicate::contains(Column::new("name"), "ali", false);
        assert!(matches!(p, Predicate::Like { ref pattern, .. } if pattern == "%ali%"));
    }

    #[test]
    fn test_placeholder_mismatch() {
        let ok = Predicate::raw("a = ? AND b = ?", vec![json!(1), json!(2)]);
        assert_eq!(ok.placeholder_mismatch(), None);

        let short = Predicate::raw("a = ? AND b = ?", vec![json!(1)]);
        assert_eq!(short.placeholder_mismatch(), Some(("a = ? AND b = ?", 2, 1)));

        let nested = Predicate::Any(vec![
            Predicate::contains(Column::new("name"), "x", false),
            Predicate::raw("c = ?", vec![json!(2), json!(3)]),
        ]);
        assert_eq!(nested.placeholder_mismatch(), Some(("c = ?", 1, 2)));
    }

    #[test]
    fn test_columns_flattens_groups() {
        let p = Predicate::Any(vec![
            Predicate::contains(Column::new("a"), "x", false),
            Predicate::compare(Column::new("b"), CompareOp::Eq, json!(1)),
            Predicate::raw("1 = 1", vec![]),
        ]);

        let names: Vec<_> = p.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
