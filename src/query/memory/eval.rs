//! Predicate and ordering evaluation over JSON rows

use std::cmp::Ordering as CmpOrdering;

use serde_json::{Map, Value};

use super::store::{StoreError, StoreResult};
use crate::query::{Column, CompareOp, NullsPlacement, Ordering, Predicate};
use crate::request::SortOrder;

/// One working row: the base record plus any joined records
pub(super) struct Row<'a> {
    pub base_table: &'a str,
    pub base: Map<String, Value>,
    pub joined: Vec<(&'a str, Option<&'a Map<String, Value>>)>,
}

impl<'a> Row<'a> {
    /// Resolve a column; missing values read as NULL
    pub fn get(&self, column: &Column) -> &Value {
        let found = match column.table.as_deref() {
            None => self.base.get(&column.name).or_else(|| {
                self.joined
                    .iter()
                    .find_map(|(_, row)| row.and_then(|r| r.get(&column.name)))
            }),
            Some(table) if table == self.base_table => self.base.get(&column.name),
            Some(table) => self
                .joined
                .iter()
                .find(|(name, _)| *name == table)
                .and_then(|(_, row)| row.and_then(|r| r.get(&column.name))),
        };

        found.unwrap_or(&Value::Null)
    }
}

/// Evaluate a predicate against a row
///
/// OR groups evaluate every member so type errors surface regardless of
/// row contents.
pub(super) fn matches(row: &Row<'_>, predicate: &Predicate) -> StoreResult<bool> {
    match predicate {
        Predicate::Like {
            column,
            pattern,
            cast_to_text,
        } => {
            let text = match (row.get(column), cast_to_text) {
                (Value::Null, _) => return Ok(false),
                (Value::String(s), _) => s.clone(),
                (other, true) => value_as_text(other),
                (_, false) => return Err(StoreError::PatternOnNonText(column.to_string())),
            };
            Ok(like_match(&text.to_lowercase(), &pattern.to_lowercase()))
        }
        Predicate::Compare { column, op, value } => {
            let field = row.get(column);
            if field.is_null() || value.is_null() {
                return Ok(false);
            }
            let Some(ord) = compare_values(field, value) else {
                return Ok(false);
            };
            Ok(match op {
                CompareOp::Eq => ord == CmpOrdering::Equal,
                CompareOp::Neq => ord != CmpOrdering::Equal,
                CompareOp::Gt => ord == CmpOrdering::Greater,
                CompareOp::Gte => ord != CmpOrdering::Less,
                CompareOp::Lt => ord == CmpOrdering::Less,
                CompareOp::Lte => ord != CmpOrdering::Greater,
            })
        }
        Predicate::In { column, values } => {
            let field = row.get(column);
            Ok(!field.is_null()
                && values
                    .iter()
                    .any(|v| compare_values(field, v) == Some(CmpOrdering::Equal)))
        }
        Predicate::IsNull { column, negated } => Ok(row.get(column).is_null() != *negated),
        Predicate::Any(group) => {
            let mut any = false;
            for member in group {
                any |= matches(row, member)?;
            }
            Ok(any)
        }
        Predicate::Raw { sql, .. } => Err(StoreError::RawPredicate(sql.clone())),
    }
}

/// Order two rows by a list of orderings
///
/// Without explicit placement NULLs compare as the largest value, which is
/// what Postgres does.
pub(super) fn compare_rows(a: &Row<'_>, b: &Row<'_>, orderings: &[Ordering]) -> CmpOrdering {
    for ordering in orderings {
        let nulls = ordering.nulls.unwrap_or(match ordering.order {
            SortOrder::Asc => NullsPlacement::Last,
            SortOrder::Desc => NullsPlacement::First,
        });

        let (va, vb) = (a.get(&ordering.column), b.get(&ordering.column));
        let cmp = match (va.is_null(), vb.is_null()) {
            (true, true) => CmpOrdering::Equal,
            (true, false) if nulls == NullsPlacement::First => CmpOrdering::Less,
            (true, false) => CmpOrdering::Greater,
            (false, true) if nulls == NullsPlacement::First => CmpOrdering::Greater,
            (false, true) => CmpOrdering::Less,
            (false, false) => {
                let cmp = compare_values(va, vb).unwrap_or(CmpOrdering::Equal);
                match ordering.order {
                    SortOrder::Asc => cmp,
                    SortOrder::Desc => cmp.reverse(),
                }
            }
        };

        if cmp != CmpOrdering::Equal {
            return cmp;
        }
    }
    CmpOrdering::Equal
}

/// Compare two JSON values of the same kind
pub(super) fn compare_values(a: &Value, b: &Value) -> Option<CmpOrdering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return Some(a.cmp(&b));
            }
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// SQL LIKE: `%` any sequence, `_` any single character
pub(super) fn like_match(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.chars().collect();

    // reachable[i]: the pattern prefix seen so far can end at value[..i]
    let mut reachable = vec![false; value.len() + 1];
    reachable[0] = true;

    for p in pattern.chars() {
        let mut next = vec![false; value.len() + 1];
        match p {
            '%' => {
                let mut seen = false;
                for i in 0..=value.len() {
                    seen |= reachable[i];
                    next[i] = seen;
                }
            }
            '_' => {
                for i in 0..value.len() {
                    next[i + 1] = reachable[i];
                }
            }
            c => {
                for i in 0..value.len() {
                    next[i + 1] = reachable[i] && value[i] == c;
                }
            }
        }
        reachable = next;
    }

    reachable[value.len()]
}
