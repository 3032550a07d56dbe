//! Eager-loadable relation definitions
//!
//! Both adapters load relations the same way: collect the key values of the
//! page's rows, fetch the related rows once, then attach per row.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Cardinality of an eager-loadable relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// `related.foreign_key = base.owner_key`, loads an array
    HasMany,
    /// `base.foreign_key = related.owner_key`, loads an object or null
    BelongsTo,
}

/// An eager-loadable relation of one base table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub kind: RelationKind,
    pub table: String,
    pub foreign_key: String,
    #[serde(default = "default_owner_key")]
    pub owner_key: String,
}

fn default_owner_key() -> String {
    "id".to_string()
}

impl Relation {
    pub fn has_many(table: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            kind: RelationKind::HasMany,
            table: table.into(),
            foreign_key: foreign_key.into(),
            owner_key: default_owner_key(),
        }
    }

    pub fn belongs_to(table: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            kind: RelationKind::BelongsTo,
            table: table.into(),
            foreign_key: foreign_key.into(),
            owner_key: default_owner_key(),
        }
    }

    /// Column of the base row holding the key
    pub fn local_key(&self) -> &str {
        match self.kind {
            RelationKind::HasMany => &self.owner_key,
            RelationKind::BelongsTo => &self.foreign_key,
        }
    }

    /// Column of the related row matched against [`local_key`](Self::local_key)
    pub fn related_key(&self) -> &str {
        match self.kind {
            RelationKind::HasMany => &self.foreign_key,
            RelationKind::BelongsTo => &self.owner_key,
        }
    }

    /// Distinct non-null key values of `records`, in first-seen order
    pub fn keys<'r>(&self, records: impl IntoIterator<Item = &'r Map<String, Value>>) -> Vec<Value> {
        let mut keys: Vec<Value> = Vec::new();
        for record in records {
            match record.get(self.local_key()) {
                Some(key) if !key.is_null() && !keys.iter().any(|k| same_key(k, key)) => {
                    keys.push(key.clone());
                }
                _ => {}
            }
        }
        keys
    }

    /// The loaded value for one base record: an array for has-many, an
    /// object or null for belongs-to
    pub fn collect<'r>(
        &self,
        record: &Map<String, Value>,
        related: impl IntoIterator<Item = &'r Map<String, Value>>,
    ) -> Value {
        let key = record.get(self.local_key()).unwrap_or(&Value::Null);
        let mut matching = related.into_iter().filter(|r| {
            r.get(self.related_key())
                .is_some_and(|other| same_key(key, other))
        });

        match self.kind {
            RelationKind::HasMany => {
                Value::Array(matching.map(|r| Value::Object(r.clone())).collect())
            }
            RelationKind::BelongsTo => matching
                .next()
                .map_or(Value::Null, |r| Value::Object(r.clone())),
        }
    }
}

/// SQL key equality: NULL matches nothing, `1` matches `1.0`
fn same_key(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(x), Value::Number(y)) => x == y || x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}
