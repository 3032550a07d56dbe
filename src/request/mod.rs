//! # List Requests
//!
//! The normalized, immutable form of a list query string.

mod parser;

pub use parser::{QueryOptionsParser, DEFAULT_LIMIT, EXCLUDED_KEYS, MAX_LIMIT};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Case-insensitive `asc`/`desc`; anything else is `None`
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

/// A generic filter value as it arrived
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// `status=active`
    Scalar(String),
    /// `tag[]=a,b`
    List(Vec<String>),
    /// `price[gte]=10&price[lt]=50`
    Operators(BTreeMap<String, String>),
}

/// A parsed list request
///
/// Produced once per request by [`QueryOptionsParser`]. Maps are ordered so
/// the compiled plan is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQueryRequest {
    /// 1-based page number
    pub page: u64,

    /// Page size, within `[1, max_limit]`
    pub limit: u64,

    /// Free-text search, trimmed
    pub search: String,

    /// Per-column search, alias -> value
    pub column_search: BTreeMap<String, String>,

    /// Raw sort key, validated by the plan builder
    pub sort_by: String,

    /// Sort direction, `None` when absent or unrecognized
    pub sort_order: Option<SortOrder>,

    /// Generic filters, alias -> value
    pub filters: BTreeMap<String, FilterValue>,

    /// Relations to eager load, in request order
    pub relations: Vec<String>,
}

impl Default for ListQueryRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: parser::DEFAULT_LIMIT,
            search: String::new(),
            column_search: BTreeMap::new(),
            sort_by: String::new(),
            sort_order: None,
            filters: BTreeMap::new(),
            relations: Vec::new(),
        }
    }
}

impl ListQueryRequest {
    /// Number of rows skipped before this page
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    /// Everything but `page` and `limit`, as flat query pairs
    ///
    /// Parsing the pairs again yields the same search, sort, filters and
    /// relations.
    pub fn link_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if !self.search.is_empty() {
            params.push(("search".to_string(), self.search.clone()));
        }
        if !self.sort_by.is_empty() {
            params.push(("sortBy".to_string(), self.sort_by.clone()));
        }
        if let Some(order) = self.sort_order {
            params.push(("sortOrder".to_string(), order.to_string()));
        }
        for (field, value) in &self.column_search {
            params.push((format!("columnSearch[{}]", field), value.clone()));
        }
        for (field, value) in &self.filters {
            match value {
                FilterValue::Scalar(raw) => params.push((field.clone(), raw.clone())),
                FilterValue::List(items) => params.push((format!("{}[]", field), items.join(","))),
                FilterValue::Operators(ops) => {
                    for (op, raw) in ops {
                        params.push((format!("{}[{}]", field, op), raw.clone()));
                    }
                }
            }
        }
        if !self.relations.is_empty() {
            params.push(("with".to_string(), self.relations.join(",")));
        }

        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::parse("asc"), Some(SortOrder::Asc));
        assert_eq!(SortOrder::parse(" DESC "), Some(SortOrder::Desc));
        assert_eq!(SortOrder::parse("sideways"), None);
        assert_eq!(SortOrder::parse(""), None);
    }

    #[test]
    fn test_offset() {
        let req = ListQueryRequest {
            page: 3,
            limit: 10,
            ..Default::default()
        };
        assert_eq!(req.offset(), 20);
        assert_eq!(ListQueryRequest::default().offset(), 0);
    }

    #[test]
    fn test_link_params_reparse() {
        let parser = QueryOptionsParser::default();
        let req = parser.parse([
            ("page", "3"),
            ("limit", "20"),
            ("search", "red desk"),
            ("sortBy", "price"),
            ("sortOrder", "ASC"),
            ("columnSearch[title]", "oak"),
            ("status", "active"),
            ("tag[]", "a,b"),
            ("price[gte]", "10"),
            ("with", "category, reviews"),
        ]);

        let params = req.link_params();
        assert!(params.iter().all(|(k, _)| k != "page" && k != "limit"));
        assert!(params.contains(&("sortOrder".to_string(), "asc".to_string())));

        let again = parser.parse(params);
        assert_eq!(again.search, req.search);
        assert_eq!(again.sort_by, req.sort_by);
        assert_eq!(again.sort_order, req.sort_order);
        assert_eq!(again.column_search, req.column_search);
        assert_eq!(again.filters, req.filters);
        assert_eq!(again.relations, req.relations);
        assert!(ListQueryRequest::default().link_params().is_empty());
    }

    #[test]
    fn test_filter_value_untagged_json() {
        let scalar: FilterValue = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(scalar, FilterValue::Scalar("active".into()));

        let list: FilterValue = serde_json::from_str("[\"a\",\"b\"]").unwrap();
        assert_eq!(list, FilterValue::List(vec!["a".into(), "b".into()]));

        let ops: FilterValue = serde_json::from_str("{\"gte\":\"10\"}").unwrap();
        assert!(matches!(ops, FilterValue::Operators(m) if m["gte"] == "10"));
    }
}
