//! # Query Options Parser
//!
//! Classifies raw query parameters into a [`ListQueryRequest`].
//!
//! Parsing never fails: every key is either recognized, defaulted, or
//! handed on as a filter candidate. Validation against the resource's
//! field policy happens in the plan builder.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::{FilterValue, ListQueryRequest, SortOrder};

/// Page size used when the request does not carry a usable one
pub const DEFAULT_LIMIT: u64 = 15;

/// Largest page size a request may ask for
pub const MAX_LIMIT: u64 = 100;

/// Keys with a fixed meaning; never treated as filters
pub const EXCLUDED_KEYS: [&str; 6] = ["page", "limit", "search", "sortBy", "sortOrder", "with"];

const COLUMN_SEARCH_KEY: &str = "columnSearch";

static COLUMN_SEARCH_PATTERN: OnceLock<Regex> = OnceLock::new();
static BRACKET_PATTERN: OnceLock<Regex> = OnceLock::new();

/// `columnSearch[<field>]`
fn column_search_pattern() -> &'static Regex {
    COLUMN_SEARCH_PATTERN
        .get_or_init(|| Regex::new(r"^columnSearch\[([^\[\]]+)\]$").expect("static regex"))
}

/// `<field>[<op>]` or `<field>[]`
fn bracket_pattern() -> &'static Regex {
    BRACKET_PATTERN.get_or_init(|| Regex::new(r"^([^\[\]]+)\[([^\[\]]*)\]$").expect("static regex"))
}

/// Parser configured with the caller's page-size bounds
#[derive(Debug, Clone, Copy)]
pub struct QueryOptionsParser {
    default_limit: u64,
    max_limit: u64,
}

impl Default for QueryOptionsParser {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, MAX_LIMIT)
    }
}

impl QueryOptionsParser {
    /// Bounds are normalized so that `1 <= default_limit <= max_limit`
    pub fn new(default_limit: u64, max_limit: u64) -> Self {
        let max_limit = max_limit.max(1);
        Self {
            default_limit: default_limit.clamp(1, max_limit),
            max_limit,
        }
    }

    pub fn default_limit(&self) -> u64 {
        self.default_limit
    }

    pub fn max_limit(&self) -> u64 {
        self.max_limit
    }

    /// Parse flat `key=value` pairs
    ///
    /// Later duplicates overwrite earlier ones, except `field[]` keys which
    /// accumulate.
    pub fn parse<I, K, V>(&self, params: I) -> ListQueryRequest
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut request = ListQueryRequest {
            limit: self.default_limit,
            ..Default::default()
        };

        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());

            match key {
                "page" => request.page = parse_page(value),
                "limit" => request.limit = self.parse_limit(value),
                "search" => request.search = value.trim().to_string(),
                "sortBy" => request.sort_by = value.trim().to_string(),
                "sortOrder" => request.sort_order = SortOrder::parse(value),
                "with" => request.relations = parse_relations(value),
                COLUMN_SEARCH_KEY => merge_encoded_column_search(&mut request, value),
                _ => classify_flat_key(&mut request, key, value),
            }
        }

        request
    }

    /// Parse an already-nested parameter object
    pub fn parse_json(&self, params: &Map<String, Value>) -> ListQueryRequest {
        let mut request = ListQueryRequest {
            limit: self.default_limit,
            ..Default::default()
        };

        for (key, value) in params {
            match key.as_str() {
                "page" => {
                    request.page = scalar_string(value).map(|v| parse_page(&v)).unwrap_or(1);
                }
                "limit" => {
                    request.limit = scalar_string(value)
                        .map(|v| self.parse_limit(&v))
                        .unwrap_or(self.default_limit);
                }
                "search" => {
                    request.search = scalar_string(value).unwrap_or_default().trim().to_string();
                }
                "sortBy" => {
                    request.sort_by = scalar_string(value).unwrap_or_default().trim().to_string();
                }
                "sortOrder" => {
                    request.sort_order = scalar_string(value).and_then(|v| SortOrder::parse(&v));
                }
                "with" => {
                    request.relations = match value {
                        Value::Array(items) => items
                            .iter()
                            .filter_map(scalar_string)
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect(),
                        other => scalar_string(other)
                            .map(|v| parse_relations(&v))
                            .unwrap_or_default(),
                    };
                }
                COLUMN_SEARCH_KEY => match value {
                    Value::Object(fields) => merge_column_search_object(&mut request, fields),
                    Value::String(encoded) => merge_encoded_column_search(&mut request, encoded),
                    _ => {}
                },
                _ => {
                    if let Some(filter) = json_filter_value(value) {
                        request.filters.insert(key.clone(), filter);
                    }
                }
            }
        }

        request
    }

    fn parse_limit(&self, value: &str) -> u64 {
        match value.trim().parse::<u64>() {
            Ok(0) | Err(_) => self.default_limit,
            Ok(limit) => limit.min(self.max_limit),
        }
    }
}

/// Non-numeric or zero pages fall back to the first page
fn parse_page(value: &str) -> u64 {
    match value.trim().parse::<u64>() {
        Ok(0) | Err(_) => 1,
        Ok(page) => page,
    }
}

/// Comma-separated relation list, order preserved
fn parse_relations(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn classify_flat_key(request: &mut ListQueryRequest, key: &str, value: &str) {
    if let Some(caps) = column_search_pattern().captures(key) {
        request
            .column_search
            .insert(caps[1].to_string(), value.to_string());
        return;
    }

    if let Some(caps) = bracket_pattern().captures(key) {
        let field = caps[1].to_string();
        let operator = &caps[2];

        if operator.is_empty() {
            push_list_values(request, field, value);
        } else {
            push_operator(request, field, operator, value);
        }
        return;
    }

    if !key.is_empty() {
        request
            .filters
            .insert(key.to_string(), FilterValue::Scalar(value.to_string()));
    }
}

fn push_list_values(request: &mut ListQueryRequest, field: String, value: &str) {
    let values = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    match request.filters.get_mut(&field) {
        Some(FilterValue::List(existing)) => existing.extend(values),
        _ => {
            request
                .filters
                .insert(field, FilterValue::List(values.collect()));
        }
    }
}

fn push_operator(request: &mut ListQueryRequest, field: String, operator: &str, value: &str) {
    match request.filters.get_mut(&field) {
        Some(FilterValue::Operators(ops)) => {
            ops.insert(operator.to_string(), value.to_string());
        }
        _ => {
            let mut ops = BTreeMap::new();
            ops.insert(operator.to_string(), value.to_string());
            request.filters.insert(field, FilterValue::Operators(ops));
        }
    }
}

/// `columnSearch` sent as a JSON-encoded object in a flat transport
fn merge_encoded_column_search(request: &mut ListQueryRequest, encoded: &str) {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(encoded) {
        merge_column_search_object(request, &fields);
    }
}

fn merge_column_search_object(request: &mut ListQueryRequest, fields: &Map<String, Value>) {
    for (field, value) in fields {
        if let Some(value) = scalar_string(value) {
            request.column_search.insert(field.clone(), value);
        }
    }
}

fn json_filter_value(value: &Value) -> Option<FilterValue> {
    match value {
        Value::Array(items) => Some(FilterValue::List(
            items.iter().filter_map(scalar_string).collect(),
        )),
        Value::Object(ops) => Some(FilterValue::Operators(
            ops.iter()
                .filter_map(|(op, v)| scalar_string(v).map(|v| (op.clone(), v)))
                .collect(),
        )),
        other => scalar_string(other).map(FilterValue::Scalar),
    }
}

/// Strings, numbers, and booleans as text; everything else is absent
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
