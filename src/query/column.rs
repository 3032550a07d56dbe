//! Column references

use std::fmt;

/// A possibly table-qualified column
///
/// `name` may be `*` for a whole-table projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub table: Option<String>,
    pub name: String,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    /// `table.*`
    pub fn all(table: impl Into<String>) -> Self {
        Self::qualified(table, "*")
    }

    /// Split a policy identifier such as `categories.name`
    pub fn parse(identifier: &str) -> Self {
        match identifier.rsplit_once('.') {
            Some((table, name)) if !table.is_empty() && !name.is_empty() => {
                Self::qualified(table, name)
            }
            _ => Self::new(identifier),
        }
    }

    /// Prefix with `table` unless already qualified
    pub fn qualify(mut self, table: &str) -> Self {
        if self.table.is_none() {
            self.table = Some(table.to_string());
        }
        self
    }

    pub fn is_wildcard(&self) -> bool {
        self.name == "*"
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Column::parse("name"), Column::new("name"));
        assert_eq!(
            Column::parse("categories.name"),
            Column::qualified("categories", "name")
        );
        assert_eq!(Column::parse(".name"), Column::new(".name"));
    }

    #[test]
    fn test_qualify_keeps_existing_table() {
        assert_eq!(
            Column::new("name").qualify("products").to_string(),
            "products.name"
        );
        assert_eq!(
            Column::parse("categories.name").qualify("products").to_string(),
            "categories.name"
        );
    }

    #[test]
    fn test_wildcard() {
        assert!(Column::all("products").is_wildcard());
        assert_eq!(Column::all("products").to_string(), "products.*");
    }
}
