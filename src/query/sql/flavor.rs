//! SQL dialect differences

use serde::{Deserialize, Serialize};

/// Target database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    Postgresql,
    Sqlite,
    Mysql,
}

impl Flavor {
    /// Positional placeholder for the `n`th (1-based) parameter
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Flavor::Mysql => "?".to_string(),
            Flavor::Postgresql => format!("${}", n),
            Flavor::Sqlite => format!("?{}", n),
        }
    }

    /// Quote one identifier segment, doubling embedded quote characters
    pub fn quote(&self, ident: &str) -> String {
        let quote = match self {
            Flavor::Mysql => '`',
            Flavor::Postgresql | Flavor::Sqlite => '"',
        };

        let mut out = String::with_capacity(ident.len() + 2);
        out.push(quote);
        for c in ident.chars() {
            if c == quote {
                out.push(quote);
            }
            out.push(c);
        }
        out.push(quote);
        out
    }

    /// Case-insensitive pattern operator
    pub fn like_operator(&self) -> &'static str {
        match self {
            Flavor::Postgresql => "ILIKE",
            // SQLite LIKE is case-insensitive for ASCII, MySQL follows the
            // column collation (case-insensitive by default)
            Flavor::Sqlite | Flavor::Mysql => "LIKE",
        }
    }

    /// Text type used when casting a column for pattern matching
    pub fn text_type(&self) -> &'static str {
        match self {
            Flavor::Postgresql | Flavor::Sqlite => "TEXT",
            Flavor::Mysql => "CHAR",
        }
    }

    /// Whether `NULLS FIRST` / `NULLS LAST` is understood natively
    pub fn supports_nulls_ordering(&self) -> bool {
        !matches!(self, Flavor::Mysql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(Flavor::Postgresql.placeholder(3), "$3");
        assert_eq!(Flavor::Sqlite.placeholder(3), "?3");
        assert_eq!(Flavor::Mysql.placeholder(3), "?");
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(Flavor::Postgresql.quote("name"), "\"name\"");
        assert_eq!(Flavor::Postgresql.quote("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(Flavor::Mysql.quote("na`me"), "`na``me`");
    }
}
