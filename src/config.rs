//! Engine configuration
//!
//! Page-size bounds, envelope shape, link path and the HTTP surface,
//! loadable from a JSON file. Resources can be declared in the same file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::envelope::EnvelopeShape;
use crate::policy::FieldPolicy;
use crate::query::Relation;
use crate::request::{QueryOptionsParser, DEFAULT_LIMIT, MAX_LIMIT};

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File is not valid config JSON
    #[error("Malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Values parsed but are unusable
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// A list resource: table plus the policy guarding it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub table: String,
    #[serde(default)]
    pub policy: FieldPolicy,
    /// Eager-loadable relations for SQL-backed resources, by name
    #[serde(default)]
    pub relations: IndexMap<String, Relation>,
}

impl ResourceConfig {
    pub fn new(table: impl Into<String>, policy: FieldPolicy) -> Self {
        Self {
            table: table.into(),
            policy,
            relations: IndexMap::new(),
        }
    }

    pub fn relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.relations.insert(name.into(), relation);
        self
    }
}

/// List engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Page size when `limit` is absent or invalid (default: 15)
    #[serde(default = "default_limit")]
    pub default_limit: u64,

    /// Largest accepted page size (default: 100)
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,

    /// Response shape (default: meta_links)
    #[serde(default)]
    pub envelope: EnvelopeShape,

    /// Path prefix for pagination links (default: "")
    #[serde(default)]
    pub path: String,

    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS allowed origins (default: ["http://localhost:5173"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Resources served over HTTP, by name
    #[serde(default)]
    pub resources: IndexMap<String, ResourceConfig>,
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

fn default_max_limit() -> u64 {
    MAX_LIMIT
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            envelope: EnvelopeShape::default(),
            path: String::new(),
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            resources: IndexMap::new(),
        }
    }
}

impl EngineConfig {
    /// Read and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_limit == 0 || self.max_limit == 0 {
            return Err(ConfigError::Invalid("page limits must be positive".into()));
        }
        if self.default_limit > self.max_limit {
            return Err(ConfigError::Invalid(format!(
                "default_limit {} exceeds max_limit {}",
                self.default_limit, self.max_limit
            )));
        }
        Ok(())
    }

    /// Parser bound to this config's page-size limits
    pub fn parser(&self) -> QueryOptionsParser {
        QueryOptionsParser::new(self.default_limit, self.max_limit)
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.default_limit, 15);
        assert_eq!(config.max_limit, 100);
        assert_eq!(config.envelope, EnvelopeShape::MetaLinks);
        assert_eq!(config.socket_addr(), "0.0.0.0:8080");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "max_limit": 50,
                "envelope": "pagination",
                "resources": {{
                    "products": {{
                        "table": "products",
                        "policy": {{
                            "search_fields": ["name"],
                            "sortable_fields": {{"price": "price", "name": "name"}},
                            "default_sort_order": "asc"
                        }},
                        "relations": {{
                            "reviews": {{"kind": "has_many", "table": "reviews", "foreign_key": "product_id"}}
                        }}
                    }}
                }}
            }}"#
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.default_limit, 15);
        assert_eq!(config.max_limit, 50);
        assert_eq!(config.envelope, EnvelopeShape::Pagination);

        let products = &config.resources["products"];
        assert_eq!(products.table, "products");
        assert_eq!(
            products.policy.sortable_fields.keys().collect::<Vec<_>>(),
            vec!["price", "name"]
        );
        assert_eq!(
            products.policy.default_sort_order,
            crate::request::SortOrder::Asc
        );
        assert_eq!(
            products.relations["reviews"],
            Relation::has_many("reviews", "product_id")
        );
    }

    #[test]
    fn test_load_errors() {
        let missing = EngineConfig::load("/nonexistent/listkit.json");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            EngineConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));

        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_limit": 200, "max_limit": 100}}"#).unwrap();
        assert!(matches!(
            EngineConfig::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }
}
