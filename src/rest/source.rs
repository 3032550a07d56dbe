//! List sources: one engine plus the backend it runs against

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use super::errors::{ApiError, ApiResult};
use crate::engine::ListQueryEngine;
use crate::observability::{Logger, EVENT_LIST_FAILED};
use crate::query::memory::{MemoryQuery, MemoryStore};
use crate::query::sql::{Flavor, SqlExecutor, SqlQuery};
use crate::query::Relation;

/// Something that can answer a list request for one resource
#[async_trait]
pub trait ListSource: Send + Sync {
    /// Shaped envelope for raw query-string pairs
    async fn list(&self, params: Vec<(String, String)>) -> ApiResult<Value>;
}

/// A resource backed by an in-memory table
pub struct MemoryResource {
    engine: ListQueryEngine,
    store: Arc<MemoryStore>,
    table: String,
}

impl MemoryResource {
    pub fn new(engine: ListQueryEngine, store: Arc<MemoryStore>, table: impl Into<String>) -> Self {
        Self {
            engine,
            store,
            table: table.into(),
        }
    }
}

#[async_trait]
impl ListSource for MemoryResource {
    async fn list(&self, params: Vec<(String, String)>) -> ApiResult<Value> {
        let query = MemoryQuery::new(self.store.clone(), &self.table);
        let envelope = self
            .engine
            .list_shaped(query, params)
            .await
            .map_err(|e| upstream(&self.table, &e))?;

        serde_json::to_value(envelope).map_err(|e| ApiError::Internal(e.to_string()))
    }
}

/// A resource backed by a SQL table
pub struct SqlResource<E: SqlExecutor> {
    engine: ListQueryEngine,
    executor: Arc<E>,
    flavor: Flavor,
    table: String,
    relations: IndexMap<String, Relation>,
}

impl<E: SqlExecutor> SqlResource<E> {
    pub fn new(
        engine: ListQueryEngine,
        executor: Arc<E>,
        flavor: Flavor,
        table: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            executor,
            flavor,
            table: table.into(),
            relations: IndexMap::new(),
        }
    }

    /// Relations the `with` parameter can load
    pub fn with_relations(mut self, relations: IndexMap<String, Relation>) -> Self {
        self.relations = relations;
        self
    }
}

#[async_trait]
impl<E: SqlExecutor + 'static> ListSource for SqlResource<E> {
    async fn list(&self, params: Vec<(String, String)>) -> ApiResult<Value> {
        let query = SqlQuery::new(self.executor.clone(), self.flavor, &self.table)
            .with_relations(&self.relations);
        let envelope = self
            .engine
            .list_shaped(query, params)
            .await
            .map_err(|e| upstream(&self.table, &e))?;

        serde_json::to_value(envelope).map_err(|e| ApiError::Internal(e.to_string()))
    }
}

/// Log a backend failure and map it to a 500
fn upstream(table: &str, err: &dyn std::error::Error) -> ApiError {
    let message = err.to_string();
    Logger::error(EVENT_LIST_FAILED, &[("error", message.as_str()), ("table", table)]);
    ApiError::Upstream(message)
}
