//! # List HTTP Server
//!
//! Axum router serving `GET /:resource` for every registered list source.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::errors::{ApiError, ApiResult};
use super::source::{ListSource, MemoryResource, SqlResource};
use crate::config::EngineConfig;
use crate::engine::ListQueryEngine;
use crate::observability::{Logger, EVENT_SERVER_LISTENING};
use crate::query::memory::MemoryStore;
use crate::query::sql::{Flavor, SqlExecutor};

/// Registered list sources by resource name
pub struct ListServer {
    config: EngineConfig,
    resources: HashMap<String, Arc<dyn ListSource>>,
}

type ServerState = Arc<HashMap<String, Arc<dyn ListSource>>>;

impl ListServer {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            resources: HashMap::new(),
        }
    }

    /// Serve every configured resource from in-memory tables
    pub fn memory(config: EngineConfig, store: Arc<MemoryStore>) -> Self {
        let mut server = Self::new(config);
        for (name, resource) in server.config.resources.clone() {
            let engine = server.engine_for(&name, &resource.policy);
            server.register(name, MemoryResource::new(engine, store.clone(), resource.table));
        }
        server
    }

    /// Serve every configured resource from a SQL database
    pub fn sql<E: SqlExecutor + 'static>(config: EngineConfig, executor: Arc<E>, flavor: Flavor) -> Self {
        let mut server = Self::new(config);
        for (name, resource) in server.config.resources.clone() {
            let engine = server.engine_for(&name, &resource.policy);
            let source = SqlResource::new(engine, executor.clone(), flavor, resource.table)
                .with_relations(resource.relations);
            server.register(name, source);
        }
        server
    }

    /// Engine for one resource, linking back to its own route
    pub fn engine_for(&self, name: &str, policy: &crate::policy::FieldPolicy) -> ListQueryEngine {
        ListQueryEngine::new(Arc::new(policy.clone()), self.config.clone(), Logger)
            .with_path(format!("/{}", name))
    }

    pub fn register(&mut self, name: impl Into<String>, source: impl ListSource + 'static) {
        self.resources.insert(name.into(), Arc::new(source));
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Build the Axum router
    pub fn router(self) -> Router {
        let cors = if self.config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = self
                .config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let state: ServerState = Arc::new(self.resources);

        Router::new()
            .route("/:resource", get(list_handler))
            .with_state(state)
            .layer(cors)
    }

    /// Bind and serve until the process exits
    pub async fn serve(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self
            .socket_addr()
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let listener = TcpListener::bind(addr).await?;
        Logger::info(EVENT_SERVER_LISTENING, &[("addr", addr.to_string().as_str())]);

        axum::serve(listener, self.router()).await
    }
}

/// List handler
///
/// Pairs keep their order and repeats so `tag[]` values accumulate.
async fn list_handler(
    State(resources): State<ServerState>,
    Path(resource): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Value>> {
    let source = resources
        .get(&resource)
        .ok_or_else(|| ApiError::UnknownResource(resource.clone()))?;

    Ok(Json(source.list(params).await?))
}
