//! # List Query Engine
//!
//! The single entry point callers use: parse, build, paginate, shape.
//!
//! ```ignore
//! let engine = ListQueryEngine::new(Arc::new(policy), EngineConfig::default(), Logger);
//! let query = SqlQuery::new(executor, Flavor::Postgresql, "products");
//! let envelope = engine.list(query, params).await?;
//! ```
//!
//! The engine holds no per-request state. One instance serves concurrent
//! requests; every call brings its own query handle.

use std::sync::Arc;

use crate::builder::{FilterHook, QueryPlanBuilder};
use crate::config::EngineConfig;
use crate::envelope::{ListEnvelope, PaginationEnvelopeFormatter, ShapedEnvelope};
use crate::observability::{DiagnosticLog, Logger};
use crate::policy::FieldPolicy;
use crate::query::QueryHandle;
use crate::request::{ListQueryRequest, QueryOptionsParser};

/// Composes parser, plan builder and envelope formatter for one resource
pub struct ListQueryEngine<L: DiagnosticLog = Logger> {
    policy: Arc<FieldPolicy>,
    config: EngineConfig,
    parser: QueryOptionsParser,
    formatter: PaginationEnvelopeFormatter,
    log: L,
}

impl<L: DiagnosticLog> ListQueryEngine<L> {
    pub fn new(policy: Arc<FieldPolicy>, config: EngineConfig, log: L) -> Self {
        Self {
            parser: config.parser(),
            formatter: PaginationEnvelopeFormatter::new(config.path.clone()),
            policy,
            config,
            log,
        }
    }

    /// Override the link path, e.g. with the route serving this resource
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.formatter = PaginationEnvelopeFormatter::new(path);
        self
    }

    pub fn policy(&self) -> &FieldPolicy {
        &self.policy
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Normalize raw query parameters
    pub fn parse<I, K, V>(&self, params: I) -> ListQueryRequest
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.parser.parse(params)
    }

    /// Compile `req` onto `query` without executing it
    pub fn build<Q: QueryHandle>(
        &self,
        query: Q,
        req: &ListQueryRequest,
        hook: Option<&FilterHook<Q>>,
    ) -> Q {
        QueryPlanBuilder::new(&self.policy, &self.log).build(query, req, hook)
    }

    /// Parse, build and paginate in one call
    pub async fn list<Q, I, K, V>(&self, query: Q, params: I) -> Result<ListEnvelope<Q::Record>, Q::Error>
    where
        Q: QueryHandle,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let req = self.parse(params);
        self.list_request(query, &req, None).await
    }

    /// Build and paginate an already parsed request
    ///
    /// `limit` is clamped again here; requests built by hand never reach
    /// the backend with an unbounded page size. Links repeat the request's
    /// search, sort, filters and relations.
    pub async fn list_request<Q: QueryHandle>(
        &self,
        query: Q,
        req: &ListQueryRequest,
        hook: Option<&FilterHook<Q>>,
    ) -> Result<ListEnvelope<Q::Record>, Q::Error> {
        let limit = req.limit.clamp(1, self.parser.max_limit());
        let page = req.page.max(1);

        let query = self.build(query, req, hook);
        self.formatter
            .carrying(req.link_params())
            .format(query, page, limit)
            .await
    }

    /// Like [`list`](Self::list), in the configured envelope shape
    pub async fn list_shaped<Q, I, K, V>(
        &self,
        query: Q,
        params: I,
    ) -> Result<ShapedEnvelope<Q::Record>, Q::Error>
    where
        Q: QueryHandle,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let envelope = self.list(query, params).await?;
        Ok(envelope.into_shape(self.config.envelope))
    }
}
