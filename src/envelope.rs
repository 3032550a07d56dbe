//! # Pagination Envelope
//!
//! Response shapes for list endpoints. The rich shape carries `meta` and
//! `links`; the simple `pagination` shape is derived from it.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::query::{Page, QueryHandle};

/// Page metadata of the rich shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
    pub last_page: u64,
    pub from: u64,
    pub to: u64,
}

/// Navigation links; `prev`/`next` are null at the boundaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
    pub first: String,
    pub last: String,
    pub prev: Option<String>,
    pub next: Option<String>,
}

/// `{data, meta, links}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListEnvelope<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
    pub links: PageLinks,
}

/// Pagination block of the simple shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationSummary {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

/// `{data, pagination}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleEnvelope<T> {
    pub data: Vec<T>,
    pub pagination: PaginationSummary,
}

/// Output shape preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeShape {
    /// `{data, meta, links}`
    #[default]
    MetaLinks,
    /// `{data, pagination}`
    Pagination,
}

/// An envelope in either shape, serialized without a tag
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ShapedEnvelope<T> {
    MetaLinks(ListEnvelope<T>),
    Pagination(SimpleEnvelope<T>),
}

impl<T> ListEnvelope<T> {
    /// Derive the simple shape
    pub fn into_simple(self) -> SimpleEnvelope<T> {
        let meta = self.meta;
        SimpleEnvelope {
            data: self.data,
            pagination: PaginationSummary {
                page: meta.current_page,
                limit: meta.per_page,
                total: meta.total,
                total_pages: meta.total.div_ceil(meta.per_page.max(1)),
            },
        }
    }

    pub fn into_shape(self, shape: EnvelopeShape) -> ShapedEnvelope<T> {
        match shape {
            EnvelopeShape::MetaLinks => ShapedEnvelope::MetaLinks(self),
            EnvelopeShape::Pagination => ShapedEnvelope::Pagination(self.into_simple()),
        }
    }
}

/// Runs a handle's pagination and maps the result onto [`ListEnvelope`]
#[derive(Debug, Clone, Default)]
pub struct PaginationEnvelopeFormatter {
    path: String,
    /// Query pairs repeated on every link after `page` and `limit`
    carried: Vec<(String, String)>,
}

impl PaginationEnvelopeFormatter {
    /// `path` prefixes every link, e.g. `/products`
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            carried: Vec::new(),
        }
    }

    /// A formatter whose links keep `params`, so following `next` stays on
    /// the same filtered list
    pub fn carrying(&self, params: Vec<(String, String)>) -> Self {
        Self {
            path: self.path.clone(),
            carried: params,
        }
    }

    /// Execute `query` and build the envelope
    ///
    /// Backend errors come back unchanged.
    pub async fn format<Q: QueryHandle>(
        &self,
        query: Q,
        page: u64,
        limit: u64,
    ) -> Result<ListEnvelope<Q::Record>, Q::Error> {
        let page = query.paginate(limit, page).await?;
        Ok(self.from_page(page))
    }

    /// Map a native page onto the rich shape
    pub fn from_page<T>(&self, page: Page<T>) -> ListEnvelope<T> {
        let per_page = page.per_page.max(1);
        let current = page.current_page.max(1);
        let last = page.last_page.max(1);

        let meta = PageMeta {
            total: page.total,
            per_page,
            current_page: current,
            last_page: last,
            from: (current - 1).saturating_mul(per_page).saturating_add(1),
            to: current.saturating_mul(per_page).min(page.total),
        };

        let links = PageLinks {
            first: self.link(1, per_page),
            last: self.link(last, per_page),
            prev: (current > 1).then(|| self.link(current - 1, per_page)),
            next: (current < last).then(|| self.link(current + 1, per_page)),
        };

        ListEnvelope {
            data: page.data,
            meta,
            links,
        }
    }

    fn link(&self, page: u64, limit: u64) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("page", &page.to_string())
            .append_pair("limit", &limit.to_string())
            .extend_pairs(&self.carried);
        format!("{}?{}", self.path, query.finish())
    }
}
