//! listkit - A server-side list query engine
//!
//! Compiles untrusted list query strings into parameterized query plans
//! under a per-resource field policy, and shapes the paginated result.
//!
//! Pipeline: raw params → `request` → `builder` (under `policy`) →
//! `query` handle → `envelope`. `engine` composes the pipeline, `rest`
//! serves it over HTTP.

pub mod builder;
pub mod config;
pub mod engine;
pub mod envelope;
pub mod observability;
pub mod policy;
pub mod query;
pub mod request;
pub mod rest;
