//! # HTTP Surface
//!
//! Serves list envelopes over axum.
//!
//! - `GET /:resource` runs the list engine for a registered resource
//! - Unknown resources are 404, backend failures 500, both as
//!   `{error, code}` JSON
//! - Malformed list parameters are never errors; they degrade inside the
//!   engine

mod errors;
mod server;
mod source;

pub use errors::{ApiError, ApiResult, ErrorResponse};
pub use server::ListServer;
pub use source::{ListSource, MemoryResource, SqlResource};
