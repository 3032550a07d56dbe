//! Observability for the list engine
//!
//! - Structured logging (JSON lines, deterministic key order)
//! - An injectable diagnostic sink so the engine never reaches for
//!   process-wide state
//!
//! # Usage
//!
//! ```ignore
//! use listkit::observability::{DiagnosticLog, Logger, MemoryLog};
//!
//! // Production: JSON lines on stdout
//! Logger.log("LIST_SORT_FALLBACK", &[("provided", "droptable")]);
//!
//! // Tests: capture and inspect
//! let log = MemoryLog::new();
//! log.log("LIST_SORT_FALLBACK", &[("provided", "droptable")]);
//! assert_eq!(log.records()[0].field("provided"), Some("droptable"));
//! ```

mod diagnostic;
mod logger;

pub use diagnostic::{DiagnosticLog, LogRecord, MemoryLog, NullLog};
pub use logger::{Logger, Severity};

/// Emitted when a requested sort key is replaced by the whitelist fallback
pub const EVENT_SORT_FALLBACK: &str = "LIST_SORT_FALLBACK";

/// Emitted when a list request fails upstream (database, adapter)
pub const EVENT_LIST_FAILED: &str = "LIST_QUERY_FAILED";

/// Emitted once the HTTP list server is bound
pub const EVENT_SERVER_LISTENING: &str = "LIST_SERVER_LISTENING";
