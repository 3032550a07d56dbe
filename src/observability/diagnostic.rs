//! Diagnostic sinks
//!
//! The engine reports corrected input (e.g. a rejected sort key) through a
//! `DiagnosticLog` handed to it at construction time.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::logger::{Logger, Severity};

/// Capability interface: `log(message, context)`
pub trait DiagnosticLog: Send + Sync {
    fn log(&self, message: &str, context: &[(&str, &str)]);
}

impl<L: DiagnosticLog + ?Sized> DiagnosticLog for Arc<L> {
    fn log(&self, message: &str, context: &[(&str, &str)]) {
        (**self).log(message, context);
    }
}

impl<L: DiagnosticLog + ?Sized> DiagnosticLog for &L {
    fn log(&self, message: &str, context: &[(&str, &str)]) {
        (**self).log(message, context);
    }
}

/// Diagnostics are corrected-input warnings
impl DiagnosticLog for Logger {
    fn log(&self, message: &str, context: &[(&str, &str)]) {
        Logger::log(Severity::Warn, message, context);
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLog;

impl DiagnosticLog for NullLog {
    fn log(&self, _message: &str, _context: &[(&str, &str)]) {}
}

/// One captured diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub message: String,
    pub context: BTreeMap<String, String>,
}

impl LogRecord {
    /// Look up a context field
    pub fn field(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }
}

/// In-memory sink for tests and request-scoped inspection
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured records, oldest first
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticLog for MemoryLog {
    fn log(&self, message: &str, context: &[(&str, &str)]) {
        let record = LogRecord {
            message: message.to_string(),
            context: context
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };

        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}
