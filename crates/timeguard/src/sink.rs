//! Log sinks receiving measurement and failure records
//!
//! Records are pre-formatted strings; a sink decides where they go.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// Destination for the two record severities the engine produces.
pub trait LogSink: Send + Sync {
    /// A measurement record.
    fn info(&self, message: &str);

    /// A failure record for a call that returned `Err` or panicked.
    fn error(&self, message: &str);
}

/// Forwards records to `tracing` under the `timeguard` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn info(&self, message: &str) {
        tracing::info!(target: "timeguard", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "timeguard", "{}", message);
    }
}

/// Severity of a buffered record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordLevel {
    Info,
    Error,
}

/// A record captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Record severity
    pub level: RecordLevel,
    /// Formatted message
    pub message: String,
}

/// Buffers records in memory.
///
/// Useful for tests and for hosts that ship records somewhere themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, level: RecordLevel, message: &str) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogRecord {
                level,
                message: message.to_string(),
            });
    }

    /// Copy of every record so far, oldest first.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages recorded at `level`, oldest first.
    pub fn messages(&self, level: RecordLevel) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|record| record.level == level)
            .map(|record| record.message)
            .collect()
    }

    /// Info-level messages.
    pub fn infos(&self) -> Vec<String> {
        self.messages(RecordLevel::Info)
    }

    /// Error-level messages.
    pub fn errors(&self) -> Vec<String> {
        self.messages(RecordLevel::Error)
    }

    /// Number of buffered records.
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no record has been buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all buffered records.
    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl LogSink for MemorySink {
    fn info(&self, message: &str) {
        self.push(RecordLevel::Info, message);
    }

    fn error(&self, message: &str) {
        self.push(RecordLevel::Error, message);
    }
}
