//! Request-scoped structured logging.
//!
//! A [`RequestLogger`] accumulates structured fields while a request moves
//! through the pipeline and writes them out as a single [`LogRecord`] when
//! a message is logged. Records go to a [`LogSink`]. The default
//! [`TracingSink`] forwards them to `tracing`, so the subscriber installed
//! by the telemetry crate decides the final format (JSON in production).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use janus_core::{MemorySink, RequestId, RequestLogger};
//!
//! let sink = Arc::new(MemorySink::new());
//! let logger = RequestLogger::new(RequestId::new(), sink.clone());
//! logger.with_field("user", "alice").with_field("attempt", 2);
//! logger.info(format_args!("login took {}ms", 12));
//!
//! let records = sink.records();
//! assert_eq!(records[0].message, "login took 12ms");
//! assert_eq!(records[0].fields["user"], "alice");
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::RequestId;

/// Severity of a request log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debugging detail.
    Debug,
    /// Normal request completion.
    Info,
    /// Recoverable problem.
    Warn,
    /// Request failure.
    Error,
}

/// A single structured log line produced by a [`RequestLogger`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Severity.
    pub level: LogLevel,
    /// Request the record belongs to.
    pub request_id: RequestId,
    /// Formatted message.
    pub message: String,
    /// Accumulated structured fields.
    pub fields: Map<String, Value>,
}

/// Destination for request log records.
///
/// Sinks are shared by every in-flight request and must tolerate concurrent
/// calls. `emit` must not block for long: it runs on the request path.
pub trait LogSink: Send + Sync + 'static {
    /// Writes one record.
    fn emit(&self, record: &LogRecord);
}

/// Sink that forwards records to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord) {
        let fields = Value::Object(record.fields.clone());
        let request_id = record.request_id;
        let message = &record.message;
        match record.level {
            LogLevel::Debug => {
                tracing::debug!(target: "janus::request", %request_id, %fields, "{message}");
            }
            LogLevel::Info => {
                tracing::info!(target: "janus::request", %request_id, %fields, "{message}");
            }
            LogLevel::Warn => {
                tracing::warn!(target: "janus::request", %request_id, %fields, "{message}");
            }
            LogLevel::Error => {
                tracing::error!(target: "janus::request", %request_id, %fields, "{message}");
            }
        }
    }
}

/// Sink that keeps every record in memory.
///
/// Used in tests and by embedders that forward logs elsewhere in batches.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record written so far.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Returns the records written for one request.
    #[must_use]
    pub fn records_for(&self, request_id: RequestId) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.request_id == request_id)
            .cloned()
            .collect()
    }

    /// Removes all records.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: &LogRecord) {
        self.records.lock().push(record.clone());
    }
}

#[derive(Debug, Default)]
struct LoggerState {
    fields: Map<String, Value>,
    /// Fields were added since the last emitted record.
    dirty: bool,
}

/// Structured logger bound to one request.
///
/// Cloning is cheap; clones share the same field set, so fields added by a
/// handler through its [`CallContext`](crate::CallContext) show up in the
/// line written by the logging middleware.
#[derive(Clone)]
pub struct RequestLogger {
    request_id: RequestId,
    sink: Arc<dyn LogSink>,
    state: Arc<Mutex<LoggerState>>,
}

impl RequestLogger {
    /// Creates a logger for the given request writing to `sink`.
    #[must_use]
    pub fn new(request_id: RequestId, sink: Arc<dyn LogSink>) -> Self {
        Self {
            request_id,
            sink,
            state: Arc::new(Mutex::new(LoggerState::default())),
        }
    }

    /// Creates a logger that forwards to `tracing` with a fresh request id.
    ///
    /// Useful outside a request, where no dispatcher-provided logger exists.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(RequestId::new(), Arc::new(TracingSink))
    }

    /// Returns the request this logger belongs to.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Adds or replaces a field.
    ///
    /// Values that fail to serialize are stored as their error message.
    pub fn with_field(&self, key: impl Into<String>, value: impl Serialize) -> &Self {
        let value = serde_json::to_value(value).unwrap_or_else(|e| Value::String(e.to_string()));
        let mut state = self.state.lock();
        state.fields.insert(key.into(), value);
        state.dirty = true;
        self
    }

    /// Adds or replaces several fields.
    pub fn with_fields<K, V, I>(&self, fields: I) -> &Self
    where
        K: Into<String>,
        V: Serialize,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in fields {
            self.with_field(key, value);
        }
        self
    }

    /// Returns the current value of a field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<Value> {
        self.state.lock().fields.get(key).cloned()
    }

    /// Returns a copy of all fields.
    #[must_use]
    pub fn fields(&self) -> Map<String, Value> {
        self.state.lock().fields.clone()
    }

    /// Writes an info record.
    pub fn info(&self, message: impl fmt::Display) {
        self.log(LogLevel::Info, message);
    }

    /// Writes a warning record.
    pub fn warn(&self, message: impl fmt::Display) {
        self.log(LogLevel::Warn, message);
    }

    /// Writes an error record.
    pub fn error(&self, message: impl fmt::Display) {
        self.log(LogLevel::Error, message);
    }

    /// Writes a debug record.
    pub fn debug(&self, message: impl fmt::Display) {
        self.log(LogLevel::Debug, message);
    }

    /// Writes a record with the accumulated fields.
    pub fn log(&self, level: LogLevel, message: impl fmt::Display) {
        let fields = {
            let mut state = self.state.lock();
            state.dirty = false;
            state.fields.clone()
        };
        self.sink.emit(&LogRecord {
            level,
            request_id: self.request_id,
            message: message.to_string(),
            fields,
        });
    }

    /// Writes the pending fields if any were added since the last record.
    ///
    /// Returns `true` when a record was written.
    pub fn flush(&self) -> bool {
        if !self.state.lock().dirty {
            return false;
        }
        self.log(LogLevel::Info, "request finished");
        true
    }
}

impl fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogger")
            .field("request_id", &self.request_id)
            .field("fields", &self.state.lock().fields)
            .finish_non_exhaustive()
    }
}
