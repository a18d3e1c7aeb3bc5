//! Tracing collaborator interface.
//!
//! The dispatcher never talks to a tracing backend directly. It holds an
//! injected [`Tracer`] and asks it for spans; the telemetry crate provides
//! an OpenTelemetry implementation, and [`NoopTracer`] is used when tracing
//! is disabled.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Identity of a span, as propagated between processes.
///
/// Ids are lowercase hex strings: 32 characters for the trace id and 16 for
/// the span id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanContext {
    /// Trace id (hex).
    pub trace_id: String,
    /// Span id (hex).
    pub span_id: String,
    /// Whether the trace is sampled.
    pub sampled: bool,
}

impl SpanContext {
    /// Creates a span context from hex ids.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>, sampled: bool) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            sampled,
        }
    }

    /// Formats this context as a W3C `traceparent` header value.
    #[must_use]
    pub fn to_traceparent(&self) -> String {
        let flags = if self.sampled { "01" } else { "00" };
        format!("00-{}-{}-{flags}", self.trace_id, self.span_id)
    }

    /// Returns `true` if both ids are well-formed and non-zero.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_hex_id(&self.trace_id, 32) && is_hex_id(&self.span_id, 16)
    }
}

fn is_hex_id(id: &str, len: usize) -> bool {
    id.len() == len
        && id.bytes().all(|b| b.is_ascii_hexdigit())
        && id.bytes().any(|b| b != b'0')
}

/// A unit of traced work.
pub trait Span: Send + Sync {
    /// Returns the propagation identity of this span.
    fn context(&self) -> SpanContext;

    /// Attaches a key/value attribute.
    fn set_attribute(&mut self, key: &'static str, value: String);

    /// Marks the span as failed.
    fn record_error(&mut self, message: &str);

    /// Ends the span. Calling it twice has no further effect.
    fn finish(&mut self);
}

/// Factory for spans.
///
/// Implementations are shared across all in-flight requests and must be safe
/// for concurrent use.
pub trait Tracer: Send + Sync + 'static {
    /// Starts a span, as a child of `parent` when given.
    fn start_span(&self, name: &str, parent: Option<&SpanContext>) -> Box<dyn Span>;
}

/// Tracer that produces inert spans.
///
/// Noop spans keep the parent's trace id so request ids still correlate
/// when an upstream service propagated one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn start_span(&self, _name: &str, parent: Option<&SpanContext>) -> Box<dyn Span> {
        let context = parent
            .cloned()
            .unwrap_or_else(|| SpanContext::new("0".repeat(32), "0".repeat(16), false));
        Box::new(NoopSpan { context })
    }
}

#[derive(Debug)]
struct NoopSpan {
    context: SpanContext,
}

impl Span for NoopSpan {
    fn context(&self) -> SpanContext {
        self.context.clone()
    }

    fn set_attribute(&mut self, _key: &'static str, _value: String) {}

    fn record_error(&mut self, _message: &str) {}

    fn finish(&mut self) {}
}

/// A span captured by [`RecordingTracer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedSpan {
    /// Span name.
    pub name: String,
    /// Span identity.
    pub context: SpanContext,
    /// Parent span id, if the span had a parent.
    pub parent_span_id: Option<String>,
    /// Attributes in the order they were set.
    pub attributes: Vec<(&'static str, String)>,
    /// Error message, if the span was marked failed.
    pub error: Option<String>,
}

impl FinishedSpan {
    /// Returns the last value set for an attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Tracer that keeps finished spans in memory.
///
/// Ids are derived from a counter, so they are deterministic within one
/// tracer instance.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    inner: Arc<RecordingState>,
}

#[derive(Debug, Default)]
struct RecordingState {
    next_id: Mutex<u64>,
    finished: Mutex<Vec<FinishedSpan>>,
}

impl RecordingTracer {
    /// Creates an empty recording tracer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every finished span, in finishing order.
    #[must_use]
    pub fn finished(&self) -> Vec<FinishedSpan> {
        self.inner.finished.lock().clone()
    }

    fn next_id(&self) -> u64 {
        let mut next = self.inner.next_id.lock();
        *next += 1;
        *next
    }
}

impl Tracer for RecordingTracer {
    fn start_span(&self, name: &str, parent: Option<&SpanContext>) -> Box<dyn Span> {
        let id = self.next_id();
        let trace_id = parent.map_or_else(|| format!("{id:032x}"), |p| p.trace_id.clone());
        Box::new(RecordingSpan {
            state: Arc::clone(&self.inner),
            span: Some(FinishedSpan {
                name: name.to_string(),
                context: SpanContext::new(trace_id, format!("{id:016x}"), true),
                parent_span_id: parent.map(|p| p.span_id.clone()),
                attributes: Vec::new(),
                error: None,
            }),
        })
    }
}

struct RecordingSpan {
    state: Arc<RecordingState>,
    span: Option<FinishedSpan>,
}

impl Span for RecordingSpan {
    fn context(&self) -> SpanContext {
        self.span
            .as_ref()
            .map(|s| s.context.clone())
            .unwrap_or_else(|| SpanContext::new("", "", false))
    }

    fn set_attribute(&mut self, key: &'static str, value: String) {
        if let Some(span) = self.span.as_mut() {
            span.attributes.push((key, value));
        }
    }

    fn record_error(&mut self, message: &str) {
        if let Some(span) = self.span.as_mut() {
            span.error = Some(message.to_string());
        }
    }

    fn finish(&mut self) {
        if let Some(span) = self.span.take() {
            self.state.finished.lock().push(span);
        }
    }
}

impl Drop for RecordingSpan {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Owns a span and finishes it when dropped.
///
/// Returned by [`CallContext::start_span`](crate::CallContext::start_span).
pub struct SpanGuard {
    span: Box<dyn Span>,
}

impl SpanGuard {
    /// Wraps a started span.
    #[must_use]
    pub fn new(span: Box<dyn Span>) -> Self {
        Self { span }
    }

    /// Returns the span identity.
    #[must_use]
    pub fn context(&self) -> SpanContext {
        self.span.context()
    }

    /// Attaches an attribute.
    pub fn set_attribute(&mut self, key: &'static str, value: impl Into<String>) {
        self.span.set_attribute(key, value.into());
    }

    /// Marks the span failed.
    pub fn record_error(&mut self, message: &str) {
        self.span.record_error(message);
    }

    /// Ends the span now.
    pub fn finish(mut self) {
        self.span.finish();
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.span.finish();
    }
}

impl fmt::Debug for SpanGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanGuard")
            .field("context", &self.span.context())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traceparent_format() {
        let ctx = SpanContext::new("4bf92f3577b34da6a3ce929d0e0e4736", "00f067aa0ba902b7", true);
        assert_eq!(
            ctx.to_traceparent(),
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"
        );
        assert!(ctx.is_valid());
    }

    #[test]
    fn test_zero_ids_are_invalid() {
        let ctx = SpanContext::new("0".repeat(32), "0".repeat(16), false);
        assert!(!ctx.is_valid());
    }

    #[test]
    fn test_noop_tracer_keeps_parent_trace() {
        let parent = SpanContext::new("4bf92f3577b34da6a3ce929d0e0e4736", "00f067aa0ba902b7", true);
        let span = NoopTracer.start_span("op", Some(&parent));
        assert_eq!(span.context().trace_id, parent.trace_id);
    }

    #[test]
    fn test_recording_tracer_parents_and_finishes() {
        let tracer = RecordingTracer::new();
        let mut root = tracer.start_span("root", None);
        let root_ctx = root.context();
        {
            let mut child = SpanGuard::new(tracer.start_span("child", Some(&root_ctx)));
            child.set_attribute("k", "v");
        }
        root.record_error("failed");
        root.finish();
        root.finish();

        let finished = tracer.finished();
        assert_eq!(finished.len(), 2);
        assert_eq!(finished[0].name, "child");
        assert_eq!(finished[0].context.trace_id, root_ctx.trace_id);
        assert_eq!(finished[0].parent_span_id.as_deref(), Some(root_ctx.span_id.as_str()));
        assert_eq!(finished[0].attributes, vec![("k", "v".to_string())]);
        assert_eq!(finished[1].error.as_deref(), Some("failed"));
    }
}
