//! OpenTelemetry distributed tracing.
//!
//! [`init_tracing`] builds an SDK tracer provider exporting over OTLP (gRPC)
//! and wraps it in [`OtelTracer`], which implements the dispatcher's
//! [`janus_core::Tracer`] interface. The dispatcher gets the tracer by
//! injection; nothing on the request path reads the global provider.
//!
//! # Example
//!
//! ```rust,ignore
//! use janus_telemetry::tracing::{init_tracing, TracingConfig};
//! use janus_telemetry::ServiceIdentity;
//!
//! let config = TracingConfig {
//!     otlp_endpoint: Some("http://localhost:4317".to_string()),
//!     ..TracingConfig::default()
//! };
//! let tracer = init_tracing(&config, &ServiceIdentity::new("hello", "1.0.0"))?;
//! ```

use std::borrow::Cow;

use janus_core::{Span, SpanContext, Tracer};
use opentelemetry::trace::{
    Span as _, SpanContext as OtelSpanContext, SpanId, SpanKind, Status, TraceContextExt,
    TraceFlags, TraceId, TraceState, Tracer as _, TracerProvider as _,
};
use opentelemetry::{global, Context, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, TracerProvider};
use opentelemetry_sdk::Resource;
use parking_lot::Mutex;

use crate::config::ServiceIdentity;
use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Instrumentation scope name of spans created by Janus.
pub const INSTRUMENTATION_NAME: &str = "janus";

/// Span export settings.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Whether spans are exported at all.
    pub enabled: bool,

    /// OTLP collector, e.g. `http://localhost:4317`. Nothing is exported
    /// without one.
    pub otlp_endpoint: Option<String>,

    /// Fraction of traces kept, from 0.0 to 1.0.
    pub sample_ratio: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            otlp_endpoint: None,
            sample_ratio: 1.0,
        }
    }
}

impl TracingConfig {
    fn sampler(&self) -> Sampler {
        if self.sample_ratio >= 1.0 {
            Sampler::AlwaysOn
        } else if self.sample_ratio <= 0.0 {
            Sampler::AlwaysOff
        } else {
            Sampler::TraceIdRatioBased(self.sample_ratio)
        }
    }
}

/// Initializes OTLP export and returns the tracer adapter.
///
/// Returns `None` when tracing is disabled or no endpoint is configured.
/// Must be called inside a Tokio runtime: the batch exporter runs on it.
///
/// # Errors
///
/// Returns `TelemetryError::TracingInit` if the exporter cannot be built.
pub fn init_tracing(
    config: &TracingConfig,
    service: &ServiceIdentity,
) -> TelemetryResult<Option<OtelTracer>> {
    let endpoint = match (&config.otlp_endpoint, config.enabled) {
        (Some(endpoint), true) => endpoint,
        _ => return Ok(None),
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_sampler(config.sampler())
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource(service))
        .build();

    // Libraries that trace through the global API export through the same
    // provider.
    global::set_tracer_provider(provider.clone());

    Ok(Some(OtelTracer::new(provider)))
}

fn resource(service: &ServiceIdentity) -> Resource {
    Resource::new([
        KeyValue::new(
            opentelemetry_semantic_conventions::attribute::SERVICE_NAME,
            service.name.clone(),
        ),
        KeyValue::new(
            opentelemetry_semantic_conventions::attribute::SERVICE_VERSION,
            service.version.clone(),
        ),
        KeyValue::new("deployment.environment", service.environment.clone()),
    ])
}

/// [`Tracer`] backed by an OpenTelemetry SDK provider.
#[derive(Debug, Clone)]
pub struct OtelTracer {
    provider: TracerProvider,
    tracer: opentelemetry_sdk::trace::Tracer,
}

impl OtelTracer {
    /// Wraps a provider.
    #[must_use]
    pub fn new(provider: TracerProvider) -> Self {
        let tracer = provider.tracer(INSTRUMENTATION_NAME);
        Self { provider, tracer }
    }

    /// Returns the underlying provider.
    #[must_use]
    pub const fn provider(&self) -> &TracerProvider {
        &self.provider
    }

    /// Flushes pending spans and shuts the provider down.
    pub fn shutdown(&self) {
        for result in self.provider.force_flush() {
            if let Err(e) = result {
                ::tracing::warn!(error = %e, "failed to flush spans");
            }
        }
        if let Err(e) = self.provider.shutdown() {
            ::tracing::warn!(error = %e, "failed to shut down tracer provider");
        }
    }
}

/// Converts a propagated span context into its OpenTelemetry form.
///
/// Returns `None` when the ids are not valid hex.
#[must_use]
pub fn to_otel_context(context: &SpanContext) -> Option<OtelSpanContext> {
    let trace_id = TraceId::from_hex(&context.trace_id).ok()?;
    let span_id = SpanId::from_hex(&context.span_id).ok()?;
    let flags = if context.sampled {
        TraceFlags::SAMPLED
    } else {
        TraceFlags::default()
    };
    let otel = OtelSpanContext::new(trace_id, span_id, flags, true, TraceState::default());
    otel.is_valid().then_some(otel)
}

/// Converts an OpenTelemetry span context into the propagated form.
#[must_use]
pub fn from_otel_context(context: &OtelSpanContext) -> SpanContext {
    SpanContext::new(
        context.trace_id().to_string(),
        context.span_id().to_string(),
        context.is_sampled(),
    )
}

impl Tracer for OtelTracer {
    fn start_span(&self, name: &str, parent: Option<&SpanContext>) -> Box<dyn Span> {
        let parent_cx = parent
            .and_then(to_otel_context)
            .map_or_else(Context::new, |sc| Context::new().with_remote_span_context(sc));

        let span = self
            .tracer
            .span_builder(name.to_string())
            .with_kind(SpanKind::Server)
            .start_with_context(&self.tracer, &parent_cx);
        let context = from_otel_context(span.span_context());

        Box::new(OtelSpan {
            context,
            span: Mutex::new(Some(span)),
        })
    }
}

struct OtelSpan {
    context: SpanContext,
    span: Mutex<Option<opentelemetry_sdk::trace::Span>>,
}

impl Span for OtelSpan {
    fn context(&self) -> SpanContext {
        self.context.clone()
    }

    fn set_attribute(&mut self, key: &'static str, value: String) {
        if let Some(span) = self.span.get_mut().as_mut() {
            span.set_attribute(KeyValue::new(key, value));
        }
    }

    fn record_error(&mut self, message: &str) {
        if let Some(span) = self.span.get_mut().as_mut() {
            span.add_event(
                "exception",
                vec![KeyValue::new("exception.message", message.to_string())],
            );
            span.set_status(Status::error(Cow::Owned(message.to_string())));
        }
    }

    fn finish(&mut self) {
        if let Some(mut span) = self.span.get_mut().take() {
            span.end();
        }
    }
}

impl Drop for OtelSpan {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_sdk::testing::trace::InMemorySpanExporter;

    fn test_tracer() -> (OtelTracer, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (OtelTracer::new(provider), exporter)
    }

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert!(config.enabled);
        assert!(config.otlp_endpoint.is_none());
        assert!(matches!(config.sampler(), Sampler::AlwaysOn));
    }

    #[test]
    fn test_partial_sampling() {
        let config = TracingConfig {
            sample_ratio: 0.1,
            ..TracingConfig::default()
        };
        assert!(matches!(config.sampler(), Sampler::TraceIdRatioBased(_)));
    }

    #[test]
    fn test_no_export_without_endpoint() {
        let service = ServiceIdentity::default();
        assert!(init_tracing(&TracingConfig::default(), &service).unwrap().is_none());

        let disabled = TracingConfig {
            enabled: false,
            otlp_endpoint: Some("http://localhost:4317".to_string()),
            ..TracingConfig::default()
        };
        assert!(init_tracing(&disabled, &service).unwrap().is_none());
    }

    #[test]
    fn test_resource_carries_identity() {
        let service = ServiceIdentity::new("hello", "2.0.0").in_environment("production");
        let resource = resource(&service);
        assert_eq!(
            resource.get(opentelemetry::Key::from_static_str(
                opentelemetry_semantic_conventions::attribute::SERVICE_NAME
            )),
            Some(opentelemetry::Value::from("hello"))
        );
        assert_eq!(
            resource.get(opentelemetry::Key::from_static_str("deployment.environment")),
            Some(opentelemetry::Value::from("production"))
        );
    }

    #[test]
    fn test_context_conversion() {
        let ctx = SpanContext::new("0af7651916cd43dd8448eb211c80319c", "b7ad6b7169203331", true);
        let otel = to_otel_context(&ctx).unwrap();
        assert!(otel.is_remote());
        assert_eq!(from_otel_context(&otel), ctx);

        assert!(to_otel_context(&SpanContext::new("xyz", "b7ad6b7169203331", true)).is_none());
    }

    #[test]
    fn test_span_continues_remote_parent() {
        let (tracer, exporter) = test_tracer();
        let parent = SpanContext::new("0af7651916cd43dd8448eb211c80319c", "b7ad6b7169203331", true);

        let mut span = tracer.start_span("/hello/say-hello", Some(&parent));
        assert_eq!(span.context().trace_id, parent.trace_id);
        assert_ne!(span.context().span_id, parent.span_id);
        span.set_attribute("http.route", "/hello/say-hello".to_string());
        span.record_error("boom");
        span.finish();
        span.finish();

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "/hello/say-hello");
        assert_eq!(spans[0].parent_span_id.to_string(), parent.span_id);
        assert!(matches!(spans[0].status, Status::Error { .. }));
    }

    #[test]
    fn test_root_span_on_drop() {
        let (tracer, exporter) = test_tracer();
        drop(tracer.start_span("root", None));
        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].parent_span_id, SpanId::INVALID);
    }
}
