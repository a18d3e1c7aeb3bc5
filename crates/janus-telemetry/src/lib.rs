//! Observability for Janus services.
//!
//! - **Logging**: `tracing-subscriber` with JSON or human-readable output
//! - **Tracing**: OpenTelemetry spans exported over OTLP, adapted to the
//!   dispatcher's [`janus_core::Tracer`] interface by [`OtelTracer`]
//! - **Metrics**: Prometheus exposition through the `metrics` facade
//!
//! # Example
//!
//! ```rust,ignore
//! use janus_telemetry::{init_telemetry, ServiceIdentity, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TelemetryConfig::for_service(ServiceIdentity::new("hello", "1.0.0"))
//!         .export_spans_to("http://localhost:4317");
//!
//!     let telemetry = init_telemetry(&config)?;
//!     let server = janus_server::Server::new(Default::default()).with_tracer(telemetry.tracer());
//!     // ...
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/janus-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod tracing;

use std::sync::Arc;

use janus_core::{NoopTracer, Tracer};

pub use config::{ServiceIdentity, TelemetryConfig};
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{init_metrics, MetricsConfig, MetricsRegistry};
pub use tracing::{init_tracing, OtelTracer, TracingConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Keeps telemetry providers alive and flushes them on drop.
pub struct TelemetryGuard {
    tracer: Option<OtelTracer>,
    metrics: Option<MetricsRegistry>,
}

impl TelemetryGuard {
    /// Creates a guard.
    #[must_use]
    pub const fn new(tracer: Option<OtelTracer>, metrics: Option<MetricsRegistry>) -> Self {
        Self { tracer, metrics }
    }

    /// Returns the tracer to inject into the dispatcher.
    ///
    /// A no-op tracer when tracing is disabled.
    #[must_use]
    pub fn tracer(&self) -> Arc<dyn Tracer> {
        match &self.tracer {
            Some(tracer) => Arc::new(tracer.clone()),
            None => Arc::new(NoopTracer),
        }
    }

    /// Returns the metrics registry, if metrics are enabled.
    #[must_use]
    pub const fn metrics(&self) -> Option<&MetricsRegistry> {
        self.metrics.as_ref()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(tracer) = self.tracer.take() {
            tracer.shutdown();
        }
    }
}

impl std::fmt::Debug for TelemetryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryGuard")
            .field("tracing", &self.tracer.is_some())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

/// Initializes logging, metrics and tracing, in that order.
///
/// Keep the returned guard alive for the lifetime of the process.
///
/// # Errors
///
/// Returns `TelemetryError` if any subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<TelemetryGuard> {
    init_logging(&config.logging)?;
    let metrics = init_metrics(&config.metrics)?;
    let tracer = init_tracing(&config.tracing, &config.service)?;

    let service = &config.service;
    ::tracing::info!(
        service = %service.name,
        version = %service.version,
        environment = %service.environment,
        metrics = metrics.is_some(),
        span_export = tracer.is_some(),
        "telemetry initialized"
    );
    Ok(TelemetryGuard::new(tracer, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_without_providers() {
        let guard = TelemetryGuard::new(None, None);
        let tracer = guard.tracer();
        let span = tracer.start_span("noop", None);
        assert!(!span.context().is_valid());
        assert!(guard.metrics().is_none());
        drop(guard);
    }
}
