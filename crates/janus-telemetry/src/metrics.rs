//! Prometheus metrics.
//!
//! Recording goes through the `metrics` facade, so the functions here are
//! cheap no-ops until [`init_metrics`] installs the Prometheus recorder.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `janus_requests_total` | Counter | `transport`, `route`, `status` | Completed requests |
//! | `janus_request_duration_seconds` | Histogram | `transport`, `route` | Request latency |
//! | `janus_requests_in_flight` | Gauge | - | Requests being processed |
//!
//! `route` is the registered pattern (or `/{service}/{method}` for gRPC),
//! never the raw path, so label cardinality stays bounded. Unmatched
//! requests use [`UNMATCHED_ROUTE`].

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Completed request counter.
pub const REQUESTS_TOTAL: &str = "janus_requests_total";

/// Request latency histogram.
pub const REQUEST_DURATION_SECONDS: &str = "janus_request_duration_seconds";

/// In-flight request gauge.
pub const REQUESTS_IN_FLIGHT: &str = "janus_requests_in_flight";

/// Route label for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "<unmatched>";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Address for the Prometheus scrape endpoint (e.g., "0.0.0.0:9090").
    /// Without one, metrics are only available through [`render_metrics`].
    pub addr: Option<String>,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: None,
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Handle for rendering the collected metrics.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    /// Creates a registry from a Prometheus handle.
    #[must_use]
    pub const fn new(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Renders all metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Installs the Prometheus recorder.
///
/// When `addr` is set the scrape endpoint is spawned on the current Tokio
/// runtime, so this must then be called from inside one. Returns `None`
/// when metrics are disabled.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparsable address and
/// `TelemetryError::MetricsInit` if a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<Option<MetricsRegistry>> {
    if !config.enabled {
        return Ok(None);
    }

    let mut builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let handle = if let Some(addr) = &config.addr {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| TelemetryError::InvalidAddress(format!("{addr}: {e}")))?;
        builder = builder.with_http_listener(addr);
        let (recorder, exporter) = builder
            .build()
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = exporter.await {
                ::tracing::error!(error = ?e, "metrics endpoint stopped");
            }
        });
        ::tracing::info!(%addr, "metrics endpoint listening");
        handle
    } else {
        builder
            .install_recorder()
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
    };

    let _ = METRICS_HANDLE.set(handle.clone());
    describe_metrics();

    Ok(Some(MetricsRegistry::new(handle)))
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Total number of requests processed");
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Request duration in seconds"
    );
    describe_gauge!(REQUESTS_IN_FLIGHT, "Number of requests currently being processed");
}

/// Records a completed request.
pub fn record_request(transport: &str, route: &str, status: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "transport" => transport.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        REQUEST_DURATION_SECONDS,
        "transport" => transport.to_string(),
        "route" => route.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Increments the in-flight gauge.
pub fn increment_in_flight() {
    gauge!(REQUESTS_IN_FLIGHT).increment(1.0);
}

/// Decrements the in-flight gauge.
pub fn decrement_in_flight() {
    gauge!(REQUESTS_IN_FLIGHT).decrement(1.0);
}
