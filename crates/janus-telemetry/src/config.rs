//! Telemetry settings for a Janus service.
//!
//! The service identity is set once and shared: it becomes the OTLP
//! resource of exported spans and is logged when telemetry starts. The
//! subsystem sections only carry what their initializers read.

use crate::logging::LogConfig;
use crate::metrics::MetricsConfig;
use crate::tracing::TracingConfig;

/// Who is emitting the telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    /// Service name, also the default naming registration.
    pub name: String,
    /// Deployed version.
    pub version: String,
    /// Deployment environment, e.g. `production`.
    pub environment: String,
}

impl ServiceIdentity {
    /// Creates an identity in the `development` environment.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            environment: "development".to_string(),
        }
    }

    /// Sets the deployment environment.
    #[must_use]
    pub fn in_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }
}

impl Default for ServiceIdentity {
    fn default() -> Self {
        Self::new("janus-service", env!("CARGO_PKG_VERSION"))
    }
}

/// Input of [`init_telemetry`](crate::init_telemetry).
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Identity stamped on spans and startup logs.
    pub service: ServiceIdentity,
    /// Subscriber setup.
    pub logging: LogConfig,
    /// Prometheus recorder.
    pub metrics: MetricsConfig,
    /// OTLP span export.
    pub tracing: TracingConfig,
}

impl TelemetryConfig {
    /// Default subsystems reporting as `service`. Span export stays off
    /// until an endpoint is given.
    #[must_use]
    pub fn for_service(service: ServiceIdentity) -> Self {
        Self {
            service,
            ..Self::default()
        }
    }

    /// Exports spans to the OTLP collector at `endpoint`.
    #[must_use]
    pub fn export_spans_to(mut self, endpoint: impl Into<String>) -> Self {
        self.tracing.otlp_endpoint = Some(endpoint.into());
        self
    }

    /// Returns `true` if spans leave the process.
    #[must_use]
    pub fn exports_spans(&self) -> bool {
        self.tracing.enabled && self.tracing.otlp_endpoint.is_some()
    }
}
