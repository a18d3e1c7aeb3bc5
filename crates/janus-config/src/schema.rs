//! Configuration section types.
//!
//! Every section rejects unknown fields and fills missing ones with
//! defaults, so a partial file is always valid input.

use serde::{Deserialize, Serialize};

/// Listener and timeout settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfigSection {
    /// Address of the HTTP listener.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Address of the native RPC listener. Absent means no RPC listener.
    #[serde(default)]
    pub rpc_addr: Option<String>,

    /// Grace period for in-flight requests during shutdown, in seconds.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// Per-request handler timeout, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

const fn default_shutdown_timeout_secs() -> u64 {
    30
}

const fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for ServerConfigSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            rpc_addr: None,
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Naming registry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamingConfigSection {
    /// Whether to register with the naming registry at startup.
    #[serde(default)]
    pub enabled: bool,

    /// Name the instance registers under. Falls back to the telemetry service name.
    #[serde(default)]
    pub service_name: Option<String>,

    /// Address advertised to peers. Falls back to the bound RPC (or HTTP) address.
    #[serde(default)]
    pub advertise_addr: Option<String>,

    /// Lease duration in seconds. Heartbeats run at half this interval.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Timeout for each registry call, in milliseconds.
    #[serde(default = "default_registry_timeout_ms")]
    pub timeout_ms: u64,
}

const fn default_ttl_secs() -> u64 {
    30
}

const fn default_registry_timeout_ms() -> u64 {
    3_000
}

impl Default for NamingConfigSection {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: None,
            advertise_addr: None,
            ttl_secs: default_ttl_secs(),
            timeout_ms: default_registry_timeout_ms(),
        }
    }
}

/// Metrics settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfigSection {
    /// Whether metrics are recorded.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Address of the Prometheus scrape endpoint.
    #[serde(default)]
    pub addr: Option<String>,

    /// Request duration buckets, in seconds.
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,
}

fn default_duration_buckets() -> Vec<f64> {
    vec![
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ]
}

impl Default for MetricsConfigSection {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: None,
            duration_buckets: default_duration_buckets(),
        }
    }
}

/// Distributed tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TracingConfigSection {
    /// Whether spans are exported. Export also requires an endpoint.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// OTLP collector endpoint (e.g. `http://localhost:4317`).
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    /// Fraction of root traces to sample, between 0.0 and 1.0.
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

const fn default_sampling_ratio() -> f64 {
    1.0
}

impl Default for TracingConfigSection {
    fn default() -> Self {
        Self {
            enabled: true,
            otlp_endpoint: None,
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line human-readable output.
    Compact,
}

impl From<LogFormat> for janus_telemetry::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfigSection {
    /// Whether the global subscriber is installed.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (e.g. `info` or `janus=debug,hyper=warn`).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// ANSI colors for human-readable formats.
    #[serde(default)]
    pub ansi_enabled: bool,

    /// Include file and line numbers.
    #[serde(default)]
    pub include_location: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfigSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::Json,
            ansi_enabled: false,
            include_location: false,
        }
    }
}

/// Telemetry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfigSection {
    /// Service name reported in logs, traces and registrations.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Service version.
    #[serde(default = "default_service_version")]
    pub service_version: String,

    /// Deployment environment.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Metrics subsection.
    #[serde(default)]
    pub metrics: MetricsConfigSection,

    /// Tracing subsection.
    #[serde(default)]
    pub tracing: TracingConfigSection,

    /// Logging subsection.
    #[serde(default)]
    pub logging: LoggingConfigSection,
}

fn default_service_name() -> String {
    "janus-service".to_string()
}

fn default_service_version() -> String {
    "0.1.0".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for TelemetryConfigSection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            service_version: default_service_version(),
            environment: default_environment(),
            metrics: MetricsConfigSection::default(),
            tracing: TracingConfigSection::default(),
            logging: LoggingConfigSection::default(),
        }
    }
}

impl TelemetryConfigSection {
    /// Converts the section into the telemetry crate's configuration.
    ///
    /// Tracing is only enabled when an OTLP endpoint is configured.
    #[must_use]
    pub fn to_telemetry_config(&self) -> janus_telemetry::TelemetryConfig {
        let service = janus_telemetry::ServiceIdentity::new(&self.service_name, &self.service_version)
            .in_environment(&self.environment);

        janus_telemetry::TelemetryConfig {
            service,
            logging: janus_telemetry::LogConfig {
                enabled: self.logging.enabled,
                level: self.logging.level.clone(),
                format: self.logging.format.into(),
                ansi: self.logging.ansi_enabled,
                include_location: self.logging.include_location,
                ..janus_telemetry::LogConfig::default()
            },
            metrics: janus_telemetry::MetricsConfig {
                enabled: self.metrics.enabled,
                addr: self.metrics.addr.clone(),
                duration_buckets: self.metrics.duration_buckets.clone(),
            },
            tracing: janus_telemetry::TracingConfig {
                enabled: self.tracing.enabled,
                otlp_endpoint: self.tracing.otlp_endpoint.clone(),
                sample_ratio: self.tracing.sampling_ratio,
            },
        }
    }
}

const fn default_true() -> bool {
    true
}
