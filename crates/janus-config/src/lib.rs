//! # Janus Config
//!
//! Typed, layered configuration for Janus servers.
//!
//! ## Layers
//!
//! 1. Defaults compiled into the crate (or the development/production presets)
//! 2. A TOML or JSON file
//! 3. Variables from a `.env` file and the process environment
//!
//! Unknown fields are rejected at every layer, so a typo fails loudly instead
//! of silently falling back to a default.
//!
//! ## Example
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! rpc_addr = "0.0.0.0:9090"
//! shutdown_timeout_secs = 30
//!
//! [naming]
//! enabled = true
//! ttl_secs = 30
//!
//! [telemetry]
//! service_name = "greeter"
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! ## Environment overrides
//!
//! Variables use the format `PREFIX__SECTION__KEY`, with nested sections
//! separated by further double underscores:
//!
//! - `JANUS__SERVER__HTTP_ADDR=0.0.0.0:9000`
//! - `JANUS__TELEMETRY__TRACING__OTLP_ENDPOINT=http://collector:4317`

#![doc(html_root_url = "https://docs.rs/janus-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{JanusConfig, JanusConfigBuilder};
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{
    LogFormat, LoggingConfigSection, MetricsConfigSection, NamingConfigSection,
    ServerConfigSection, TelemetryConfigSection, TracingConfigSection,
};

/// Result alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
