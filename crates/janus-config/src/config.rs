//! Root configuration type.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::schema::{
    LogFormat, LoggingConfigSection, NamingConfigSection, ServerConfigSection,
    TelemetryConfigSection,
};

/// Complete configuration of a Janus server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JanusConfig {
    /// Listener and timeout settings.
    #[serde(default)]
    pub server: ServerConfigSection,

    /// Naming registry settings.
    #[serde(default)]
    pub naming: NamingConfigSection,

    /// Logging, tracing and metrics settings.
    #[serde(default)]
    pub telemetry: TelemetryConfigSection,
}

impl JanusConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> JanusConfigBuilder {
        JanusConfigBuilder::new()
    }

    /// Checks cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_addr("server.http_addr", &self.server.http_addr)?;
        if let Some(addr) = &self.server.rpc_addr {
            check_addr("server.rpc_addr", addr)?;
            if *addr == self.server.http_addr {
                return Err(ConfigError::invalid_value(
                    "server.rpc_addr",
                    "must differ from server.http_addr",
                ));
            }
        }

        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.naming.enabled && self.naming.ttl_secs < 2 {
            return Err(ConfigError::invalid_value(
                "naming.ttl_secs",
                "must be at least 2 seconds",
            ));
        }

        if let Some(addr) = &self.telemetry.metrics.addr {
            if self.telemetry.metrics.enabled {
                check_addr("telemetry.metrics.addr", addr)?;
            }
        }

        if !(0.0..=1.0).contains(&self.telemetry.tracing.sampling_ratio) {
            return Err(ConfigError::invalid_value(
                "telemetry.tracing.sampling_ratio",
                "must be between 0.0 and 1.0",
            ));
        }

        Ok(())
    }

    /// Grace period for in-flight requests during shutdown.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Per-request handler timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    /// Name the instance registers under in the naming registry.
    #[must_use]
    pub fn registry_name(&self) -> &str {
        self.naming
            .service_name
            .as_deref()
            .unwrap_or(&self.telemetry.service_name)
    }

    /// Converts the telemetry section for `janus_telemetry::init_telemetry`.
    #[must_use]
    pub fn to_telemetry_config(&self) -> janus_telemetry::TelemetryConfig {
        self.telemetry.to_telemetry_config()
    }

    /// Local development preset: pretty debug logs, no export.
    #[must_use]
    pub fn development() -> Self {
        Self {
            server: ServerConfigSection {
                http_addr: "127.0.0.1:8080".to_string(),
                rpc_addr: Some("127.0.0.1:9090".to_string()),
                shutdown_timeout_secs: 5,
                ..ServerConfigSection::default()
            },
            naming: NamingConfigSection::default(),
            telemetry: TelemetryConfigSection {
                logging: LoggingConfigSection {
                    level: "debug".to_string(),
                    format: LogFormat::Pretty,
                    ansi_enabled: true,
                    include_location: true,
                    ..LoggingConfigSection::default()
                },
                ..TelemetryConfigSection::default()
            },
        }
    }

    /// Production preset: JSON logs, registry enabled, 10% trace sampling.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.server.rpc_addr = Some("0.0.0.0:9090".to_string());
        config.naming.enabled = true;
        config.telemetry.environment = "production".to_string();
        config.telemetry.tracing.sampling_ratio = 0.1;
        config
    }
}

fn check_addr(field: &str, value: &str) -> Result<(), ConfigError> {
    value
        .parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ConfigError::invalid_value(field, format!("invalid socket address: {value}")))
}

/// Builder for [`JanusConfig`].
#[derive(Debug, Default)]
pub struct JanusConfigBuilder {
    server: Option<ServerConfigSection>,
    naming: Option<NamingConfigSection>,
    telemetry: Option<TelemetryConfigSection>,
}

impl JanusConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server section.
    #[must_use]
    pub fn server(mut self, server: ServerConfigSection) -> Self {
        self.server = Some(server);
        self
    }

    /// Sets the naming section.
    #[must_use]
    pub fn naming(mut self, naming: NamingConfigSection) -> Self {
        self.naming = Some(naming);
        self
    }

    /// Sets the telemetry section.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetryConfigSection) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Builds the configuration without validation.
    #[must_use]
    pub fn build(self) -> JanusConfig {
        JanusConfig {
            server: self.server.unwrap_or_default(),
            naming: self.naming.unwrap_or_default(),
            telemetry: self.telemetry.unwrap_or_default(),
        }
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn build_validated(self) -> Result<JanusConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
