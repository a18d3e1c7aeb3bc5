//! Configuration-driven bootstrap.
//!
//! [`App`] ties the crates together: it validates a [`JanusConfig`],
//! initializes telemetry, hands the tracer to a [`Server`], and binds the
//! listeners named in the configuration.

use std::sync::Arc;
use std::time::Duration;

use janus_config::JanusConfig;
use janus_core::NamingRegistry;
use janus_server::{RpcServer, Server, ServerConfig};
use janus_telemetry::{init_telemetry, TelemetryGuard};

use crate::Error;

/// Derives the server settings from the loaded configuration.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use janus::{server_config, JanusConfig};
///
/// let mut config = JanusConfig::default();
/// config.naming.service_name = Some("greeter".to_string());
/// config.server.request_timeout_ms = 1500;
///
/// let server = server_config(&config);
/// assert_eq!(server.service_name(), "greeter");
/// assert_eq!(server.request_timeout(), Duration::from_millis(1500));
/// ```
#[must_use]
pub fn server_config(config: &JanusConfig) -> ServerConfig {
    let builder = ServerConfig::builder()
        .shutdown_timeout(config.shutdown_timeout())
        .request_timeout(config.request_timeout())
        .registry_timeout(Duration::from_millis(config.naming.timeout_ms))
        .registry_ttl(Duration::from_secs(config.naming.ttl_secs))
        .service_name(config.registry_name());
    match &config.naming.advertise_addr {
        Some(addr) => builder.advertise_addr(addr.clone()),
        None => builder,
    }
    .build()
}

/// A configured server plus the telemetry that must outlive it.
pub struct App {
    config: JanusConfig,
    server: Server,
    registry: Option<Arc<dyn NamingRegistry>>,
    _telemetry: Option<TelemetryGuard>,
}

impl App {
    /// Validates `config`, initializes telemetry and creates the server.
    ///
    /// Telemetry installs process-wide subscribers, so call this once.
    pub fn from_config(config: JanusConfig) -> Result<Self, Error> {
        config.validate()?;
        let telemetry = init_telemetry(&config.to_telemetry_config())?;
        let server = Server::new(server_config(&config)).with_tracer(telemetry.tracer());
        Ok(Self {
            config,
            server,
            registry: None,
            _telemetry: Some(telemetry),
        })
    }

    /// Creates the server without touching global telemetry state.
    pub fn without_telemetry(config: JanusConfig) -> Result<Self, Error> {
        config.validate()?;
        let server = Server::new(server_config(&config));
        Ok(Self {
            config,
            server,
            registry: None,
            _telemetry: None,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &JanusConfig {
        &self.config
    }

    /// Returns the server, to add middleware and groups.
    pub fn server(&mut self) -> &mut Server {
        &mut self.server
    }

    /// Sets the services served on the RPC listener.
    #[must_use]
    pub fn with_rpc_server(mut self, rpc: RpcServer) -> Self {
        self.server = self.server.with_rpc_server(rpc);
        self
    }

    /// Sets the naming backend used when `naming.enabled` is set.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn NamingRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Binds the configured listeners and serves until SIGTERM or SIGINT.
    pub async fn run(self) -> Result<(), Error> {
        let Self {
            config,
            mut server,
            registry,
            _telemetry,
        } = self;

        if config.naming.enabled {
            match registry {
                Some(registry) => server = server.with_registry(registry),
                None => tracing::warn!("naming is enabled but no registry was provided"),
            }
        }

        server
            .run(&config.server.http_addr, config.server.rpc_addr.as_deref())
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("server", &self.server)
            .field("registry", &self.registry.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use janus_config::ConfigError;

    #[test]
    fn test_server_config_uses_naming_section() {
        let mut config = JanusConfig::default();
        config.telemetry.service_name = "greeter".to_string();
        config.naming.ttl_secs = 10;
        config.naming.timeout_ms = 250;
        config.naming.advertise_addr = Some("greeter.internal:9090".to_string());
        config.server.shutdown_timeout_secs = 5;

        let server = server_config(&config);
        assert_eq!(server.service_name(), "greeter");
        assert_eq!(server.registry_ttl(), Duration::from_secs(10));
        assert_eq!(server.registry_timeout(), Duration::from_millis(250));
        assert_eq!(server.advertise_addr(), Some("greeter.internal:9090"));
        assert_eq!(server.shutdown_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = JanusConfig::default();
        config.server.http_addr = "nowhere".to_string();

        let err = App::without_telemetry(config).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidValue { .. })));
    }
}
