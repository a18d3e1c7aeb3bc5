//! Server configuration.
//!
//! Listener addresses are passed to [`Server::bind`](crate::Server::bind);
//! everything else that shapes request handling and the lifecycle lives here.
//!
//! # Example
//!
//! ```rust
//! use janus_server::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::builder()
//!     .request_timeout(Duration::from_secs(5))
//!     .service_name("greeter")
//!     .build();
//!
//! assert_eq!(config.service_name(), "greeter");
//! assert_eq!(config.registry_ttl(), Duration::from_secs(30));
//! ```

use std::time::Duration;

/// Default shutdown grace period in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default timeout for each naming registry call in seconds.
pub const DEFAULT_REGISTRY_TIMEOUT_SECS: u64 = 3;

/// Default registry lease in seconds.
pub const DEFAULT_REGISTRY_TTL_SECS: u64 = 30;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Grace period for in-flight requests during shutdown
    shutdown_timeout: Duration,

    /// Bound on body reads and on each handler invocation
    request_timeout: Duration,

    /// Bound on each naming registry call
    registry_timeout: Duration,

    /// Name registered with the naming registry
    service_name: String,

    /// Address advertised to the registry (defaults to the bound address)
    advertise_addr: Option<String>,

    /// Registry lease; heartbeats run at half this interval
    registry_ttl: Duration,
}

impl ServerConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Returns the shutdown grace period.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the registry call timeout.
    #[must_use]
    pub fn registry_timeout(&self) -> Duration {
        self.registry_timeout
    }

    /// Returns the registered service name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Returns the advertised address override, if any.
    #[must_use]
    pub fn advertise_addr(&self) -> Option<&str> {
        self.advertise_addr.as_deref()
    }

    /// Returns the registry lease duration.
    #[must_use]
    pub fn registry_ttl(&self) -> Duration {
        self.registry_ttl
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    shutdown_timeout: Duration,
    request_timeout: Duration,
    registry_timeout: Duration,
    service_name: String,
    advertise_addr: Option<String>,
    registry_ttl: Duration,
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            registry_timeout: Duration::from_secs(DEFAULT_REGISTRY_TIMEOUT_SECS),
            service_name: "janus-service".to_string(),
            advertise_addr: None,
            registry_ttl: Duration::from_secs(DEFAULT_REGISTRY_TTL_SECS),
        }
    }
}

impl ServerConfigBuilder {
    /// Sets the shutdown grace period.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the registry call timeout.
    #[must_use]
    pub fn registry_timeout(mut self, timeout: Duration) -> Self {
        self.registry_timeout = timeout;
        self
    }

    /// Sets the registered service name.
    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Overrides the address advertised to the registry.
    #[must_use]
    pub fn advertise_addr(mut self, addr: impl Into<String>) -> Self {
        self.advertise_addr = Some(addr.into());
        self
    }

    /// Sets the registry lease duration.
    #[must_use]
    pub fn registry_ttl(mut self, ttl: Duration) -> Self {
        self.registry_ttl = ttl;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            shutdown_timeout: self.shutdown_timeout,
            request_timeout: self.request_timeout,
            registry_timeout: self.registry_timeout,
            service_name: self.service_name,
            advertise_addr: self.advertise_addr,
            registry_ttl: self.registry_ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.registry_timeout(), Duration::from_secs(3));
        assert_eq!(config.service_name(), "janus-service");
        assert!(config.advertise_addr().is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ServerConfig::builder()
            .shutdown_timeout(Duration::from_secs(5))
            .registry_ttl(Duration::from_secs(10))
            .advertise_addr("10.0.0.5:9090")
            .build();
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(config.registry_ttl(), Duration::from_secs(10));
        assert_eq!(config.advertise_addr(), Some("10.0.0.5:9090"));
    }
}
