//! Native RPC server.
//!
//! Services registered here answer gRPC calls on the RPC listener at
//! `/{service}/{method}`. Interceptors run after the global middleware for
//! every RPC call, much like a group chain does for HTTP routes.

use std::sync::Arc;
use std::time::Duration;

use janus_middleware::{Chain, Middleware};

use crate::dispatcher::{Dispatcher, Route};
use crate::error::ServerError;
use crate::service::{MethodEndpoint, ServiceDefinition};

/// Registry of services served over the RPC listener.
///
/// # Example
///
/// ```rust
/// use janus_middleware::stages::RecoveryMiddleware;
/// use janus_server::RpcServer;
///
/// let rpc = RpcServer::new().interceptor(RecoveryMiddleware::new());
/// assert_eq!(rpc.interceptor_names(), vec!["recovery"]);
/// assert!(rpc.services().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RpcServer {
    interceptors: Chain,
    services: Vec<ServiceDefinition>,
}

impl RpcServer {
    /// Creates an empty RPC server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an interceptor.
    #[must_use]
    pub fn interceptor<M: Middleware>(mut self, interceptor: M) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Registers a service.
    #[must_use]
    pub fn register(mut self, service: &ServiceDefinition) -> Self {
        self.services.push(service.clone());
        self
    }

    /// Returns the registered services.
    #[must_use]
    pub fn services(&self) -> &[ServiceDefinition] {
        &self.services
    }

    /// Returns the interceptor names, in execution order.
    #[must_use]
    pub fn interceptor_names(&self) -> Vec<&'static str> {
        self.interceptors.names()
    }

    pub(crate) fn mount(&self, dispatcher: &mut Dispatcher, timeout: Duration) -> Result<(), ServerError> {
        let chain = dispatcher.global().then(&self.interceptors);
        for service in &self.services {
            for binding in service.methods() {
                let endpoint = MethodEndpoint::new(binding.clone(), timeout);
                let route = Route::new(chain.clone(), Arc::new(endpoint));
                dispatcher.add_rpc(binding, route)?;
            }
        }
        Ok(())
    }
}
