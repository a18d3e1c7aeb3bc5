//! Naming registry collaborator interface.
//!
//! A registry advertises `service name → address` so clients can discover
//! the server. Backends (key-value stores, DNS, ...) live outside the core;
//! the server crate ships an in-memory implementation.

use thiserror::Error;

use crate::BoxFuture;

/// Errors returned by naming registries.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The backend could not be reached.
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish in time.
    #[error("registry call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The backend refused the operation.
    #[error("registry rejected {operation} for '{service}': {message}")]
    Rejected {
        /// `register` or `deregister`.
        operation: &'static str,
        /// Service name.
        service: String,
        /// Backend message.
        message: String,
    },
}

/// Service naming backend.
///
/// Calls may block on network I/O; the server bounds each call with its
/// configured registry timeout.
pub trait NamingRegistry: Send + Sync + 'static {
    /// Advertises `address` under `service`.
    ///
    /// Registering again refreshes the entry.
    fn register<'a>(
        &'a self,
        service: &'a str,
        address: &'a str,
    ) -> BoxFuture<'a, Result<(), RegistryError>>;

    /// Removes the advertisement for `service`.
    fn deregister<'a>(&'a self, service: &'a str) -> BoxFuture<'a, Result<(), RegistryError>>;
}
