//! Top-level error type.

use janus_config::ConfigError;
use janus_server::ServerError;
use janus_telemetry::TelemetryError;
use thiserror::Error;

/// Errors from bootstrapping or running an [`App`](crate::App).
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging, metrics or tracing could not be initialized.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The server could not bind or register its routes.
    #[error(transparent)]
    Server(#[from] ServerError),
}
