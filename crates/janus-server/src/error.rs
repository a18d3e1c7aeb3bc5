//! Startup and lifecycle errors.

use std::net::SocketAddr;

use janus_router::RouteError;
use thiserror::Error;

/// Errors that end [`Server::run`](crate::Server::run) or prevent binding.
///
/// Request-level failures never surface here; they are recorded into the
/// request context and turned into responses.
#[derive(Debug, Error)]
pub enum ServerError {
    /// An address could not be parsed.
    #[error("invalid address '{addr}': {reason}")]
    InvalidAddress {
        /// The offending address.
        addr: String,
        /// Parser message.
        reason: String,
    },

    /// A listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the listener tried to bind.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A route could not be registered (duplicate or invalid pattern).
    #[error(transparent)]
    Route(#[from] RouteError),

    /// Two RPC registrations claimed the same `/{service}/{method}` path.
    #[error("duplicate RPC method: {path} is already registered")]
    DuplicateRpcMethod {
        /// The conflicting RPC path.
        path: String,
    },

    /// I/O error during server operation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_route_error_is_transparent() {
        let err: ServerError = RouteError::Duplicate {
            method: Method::POST,
            path: "/hi/hi".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "duplicate route: POST /hi/hi is already registered"
        );
    }

    #[test]
    fn test_duplicate_rpc_message() {
        let err = ServerError::DuplicateRpcMethod {
            path: "/Hello/SayHello".to_string(),
        };
        assert!(err.to_string().contains("/Hello/SayHello"));
    }
}
