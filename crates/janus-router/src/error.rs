//! Route table errors.

use http::Method;
use thiserror::Error;

/// Errors produced while registering or resolving routes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// A handler is already registered for this verb and path.
    #[error("duplicate route: {method} {path} is already registered")]
    Duplicate {
        /// Verb of the conflicting registration.
        method: Method,
        /// Normalized path of the conflicting registration.
        path: String,
    },

    /// The path pattern cannot be inserted.
    #[error("invalid route pattern '{path}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No handler matches the verb and path.
    #[error("no route for {method} {path}")]
    NotFound {
        /// Requested verb.
        method: Method,
        /// Requested path.
        path: String,
    },
}
