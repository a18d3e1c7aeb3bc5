//! Error types for Janus.
//!
//! [`JanusError`] is the error every handler, middleware and adapter returns
//! on the request path. Each variant maps to an HTTP status and to a gRPC
//! status code, so the same failure surfaces consistently on both
//! transports:
//!
//! | Variant | HTTP | RPC |
//! |---|---|---|
//! | `RouteNotFound` | 404 | `UNIMPLEMENTED` |
//! | `MethodNotFound` | 404 | `UNIMPLEMENTED` |
//! | `Validation` | 400 | `INVALID_ARGUMENT` |
//! | `Handler` | chosen by the handler | mapped from that status |
//! | `Timeout` | 504 | `DEADLINE_EXCEEDED` |
//! | `Cancelled` | 499 | `CANCELLED` |
//! | `Transport` | no response | no response |
//! | `Internal` | 500 | `INTERNAL` |
//!
//! Errors recorded into a request context are stored as [`RequestError`]
//! snapshots in an [`ErrorList`], which serializes to the JSON array that
//! ends up in the request's final log line.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`JanusError`].
pub type JanusResult<T> = Result<T, JanusError>;

/// Non-standard status used when the client went away before a response.
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Classification of request errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No route, service or method matched the request.
    RouteNotFound,
    /// Input failed required-field or shape checks.
    Validation,
    /// Business logic failure reported by a handler.
    Handler,
    /// The handler did not finish within the request timeout.
    Timeout,
    /// The caller went away before the request finished.
    Cancelled,
    /// I/O failure on the underlying connection.
    Transport,
    /// Unexpected failure inside the framework or a handler.
    Internal,
}

/// gRPC status codes.
///
/// HTTP statuses chosen by handlers are mapped with
/// [`RpcCode::from_http_status`], following the table used by gRPC
/// gateways: 400 → `INVALID_ARGUMENT`, 401 → `UNAUTHENTICATED`,
/// 403 → `PERMISSION_DENIED`, 404 → `NOT_FOUND`, 408 → `DEADLINE_EXCEEDED`, 409 → `ABORTED`,
/// 429 → `RESOURCE_EXHAUSTED`, 499 → `CANCELLED`, 501 → `UNIMPLEMENTED`,
/// 503 → `UNAVAILABLE`, 504 → `DEADLINE_EXCEEDED`, other 2xx → `OK`
/// and anything else → `INTERNAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum RpcCode {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl RpcCode {
    /// Returns the numeric code sent in the `grpc-status` trailer.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Parses a numeric `grpc-status` value.
    #[must_use]
    pub const fn from_i32(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::Ok,
            1 => Self::Cancelled,
            2 => Self::Unknown,
            3 => Self::InvalidArgument,
            4 => Self::DeadlineExceeded,
            5 => Self::NotFound,
            6 => Self::AlreadyExists,
            7 => Self::PermissionDenied,
            8 => Self::ResourceExhausted,
            9 => Self::FailedPrecondition,
            10 => Self::Aborted,
            11 => Self::OutOfRange,
            12 => Self::Unimplemented,
            13 => Self::Internal,
            14 => Self::Unavailable,
            15 => Self::DataLoss,
            16 => Self::Unauthenticated,
            _ => return None,
        })
    }

    /// Maps an HTTP status to the closest gRPC code.
    #[must_use]
    pub fn from_http_status(status: StatusCode) -> Self {
        match status.as_u16() {
            200..=299 => Self::Ok,
            400 => Self::InvalidArgument,
            401 => Self::Unauthenticated,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            408 | 504 => Self::DeadlineExceeded,
            409 => Self::Aborted,
            429 => Self::ResourceExhausted,
            CLIENT_CLOSED_REQUEST => Self::Cancelled,
            501 => Self::Unimplemented,
            503 => Self::Unavailable,
            _ => Self::Internal,
        }
    }
}

impl std::fmt::Display for RpcCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// Standard error type for Janus.
///
/// # Example
///
/// ```
/// use janus_core::{JanusError, ErrorKind};
///
/// fn check_name(name: &str) -> Result<(), JanusError> {
///     if name.is_empty() {
///         return Err(JanusError::validation_field("name", "must not be empty"));
///     }
///     Ok(())
/// }
///
/// let err = check_name("").unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::Validation);
/// assert_eq!(err.status_code().as_u16(), 400);
/// ```
#[derive(Error, Debug)]
pub enum JanusError {
    /// No HTTP route matched the request.
    #[error("Route not found: {method} {path}")]
    RouteNotFound {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// No RPC service method matched the call.
    #[error("Unknown method: /{service}/{method}")]
    MethodNotFound {
        /// Requested service.
        service: String,
        /// Requested method.
        method: String,
    },

    /// Request validation failed.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable error message.
        message: String,
        /// The offending field, when known.
        field: Option<String>,
    },

    /// A handler reported a business failure.
    #[error("{message}")]
    Handler {
        /// Status the handler chose for the response.
        status: StatusCode,
        /// Human-readable error message.
        message: String,
    },

    /// Request timeout.
    #[error("Timeout: {message}")]
    Timeout {
        /// Human-readable error message.
        message: String,
    },

    /// The connection closed before the request finished.
    #[error("Request cancelled")]
    Cancelled,

    /// I/O failure on the transport.
    #[error("Transport error: {message}")]
    Transport {
        /// Human-readable error message.
        message: String,
    },

    /// Internal server error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl JanusError {
    /// Creates a route-not-found error.
    #[must_use]
    pub fn route_not_found(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::RouteNotFound {
            method: method.into(),
            path: path.into(),
        }
    }

    /// Creates an unknown RPC method error.
    #[must_use]
    pub fn method_not_found(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            service: service.into(),
            method: method.into(),
        }
    }

    /// Creates a validation error with a message.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a validation error naming the offending field.
    #[must_use]
    pub fn validation_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        Self::Validation {
            message: format!("{field}: {}", message.into()),
            field: Some(field),
        }
    }

    /// Creates a handler error with an explicit status.
    #[must_use]
    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Handler {
            status,
            message: message.into(),
        }
    }

    /// Creates a handler error with status 400.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::handler(StatusCode::BAD_REQUEST, message)
    }

    /// Creates a handler error with status 404.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::handler(StatusCode::NOT_FOUND, message)
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RouteNotFound { .. } | Self::MethodNotFound { .. } => ErrorKind::RouteNotFound,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Handler { .. } => ErrorKind::Handler,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } | Self::MethodNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation { .. } | Self::Transport { .. } => StatusCode::BAD_REQUEST,
            Self::Handler { status, .. } => *status,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Cancelled => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::BAD_REQUEST),
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the gRPC status code for this error.
    #[must_use]
    pub fn rpc_code(&self) -> RpcCode {
        match self {
            Self::RouteNotFound { .. } | Self::MethodNotFound { .. } => RpcCode::Unimplemented,
            Self::Validation { .. } => RpcCode::InvalidArgument,
            Self::Handler { status, .. } => RpcCode::from_http_status(*status),
            Self::Timeout { .. } => RpcCode::DeadlineExceeded,
            Self::Cancelled => RpcCode::Cancelled,
            Self::Transport { .. } => RpcCode::Unavailable,
            Self::Internal { .. } => RpcCode::Internal,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RouteNotFound { .. } | Self::MethodNotFound { .. } => "NOT_FOUND",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Handler { .. } => "HANDLER_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Converts this error to a serializable error envelope.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                field: match self {
                    Self::Validation { field, .. } => field.clone(),
                    _ => None,
                },
            },
            request_id: request_id.map(ToString::to_string),
        }
    }

    /// Snapshots this error for storage in a request's [`ErrorList`].
    #[must_use]
    pub fn to_record(&self) -> RequestError {
        RequestError {
            kind: self.kind(),
            code: self.error_code().to_string(),
            message: self.to_string(),
            status: self.status_code().as_u16(),
        }
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// The offending field for validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// An error recorded against a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestError {
    /// Error kind.
    pub kind: ErrorKind,
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// HTTP status the error maps to.
    pub status: u16,
}

/// Ordered list of errors accumulated while processing one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorList {
    errors: Vec<RequestError>,
}

impl ErrorList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an error.
    pub fn push(&mut self, error: RequestError) {
        self.errors.push(error);
    }

    /// Returns `true` if no errors were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of recorded errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns the most recently recorded error.
    #[must_use]
    pub fn last(&self) -> Option<&RequestError> {
        self.errors.last()
    }

    /// Iterates over the errors in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &RequestError> {
        self.errors.iter()
    }

    /// Serializes the list as a JSON array.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.errors).unwrap_or_else(|_| "[]".to_string())
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a RequestError;
    type IntoIter = std::slice::Iter<'a, RequestError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
