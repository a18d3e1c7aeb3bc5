//! Built-in middleware stages.
//!
//! None of these are installed implicitly; the server installs the
//! default set as global middleware and applications add their own around
//! them.
//!
//! - [`logger`] - One structured log line per request
//! - [`tracing`] - Request span with W3C/B3 parent extraction
//! - [`recovery`] - Catch handler panics
//! - [`validation`] - Validate command bodies before the handler

pub mod logger;
pub mod recovery;
pub mod tracing;
pub mod validation;

pub use logger::RequestLogMiddleware;
pub use recovery::RecoveryMiddleware;
pub use tracing::TracingMiddleware;
pub use validation::ValidationMiddleware;
