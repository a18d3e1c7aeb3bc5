//! # Janus Core
//!
//! Core types and traits for the Janus dispatch framework.
//!
//! This crate provides the foundational types shared by both transports:
//!
//! - [`RequestContext`] - Per-request state threaded through the middleware chain
//! - [`CallContext`] - Read-mostly request view handed to service methods
//! - [`JanusError`] - Error taxonomy with HTTP and gRPC status mapping
//! - [`MethodDescriptor`] and [`classify`] - Registration-time method metadata
//! - [`RequestLogger`], [`Tracer`], [`NamingRegistry`] - Collaborator interfaces

#![doc(html_root_url = "https://docs.rs/janus-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod call;
pub mod classify;
mod context;
mod error;
pub mod logger;
pub mod naming;
pub mod service;
pub mod trace;
pub mod validate;

use std::future::Future;
use std::pin::Pin;

pub use call::CallContext;
pub use classify::classify;
pub use context::{
    CancelOnDrop, Cancellation, Extensions, RequestContext, RequestContextBuilder, RequestId,
    RequestInfo, RouteInfo, Transport,
};
pub use error::{
    ErrorDetail, ErrorEnvelope, ErrorKind, ErrorList, JanusError, JanusResult, RequestError,
    RpcCode,
};
pub use janus_router::Params;
pub use logger::{LogLevel, LogRecord, LogSink, MemorySink, RequestLogger, TracingSink};
pub use naming::{NamingRegistry, RegistryError};
pub use service::{Empty, MethodDescriptor, MethodKind, TypeIdentity};
pub use trace::{FinishedSpan, NoopTracer, RecordingTracer, Span, SpanContext, SpanGuard, Tracer};
pub use validate::{JsonValidator, RequestValidator, Validate};

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
