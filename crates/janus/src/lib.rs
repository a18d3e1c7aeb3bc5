//! # Janus
//!
//! One set of handlers, served as JSON over HTTP and as gRPC.
//!
//! This is the facade crate: it re-exports the building blocks and adds
//! [`App`], which wires configuration, telemetry and the server together.
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | [`core`] | Request context, errors, service descriptors |
//! | [`router`] | Route table and path derivation |
//! | [`middleware`] | Middleware chain and built-in stages |
//! | [`server`] | Dispatcher, listeners, naming, shutdown |
//! | [`telemetry`] | Logging, metrics and tracing setup |
//! | [`config`] | Layered file and environment configuration |
//!
//! ## Example
//!
//! ```rust,no_run
//! use janus::prelude::*;
//!
//! # async fn run() -> Result<(), janus::Error> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("janus.toml")?
//!     .with_env_prefix("JANUS")
//!     .load()?;
//!
//! let mut app = App::from_config(config)?;
//! app.server().use_default_stages();
//! app.run().await
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/janus/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod error;

pub use app::{server_config, App};
pub use error::Error;

pub use janus_config as config;
pub use janus_core as core;
pub use janus_middleware as middleware;
pub use janus_router as router;
pub use janus_server as server;
pub use janus_telemetry as telemetry;

pub use janus_config::{ConfigLoader, JanusConfig};

/// Prelude module for convenient imports.
///
/// ```rust
/// use janus::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{App, Error};

    pub use janus_config::{ConfigLoader, JanusConfig};

    pub use janus_core::{
        CallContext, Empty, JanusError, JanusResult, MethodKind, RequestContext, RequestId,
        Validate,
    };

    pub use janus_middleware::stages::{
        RecoveryMiddleware, RequestLogMiddleware, TracingMiddleware, ValidationMiddleware,
    };
    pub use janus_middleware::{Middleware, Next, Request, Response, ResponseExt};

    pub use janus_server::{
        Controller, RpcServer, RpcService, Server, ServerConfig, ServiceDefinition, ServiceMethods,
    };
}
