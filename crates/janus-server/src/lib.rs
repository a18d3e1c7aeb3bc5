//! # Janus Server
//!
//! Dual-protocol dispatch for the Janus framework: one set of handlers,
//! served as JSON over HTTP and as gRPC.
//!
//! ## Overview
//!
//! - **Groups**: path prefixes with their own middleware, holding explicit
//!   controllers and bound services ([`RouterGroup`])
//! - **Services**: typed methods classified once at registration; `Empty`
//!   input means a `GET` query, anything else a `POST` command
//!   ([`RpcService`], [`ServiceDefinition`])
//! - **Native RPC**: the same services at `/{service}/{method}` on a second,
//!   HTTP/2 listener ([`RpcServer`])
//! - **Lifecycle**: naming registration, graceful shutdown with a drain
//!   timeout, and deregistration exactly once ([`BoundServer::serve`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use janus_core::{CallContext, Empty, JanusError};
//! use janus_server::{RpcServer, RpcService, Server, ServerConfig, ServiceDefinition, ServiceMethods};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Reply { reply: String }
//!
//! struct Hello;
//!
//! impl Hello {
//!     async fn anonymous(self: Arc<Self>, _ctx: CallContext, _req: Empty) -> Result<Reply, JanusError> {
//!         Ok(Reply { reply: "hi".into() })
//!     }
//! }
//!
//! impl RpcService for Hello {
//!     const NAME: &'static str = "Hello";
//!     fn bind(methods: &mut ServiceMethods<Self>) {
//!         methods.method("SayHelloAnonymous", Hello::anonymous);
//!     }
//! }
//!
//! # async fn run() -> Result<(), janus_server::ServerError> {
//! let hello = ServiceDefinition::new(Hello);
//!
//! let mut server = Server::new(ServerConfig::default())
//!     .with_rpc_server(RpcServer::new().register(&hello));
//! server.use_default_stages();
//! server.group("/").bind_service(&hello); // GET /hello/say-hello-anonymous
//!
//! server.run("0.0.0.0:8080", Some("0.0.0.0:9090")).await
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/janus-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod dispatcher;
mod error;
pub mod grpc;
mod group;
mod handler;
pub mod naming;
mod rpc;
mod server;
mod service;
mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use dispatcher::Dispatcher;
pub use error::ServerError;
pub use grpc::{RpcStatus, GRPC_CONTENT_TYPE};
pub use group::RouterGroup;
pub use handler::Controller;
pub use naming::{MemoryRegistry, NoopRegistry, Registration};
pub use rpc::RpcServer;
pub use server::{BoundServer, Server};
pub use service::{MethodBinding, RpcService, ServiceDefinition, ServiceMethods};
pub use shutdown::{InFlightGuard, InFlightTracker, ShutdownSignal};

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
