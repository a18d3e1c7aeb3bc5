//! # Janus Middleware
//!
//! Ordered middleware chain for the Janus dispatch framework.
//!
//! Every request, whether it arrived over HTTP or gRPC, runs through one
//! chain of middleware that ends in the resolved endpoint:
//!
//! ```text
//! Request → A → B → C → Endpoint
//!                          ↓
//! Response ← A ← B ← C ←───┘
//! ```
//!
//! Entries run in insertion order. The code each entry runs after
//! `next.run(..).await` executes in reverse order. An entry may return a
//! response without calling `next`, which skips the rest of the chain.
//!
//! ## Built-in Stages
//!
//! | Stage | Middleware | Purpose |
//! |-------|------------|---------|
//! | Logging | [`stages::RequestLogMiddleware`] | One structured line per request |
//! | Tracing | [`stages::TracingMiddleware`] | Span per request, W3C/B3 propagation |
//! | Recovery | [`stages::RecoveryMiddleware`] | Turn handler panics into 500 |
//! | Validation | [`stages::ValidationMiddleware`] | Validate command bodies |
//!
//! ## Example
//!
//! ```
//! use janus_middleware::{Chain, FnEndpoint, Response, ResponseExt};
//! use janus_core::RequestContext;
//! use http::StatusCode;
//!
//! # async fn example() {
//! let chain = Chain::new();
//! let endpoint = FnEndpoint::new(|_call, _request| async {
//!     Response::json(StatusCode::OK, &serde_json::json!({"reply": "ha"}))
//! });
//!
//! let mut ctx = RequestContext::builder().build();
//! let request = http::Request::new(bytes::Bytes::new());
//! let response = chain.run(&mut ctx, request, &endpoint).await;
//! assert_eq!(response.status(), StatusCode::OK);
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/janus-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod middleware;
pub mod propagation;
pub mod stages;
pub mod types;

pub use chain::Chain;
pub use middleware::{BoxFuture, Endpoint, FnEndpoint, Middleware, Next};
pub use types::{Request, Response, ResponseExt};
