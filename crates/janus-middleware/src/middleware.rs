//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait that chain entries implement
//! and the [`Endpoint`] trait for the terminal step. Middleware sees the
//! request before the endpoint and the response after it.
//!
//! # Example
//!
//! ```
//! use janus_middleware::{BoxFuture, Middleware, Next, Request, Response};
//! use janus_core::RequestContext;
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut RequestContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             let response = next.run(ctx, request).await;
//!             ctx.logger().with_field("ElapsedMs", ctx.elapsed().as_millis() as u64);
//!             response
//!         })
//!     }
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use janus_core::{CallContext, RequestContext};

pub use janus_core::BoxFuture;

use crate::types::{Request, Response};

/// A chain entry.
///
/// Middleware receives the request context, the request and a [`Next`]
/// handle for the rest of the chain. Code before `next.run(..).await` runs
/// in chain order; code after it runs in reverse order.
///
/// # Invariants
///
/// - Call `next.run()` at most once; not calling it short-circuits the chain
/// - Record failures on the context with
///   [`RequestContext::record_error`] instead of dropping them
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this middleware, used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Processes the request through this middleware.
    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// The terminal step of a chain: a controller or an RPC method adapter.
pub trait Endpoint: Send + Sync {
    /// Handles the request.
    fn call<'a>(&'a self, ctx: &'a mut RequestContext, request: Request) -> BoxFuture<'a, Response>;
}

impl<E: Endpoint + ?Sized> Endpoint for Arc<E> {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext, request: Request) -> BoxFuture<'a, Response> {
        (**self).call(ctx, request)
    }
}

/// Handle to the remainder of the chain.
///
/// Walks a slice of entries by position and ends in an [`Endpoint`], so
/// running the chain allocates nothing beyond the entries' own futures.
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    /// Creates a handle that runs `entries` and then `endpoint`.
    pub fn new(entries: &'a [Arc<dyn Middleware>], endpoint: &'a dyn Endpoint) -> Self {
        Self {
            remaining: entries,
            endpoint,
        }
    }

    /// Runs the next entry, or the endpoint once the entries are exhausted.
    pub fn run(self, ctx: &'a mut RequestContext, request: Request) -> BoxFuture<'a, Response> {
        match self.remaining.split_first() {
            Some((entry, rest)) => entry.process(
                ctx,
                request,
                Next {
                    remaining: rest,
                    endpoint: self.endpoint,
                },
            ),
            None => self.endpoint.call(ctx, request),
        }
    }

    /// Returns the number of entries left before the endpoint.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field(
                "remaining",
                &self.remaining.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// An [`Endpoint`] built from a closure over the handler view of the
/// request.
///
/// # Example
///
/// ```
/// use janus_middleware::{FnEndpoint, Response, ResponseExt};
/// use http::StatusCode;
///
/// let endpoint = FnEndpoint::new(|call: janus_core::CallContext, _request: janus_middleware::Request| async move {
///     Response::json(StatusCode::OK, &serde_json::json!({"id": call.request_id().to_string()}))
/// });
/// ```
pub struct FnEndpoint<F> {
    f: F,
}

impl<F> FnEndpoint<F> {
    /// Wraps a closure.
    pub const fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> Endpoint for FnEndpoint<F>
where
    F: Fn(CallContext, Request) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut RequestContext, request: Request) -> BoxFuture<'a, Response> {
        Box::pin((self.f)(ctx.call_context(), request))
    }
}

impl<F> fmt::Debug for FnEndpoint<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnEndpoint").finish_non_exhaustive()
    }
}
