//! Panic recovery middleware.
//!
//! A panic in a downstream entry or handler unwinds to this stage, which
//! records an internal error on the context and answers with 500. The
//! connection and the process keep running.
//!
//! Install it close to the endpoint: entries before it still see the 500
//! response and unwind normally.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use janus_core::{JanusError, RequestContext};

use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};

/// Middleware that turns panics into 500 responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryMiddleware;

impl RecoveryMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}

impl Middleware for RecoveryMiddleware {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            // Build the downstream future inside the guarded block so panics
            // raised while constructing it are caught too.
            let outcome = AssertUnwindSafe(async { next.run(&mut *ctx, request).await })
                .catch_unwind()
                .await;

            match outcome {
                Ok(response) => response,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(
                        request_id = %ctx.request_id(),
                        panic = %message,
                        "handler panicked"
                    );
                    let error = JanusError::internal(format!("handler panicked: {message}"));
                    ctx.record_error(&error);
                    Response::from_error(&error, ctx.request_id())
                }
            }
        })
    }
}
