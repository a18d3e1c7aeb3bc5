//! Tracing middleware.
//!
//! Starts the request span through the tracer injected into the request
//! context. The parent comes from the caller's propagation headers (see
//! [`crate::propagation`]). The span is finished when the dispatcher
//! finalizes the context, so it covers everything this stage wraps.
//!
//! ## Span Attributes
//!
//! - `http.request.method` - HTTP method
//! - `url.path` - Request path
//! - `http.route` - Matched route pattern
//! - `janus.transport` - `http` or `rpc`
//! - `janus.request_id` - Request ID
//! - `http.response.status_code` - Response status (added on completion)
//!
//! ## Response Headers
//!
//! - `x-request-id` - The request ID
//! - `traceparent` - The request span, for callers that continue the trace

use http::header::HeaderValue;
use janus_core::RequestContext;

use crate::middleware::{BoxFuture, Middleware, Next};
use crate::propagation::{self, TRACEPARENT_HEADER};
use crate::types::{Request, Response};

/// Response header carrying the request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware that opens the request span.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

impl TracingMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for TracingMiddleware {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if let Some(parent) = propagation::extract(request.headers()) {
                ctx.set_remote_parent(parent);
            }

            let path = request.uri().path().to_string();
            let route = ctx.route().map(|r| r.pattern().to_string());
            let name = route.clone().unwrap_or_else(|| path.clone());
            let span_context = ctx.start_span(&name);

            let method = request.method().to_string();
            let transport = ctx.transport().as_str();
            let request_id = ctx.request_id();
            if let Some(span) = ctx.span_mut() {
                span.set_attribute("http.request.method", method);
                span.set_attribute("url.path", path);
                if let Some(route) = route {
                    span.set_attribute("http.route", route);
                }
                span.set_attribute("janus.transport", transport.to_string());
                span.set_attribute("janus.request_id", request_id.to_string());
            }

            let mut response = next.run(ctx, request).await;

            if let Some(span) = ctx.span_mut() {
                span.set_attribute(
                    "http.response.status_code",
                    response.status().as_u16().to_string(),
                );
            }

            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                headers.insert(REQUEST_ID_HEADER, value);
            }
            if span_context.is_valid() {
                if let Ok(value) = HeaderValue::from_str(&span_context.to_traceparent()) {
                    headers.insert(TRACEPARENT_HEADER, value);
                }
            }

            response
        })
    }
}
