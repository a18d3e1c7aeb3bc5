//! Request validation middleware.
//!
//! Runs the validator attached to the resolved route before the handler.
//! Only command methods carry a body worth validating, so query methods
//! pass straight through. On failure the error is recorded on the context
//! and the chain short-circuits with 400 (`INVALID_ARGUMENT` on gRPC).

use janus_core::{MethodKind, RequestContext};

use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};

/// Middleware that validates command bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationMiddleware;

impl ValidationMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for ValidationMiddleware {
    fn name(&self) -> &'static str {
        "validation"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let outcome = ctx.route().and_then(|route| {
                let is_query = route
                    .descriptor()
                    .is_some_and(|d| d.kind() == MethodKind::Query);
                if is_query {
                    return None;
                }
                route.validator().map(|v| v.validate(request.body()))
            });

            if let Some(Err(error)) = outcome {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    error = %error,
                    "request rejected by validator"
                );
                ctx.record_error(&error);
                return Response::from_error(&error, ctx.request_id());
            }

            next.run(ctx, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::middleware::FnEndpoint;
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use janus_core::{JanusError, JsonValidator, MethodDescriptor, RouteInfo, Validate};
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Deserialize)]
    struct HelloRequest {
        #[serde(default)]
        greeting: String,
    }

    impl Validate for HelloRequest {
        fn validate(&self) -> Result<(), JanusError> {
            if self.greeting.is_empty() {
                return Err(JanusError::validation_field("greeting", "is required"));
            }
            Ok(())
        }
    }

    fn route() -> RouteInfo {
        RouteInfo::new("/hello/say-hello", Method::POST)
            .with_descriptor(MethodDescriptor::new::<HelloRequest, janus_core::Empty>(
                "Hello", "SayHello",
            ))
            .with_validator(Arc::new(JsonValidator::<HelloRequest>::new()))
    }

    async fn run(body: &'static [u8], calls: Arc<AtomicUsize>) -> (Response, RequestContext) {
        let mut ctx = RequestContext::builder().build();
        ctx.set_route(route());
        let endpoint = FnEndpoint::new(move |_call, _req| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Response::text(StatusCode::OK, "ok")
            }
        });
        let response = Chain::new()
            .with(ValidationMiddleware::new())
            .run(&mut ctx, Request::new(Bytes::from_static(body)), &endpoint)
            .await;
        (response, ctx)
    }

    #[tokio::test]
    async fn test_invalid_body_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (response, ctx) = run(b"{}", Arc::clone(&calls)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.errors().len(), 1);
        assert_eq!(ctx.errors().last().unwrap().code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_valid_body_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (response, ctx) = run(br#"{"greeting":"hi"}"#, Arc::clone(&calls)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!ctx.has_errors());
    }

    #[tokio::test]
    async fn test_route_without_validator_passes() {
        let mut ctx = RequestContext::builder().build();
        ctx.set_route(RouteInfo::new("/hi/hi", Method::POST));
        let endpoint = FnEndpoint::new(|_call, _req| async { Response::text(StatusCode::OK, "ok") });
        let response = Chain::new()
            .with(ValidationMiddleware::new())
            .run(&mut ctx, Request::new(Bytes::from_static(b"not json")), &endpoint)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
