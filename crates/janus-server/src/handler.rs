//! Controllers and the endpoint adapters around them.
//!
//! A [`Controller`] serves one explicit `(path, verb)` route and works on
//! the raw request. Service methods get their own adapter in
//! [`service`](crate::service); both end in [`error_response`] when
//! something fails, so every failure is recorded into the request context
//! before it becomes a response.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use janus_core::{BoxFuture, CallContext, Cancellation, JanusError, JanusResult, RequestContext};
use janus_middleware::{Endpoint, Request, Response, ResponseExt};

use crate::grpc::RpcStatus;

/// Handler for an explicitly registered route.
///
/// Closures `Fn(CallContext, Request) -> impl Future<Output = JanusResult<Response>>`
/// implement this trait.
///
/// # Example
///
/// ```rust
/// use http::StatusCode;
/// use janus_core::{BoxFuture, CallContext, JanusResult};
/// use janus_middleware::{Request, Response, ResponseExt};
/// use janus_server::Controller;
///
/// struct TestController;
///
/// impl Controller for TestController {
///     fn handle(&self, _ctx: CallContext, _request: Request) -> BoxFuture<'static, JanusResult<Response>> {
///         Box::pin(async { Ok(Response::json(StatusCode::OK, &serde_json::json!({"reply": "ha"}))) })
///     }
/// }
/// ```
pub trait Controller: Send + Sync + 'static {
    /// Handles one request.
    fn handle(&self, ctx: CallContext, request: Request) -> BoxFuture<'static, JanusResult<Response>>;
}

impl<F, Fut> Controller for F
where
    F: Fn(CallContext, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = JanusResult<Response>> + Send + 'static,
{
    fn handle(&self, ctx: CallContext, request: Request) -> BoxFuture<'static, JanusResult<Response>> {
        Box::pin(self(ctx, request))
    }
}

/// Terminal endpoint running a controller under the request timeout.
pub(crate) struct ControllerEndpoint {
    controller: Arc<dyn Controller>,
    timeout: Duration,
}

impl ControllerEndpoint {
    pub(crate) fn new(controller: Arc<dyn Controller>, timeout: Duration) -> Self {
        Self {
            controller,
            timeout,
        }
    }
}

impl Endpoint for ControllerEndpoint {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext, request: Request) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let call = ctx.call_context();
            let cancellation = ctx.cancellation().clone();
            let outcome =
                bounded(cancellation, self.timeout, self.controller.handle(call, request)).await;
            match outcome {
                Ok(response) => response,
                Err(error) => error_response(ctx, &error),
            }
        })
    }
}

/// Runs `work` until it finishes, the timeout fires, or the caller goes away.
pub(crate) async fn bounded<T>(
    cancellation: Cancellation,
    timeout: Duration,
    work: impl Future<Output = JanusResult<T>>,
) -> JanusResult<T> {
    tokio::select! {
        result = tokio::time::timeout(timeout, work) => match result {
            Ok(outcome) => outcome,
            Err(_) => Err(JanusError::timeout(format!("handler exceeded {timeout:?}"))),
        },
        () = cancellation.cancelled() => Err(JanusError::Cancelled),
    }
}

/// Records `error` on the request and renders it for either transport.
pub(crate) fn error_response(ctx: &mut RequestContext, error: &JanusError) -> Response {
    ctx.record_error(error);
    let mut response = Response::from_error(error, ctx.request_id());
    response.extensions_mut().insert(RpcStatus::from_error(error));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::StatusCode;
    use janus_core::{ErrorKind, RpcCode};

    fn request() -> Request {
        http::Request::new(Bytes::new())
    }

    #[tokio::test]
    async fn test_closure_controller_success() {
        let endpoint = ControllerEndpoint::new(
            Arc::new(|_ctx: CallContext, _req: Request| async {
                Ok::<_, JanusError>(Response::text(StatusCode::OK, "hi"))
            }),
            Duration::from_secs(1),
        );
        let mut ctx = RequestContext::builder().build();

        let response = endpoint.call(&mut ctx, request()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!ctx.has_errors());
    }

    #[tokio::test]
    async fn test_controller_error_is_recorded() {
        let endpoint = ControllerEndpoint::new(
            Arc::new(|_ctx: CallContext, _req: Request| async {
                Err::<Response, _>(JanusError::handler(StatusCode::CONFLICT, "already exists"))
            }),
            Duration::from_secs(1),
        );
        let mut ctx = RequestContext::builder().build();

        let response = endpoint.call(&mut ctx, request()).await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(ctx.errors().len(), 1);
        let status = response.extensions().get::<RpcStatus>().unwrap();
        assert_eq!(status.code, RpcCode::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_controller_timeout() {
        let endpoint = ControllerEndpoint::new(
            Arc::new(|_ctx: CallContext, _req: Request| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, JanusError>(Response::text(StatusCode::OK, "late"))
            }),
            Duration::from_secs(1),
        );
        let mut ctx = RequestContext::builder().build();

        let response = endpoint.call(&mut ctx, request()).await;

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(ctx.errors().last().unwrap().kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_cancellation_stops_handler() {
        let endpoint = ControllerEndpoint::new(
            Arc::new(|_ctx: CallContext, _req: Request| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok::<_, JanusError>(Response::text(StatusCode::OK, "never"))
            }),
            Duration::from_secs(60),
        );
        let mut ctx = RequestContext::builder().build();
        ctx.cancellation().cancel();

        let response = endpoint.call(&mut ctx, request()).await;

        assert_eq!(response.status().as_u16(), 499);
        assert_eq!(ctx.errors().last().unwrap().kind, ErrorKind::Cancelled);
    }
}
