//! Handler-facing view of a request.

use std::fmt;
use std::sync::Arc;

use http::{HeaderMap, Method, Uri};
use janus_router::Params;
use serde::de::DeserializeOwned;

use crate::context::{Cancellation, RequestId, RequestInfo, Transport};
use crate::error::JanusError;
use crate::logger::RequestLogger;
use crate::trace::{SpanContext, SpanGuard, Tracer};

/// Cheap, cloneable view of a request handed to service methods.
///
/// The mutable [`RequestContext`](crate::RequestContext) stays with the
/// middleware chain. Service methods get this view instead, holding the
/// request carrier, the shared logger, the tracer and the cancellation flag.
#[derive(Clone)]
pub struct CallContext {
    inner: Arc<CallInner>,
    parent_span: Option<SpanContext>,
}

struct CallInner {
    request_id: RequestId,
    info: RequestInfo,
    params: Params,
    logger: RequestLogger,
    tracer: Arc<dyn Tracer>,
    cancellation: Cancellation,
}

impl CallContext {
    pub(crate) fn new(
        request_id: RequestId,
        info: RequestInfo,
        params: Params,
        logger: RequestLogger,
        tracer: Arc<dyn Tracer>,
        parent_span: Option<SpanContext>,
        cancellation: Cancellation,
    ) -> Self {
        Self {
            inner: Arc::new(CallInner {
                request_id,
                info,
                params,
                logger,
                tracer,
                cancellation,
            }),
            parent_span,
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.inner.request_id
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> Transport {
        self.inner.info.transport()
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        self.inner.info.method()
    }

    /// Returns the request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        self.inner.info.uri()
    }

    /// Returns the request headers (gRPC metadata on the RPC transport).
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.info.headers()
    }

    /// Returns a header value as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the full request info.
    #[must_use]
    pub fn info(&self) -> &RequestInfo {
        &self.inner.info
    }

    /// Returns the path parameters.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.inner.params
    }

    /// Returns one path parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.inner.params.get(name)
    }

    /// Deserializes the query string into `T`.
    pub fn query<T: DeserializeOwned>(&self) -> Result<T, JanusError> {
        serde_urlencoded::from_str(self.uri().query().unwrap_or_default())
            .map_err(|e| JanusError::validation(format!("invalid query string: {e}")))
    }

    /// Returns the first value of one query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(self.uri().query()?).ok()?;
        pairs.into_iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Returns the request logger.
    ///
    /// Fields added here appear in the request's final log line.
    #[must_use]
    pub fn logger(&self) -> &RequestLogger {
        &self.inner.logger
    }

    /// Returns the injected tracer.
    #[must_use]
    pub fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.inner.tracer
    }

    /// Returns the span this call runs under.
    #[must_use]
    pub fn span_context(&self) -> Option<&SpanContext> {
        self.parent_span.as_ref()
    }

    /// Starts a child span.
    ///
    /// Returns the span guard and a context whose parent is the new span,
    /// so nested calls build a tree. The span finishes when the guard is
    /// dropped.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let (_span, ctx) = ctx.start_span("sayHello");
    /// do_work(&ctx).await;
    /// ```
    #[must_use]
    pub fn start_span(&self, name: &str) -> (SpanGuard, CallContext) {
        let span = self.inner.tracer.start_span(name, self.parent_span.as_ref());
        let child = Self {
            inner: Arc::clone(&self.inner),
            parent_span: Some(span.context()),
        };
        (SpanGuard::new(span), child)
    }

    /// Returns `true` if the connection went away.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation.is_cancelled()
    }

    /// Returns the cancellation flag.
    #[must_use]
    pub fn cancellation(&self) -> &Cancellation {
        &self.inner.cancellation
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("request_id", &self.inner.request_id)
            .field("transport", &self.inner.info.transport())
            .field("uri", self.inner.info.uri())
            .field("parent_span", &self.parent_span)
            .finish_non_exhaustive()
    }
}
