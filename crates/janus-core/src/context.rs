//! Request context types.
//!
//! The [`RequestContext`] carries all per-request state through the
//! middleware chain and into the terminal handler. One context exists per
//! request. It is owned by the task serving that request and is finalized
//! exactly once: either explicitly by the dispatcher, or when it is dropped.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::{HeaderMap, Method, Uri};
use janus_router::Params;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::call::CallContext;
use crate::error::{ErrorList, JanusError};
use crate::logger::RequestLogger;
use crate::service::MethodDescriptor;
use crate::trace::{Span, SpanContext, Tracer};
use crate::validate::RequestValidator;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it ideal for request tracking
/// and log correlation.
///
/// # Example
///
/// ```
/// use janus_core::RequestId;
///
/// let id = RequestId::new();
/// println!("Request ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The transport that carried a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Plain HTTP/1.1 or HTTP/2 request.
    Http,
    /// gRPC call.
    Rpc,
}

impl Transport {
    /// Returns `"http"` or `"rpc"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Rpc => "rpc",
        }
    }
}

/// Snapshot of the inbound request carrier.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    transport: Transport,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
}

impl RequestInfo {
    /// Creates request info.
    #[must_use]
    pub fn new(
        transport: Transport,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            transport,
            method,
            uri,
            headers,
            remote_addr,
        }
    }

    /// Builds info from an `http::Request`.
    #[must_use]
    pub fn from_request<B>(
        transport: Transport,
        request: &http::Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self::new(
            transport,
            request.method().clone(),
            request.uri().clone(),
            request.headers().clone(),
            remote_addr,
        )
    }

    /// Returns the transport.
    #[must_use]
    pub const fn transport(&self) -> Transport {
        self.transport
    }

    /// Returns the request method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URI.
    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the peer address of the connection.
    #[must_use]
    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Returns the `User-Agent` header, or an empty string.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        self.headers
            .get(http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    /// Returns the client IP.
    ///
    /// Uses the first `X-Forwarded-For` entry, then `X-Real-Ip`, then the
    /// socket peer address.
    #[must_use]
    pub fn client_ip(&self) -> String {
        let forwarded = self
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        let real_ip = || {
            self.headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        forwarded
            .or_else(real_ip)
            .map(ToString::to_string)
            .or_else(|| self.remote_addr.map(|addr| addr.ip().to_string()))
            .unwrap_or_default()
    }
}

/// The route a request resolved to.
#[derive(Clone)]
pub struct RouteInfo {
    pattern: String,
    method: Method,
    descriptor: Option<MethodDescriptor>,
    validator: Option<Arc<dyn RequestValidator>>,
}

impl RouteInfo {
    /// Creates route info for a plain controller route.
    #[must_use]
    pub fn new(pattern: impl Into<String>, method: Method) -> Self {
        Self {
            pattern: pattern.into(),
            method,
            descriptor: None,
            validator: None,
        }
    }

    /// Attaches the service method this route adapts.
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: MethodDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    /// Attaches a request validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn RequestValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Returns the route pattern (or RPC path).
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the verb the route is bound to.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the adapted service method, if any.
    #[must_use]
    pub const fn descriptor(&self) -> Option<&MethodDescriptor> {
        self.descriptor.as_ref()
    }

    /// Returns the request validator, if any.
    #[must_use]
    pub fn validator(&self) -> Option<&dyn RequestValidator> {
        self.validator.as_deref()
    }
}

impl fmt::Debug for RouteInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteInfo")
            .field("pattern", &self.pattern)
            .field("method", &self.method)
            .field("descriptor", &self.descriptor)
            .field("validated", &self.validator.is_some())
            .finish()
    }
}

/// Shared cancellation flag for one request.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    inner: Arc<CancellationState>,
}

#[derive(Debug, Default)]
struct CancellationState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl Cancellation {
    /// Creates an un-cancelled flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the request cancelled and wakes waiters.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Returns `true` once cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Waits until the request is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Returns a guard that cancels when dropped, unless disarmed.
    #[must_use]
    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            cancellation: Some(self.clone()),
        }
    }
}

/// Cancels a request when dropped.
///
/// The connection task holds one of these while it waits for the response.
/// If the connection goes away the guard is dropped early.
#[derive(Debug)]
pub struct CancelOnDrop {
    cancellation: Option<Cancellation>,
}

impl CancelOnDrop {
    /// Prevents cancellation on drop.
    pub fn disarm(mut self) {
        self.cancellation = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(cancellation) = self.cancellation.take() {
            cancellation.cancel();
        }
    }
}

/// Typed extension storage.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous one of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast().ok().map(|b| *b))
    }

    /// Returns a reference to the value of type `T`.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Returns a mutable reference to the value of type `T`.
    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    /// Removes and returns the value of type `T`.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok().map(|b| *b))
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}

/// Per-request context that flows through the middleware chain.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use janus_core::{JanusError, MemorySink, NoopTracer, RequestContext};
///
/// let sink = Arc::new(MemorySink::new());
/// let mut ctx = RequestContext::builder()
///     .log_sink(sink.clone())
///     .tracer(Arc::new(NoopTracer))
///     .build();
///
/// ctx.record_error(&JanusError::validation("missing name"));
/// assert!(ctx.has_errors());
/// ctx.finalize();
/// ```
pub struct RequestContext {
    request_id: RequestId,
    info: RequestInfo,
    route: Option<RouteInfo>,
    params: Params,
    logger: RequestLogger,
    tracer: Arc<dyn Tracer>,
    remote_parent: Option<SpanContext>,
    span: Option<Box<dyn Span>>,
    errors: ErrorList,
    extensions: Extensions,
    cancellation: Cancellation,
    started_at: Instant,
    finalized: bool,
}

impl RequestContext {
    /// Starts building a context.
    #[must_use]
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::default()
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the request carrier snapshot.
    #[must_use]
    pub const fn info(&self) -> &RequestInfo {
        &self.info
    }

    /// Returns the transport.
    #[must_use]
    pub const fn transport(&self) -> Transport {
        self.info.transport
    }

    /// Returns the resolved route, if any.
    #[must_use]
    pub const fn route(&self) -> Option<&RouteInfo> {
        self.route.as_ref()
    }

    /// Sets the resolved route.
    pub fn set_route(&mut self, route: RouteInfo) {
        self.route = Some(route);
    }

    /// Returns the extracted path parameters.
    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Sets the path parameters.
    pub fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    /// Returns the request logger.
    #[must_use]
    pub const fn logger(&self) -> &RequestLogger {
        &self.logger
    }

    /// Returns the injected tracer.
    #[must_use]
    pub fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.tracer
    }

    /// Records an error against this request.
    pub fn record_error(&mut self, error: &JanusError) {
        if let Some(span) = self.span.as_deref_mut() {
            span.record_error(&error.to_string());
        }
        self.errors.push(error.to_record());
    }

    /// Returns the recorded errors.
    #[must_use]
    pub const fn errors(&self) -> &ErrorList {
        &self.errors
    }

    /// Returns `true` if any error was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Sets the span context propagated by the caller.
    pub fn set_remote_parent(&mut self, parent: SpanContext) {
        self.remote_parent = Some(parent);
    }

    /// Starts the request span as a child of the remote parent, if any.
    ///
    /// A span started earlier is finished first.
    pub fn start_span(&mut self, name: &str) -> SpanContext {
        if let Some(mut previous) = self.span.take() {
            previous.finish();
        }
        let span = self.tracer.start_span(name, self.remote_parent.as_ref());
        let context = span.context();
        self.span = Some(span);
        context
    }

    /// Returns the active span, if any.
    pub fn span_mut(&mut self) -> Option<&mut (dyn Span + 'static)> {
        self.span.as_deref_mut()
    }

    /// Returns the identity of the active span, or of the remote parent.
    #[must_use]
    pub fn span_context(&self) -> Option<SpanContext> {
        self.span
            .as_ref()
            .map(|s| s.context())
            .or_else(|| self.remote_parent.clone())
    }

    /// Inserts a typed extension.
    pub fn insert_extension<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.extensions.insert(value)
    }

    /// Returns a typed extension.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get()
    }

    /// Returns a typed extension mutably.
    pub fn get_extension_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.extensions.get_mut()
    }

    /// Removes a typed extension.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions.remove()
    }

    /// Returns the cancellation flag.
    #[must_use]
    pub const fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    /// Returns `true` if the connection went away.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns the time elapsed since the request was admitted.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns the handler view of this context.
    #[must_use]
    pub fn call_context(&self) -> CallContext {
        CallContext::new(
            self.request_id,
            self.info.clone(),
            self.params.clone(),
            self.logger.clone(),
            Arc::clone(&self.tracer),
            self.span_context(),
            self.cancellation.clone(),
        )
    }

    /// Flushes pending log fields and finishes the span.
    ///
    /// Safe to call more than once; only the first call has an effect.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        if let Some(mut span) = self.span.take() {
            span.finish();
        }
        self.logger.flush();
    }

    /// Returns `true` once [`finalize`](Self::finalize) ran.
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("transport", &self.info.transport)
            .field("method", &self.info.method)
            .field("uri", &self.info.uri)
            .field("route", &self.route)
            .field("errors", &self.errors)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Builder for [`RequestContext`].
///
/// Every slot has a default, so tests can build a context with
/// `RequestContext::builder().build()`.
#[derive(Default)]
pub struct RequestContextBuilder {
    request_id: Option<RequestId>,
    info: Option<RequestInfo>,
    sink: Option<Arc<dyn crate::logger::LogSink>>,
    tracer: Option<Arc<dyn Tracer>>,
    cancellation: Option<Cancellation>,
}

impl RequestContextBuilder {
    /// Sets the request ID.
    #[must_use]
    pub fn request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Sets the request carrier snapshot.
    #[must_use]
    pub fn info(mut self, info: RequestInfo) -> Self {
        self.info = Some(info);
        self
    }

    /// Sets the log sink for the request logger.
    #[must_use]
    pub fn log_sink(mut self, sink: Arc<dyn crate::logger::LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets the tracer.
    #[must_use]
    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Shares an existing cancellation flag.
    #[must_use]
    pub fn cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    /// Builds the context.
    #[must_use]
    pub fn build(self) -> RequestContext {
        let request_id = self.request_id.unwrap_or_default();
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(crate::logger::TracingSink));
        RequestContext {
            request_id,
            info: self.info.unwrap_or_else(|| {
                RequestInfo::new(
                    Transport::Http,
                    Method::GET,
                    Uri::from_static("/"),
                    HeaderMap::new(),
                    None,
                )
            }),
            route: None,
            params: Params::new(),
            logger: RequestLogger::new(request_id, sink),
            tracer: self
                .tracer
                .unwrap_or_else(|| Arc::new(crate::trace::NoopTracer)),
            remote_parent: None,
            span: None,
            errors: ErrorList::new(),
            extensions: Extensions::new(),
            cancellation: self.cancellation.unwrap_or_default(),
            started_at: Instant::now(),
            finalized: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::MemorySink;
    use crate::trace::RecordingTracer;

    #[test]
    fn test_request_id_new_generates_unique_ids() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_request_id_serialization() {
        let id = RequestId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_client_ip_precedence() {
        let mut headers = HeaderMap::new();
        let remote: SocketAddr = "192.168.1.9:4000".parse().unwrap();
        let info = RequestInfo::new(
            Transport::Http,
            Method::GET,
            Uri::from_static("/"),
            headers.clone(),
            Some(remote),
        );
        assert_eq!(info.client_ip(), "192.168.1.9");

        headers.insert("x-real-ip", "10.1.1.1".parse().unwrap());
        let info = RequestInfo::new(
            Transport::Http,
            Method::GET,
            Uri::from_static("/"),
            headers.clone(),
            Some(remote),
        );
        assert_eq!(info.client_ip(), "10.1.1.1");

        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.2".parse().unwrap());
        let info = RequestInfo::new(
            Transport::Http,
            Method::GET,
            Uri::from_static("/"),
            headers,
            Some(remote),
        );
        assert_eq!(info.client_ip(), "203.0.113.7");
    }

    #[test]
    fn test_extensions() {
        #[derive(Debug, PartialEq)]
        struct Tenant(&'static str);

        let mut ctx = RequestContext::builder().build();
        assert!(ctx.get_extension::<Tenant>().is_none());
        assert!(ctx.insert_extension(Tenant("acme")).is_none());
        assert_eq!(ctx.get_extension::<Tenant>(), Some(&Tenant("acme")));

        ctx.get_extension_mut::<Tenant>().unwrap().0 = "globex";
        assert_eq!(ctx.remove_extension::<Tenant>(), Some(Tenant("globex")));
        assert!(ctx.get_extension::<Tenant>().is_none());
    }

    #[test]
    fn test_finalize_flushes_once_and_finishes_span() {
        let sink = Arc::new(MemorySink::new());
        let tracer = RecordingTracer::new();
        let mut ctx = RequestContext::builder()
            .log_sink(sink.clone())
            .tracer(Arc::new(tracer.clone()))
            .build();

        ctx.start_span("GET /hello");
        ctx.logger().with_field("k", "v");
        ctx.record_error(&JanusError::internal("boom"));

        ctx.finalize();
        ctx.finalize();
        drop(ctx);

        assert_eq!(sink.records().len(), 1);
        let spans = tracer.finished();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].error.as_deref().unwrap().contains("boom"));
    }

    #[test]
    fn test_drop_finalizes() {
        let sink = Arc::new(MemorySink::new());
        {
            let ctx = RequestContext::builder().log_sink(sink.clone()).build();
            ctx.logger().with_field("pending", true);
        }
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn test_span_uses_remote_parent() {
        let tracer = RecordingTracer::new();
        let mut ctx = RequestContext::builder()
            .tracer(Arc::new(tracer.clone()))
            .build();
        let parent = SpanContext::new("4bf92f3577b34da6a3ce929d0e0e4736", "00f067aa0ba902b7", true);
        ctx.set_remote_parent(parent.clone());

        let span = ctx.start_span("op");
        assert_eq!(span.trace_id, parent.trace_id);
        assert_eq!(ctx.span_context(), Some(span));
    }

    #[test]
    fn test_cancel_on_drop_guard() {
        let cancellation = Cancellation::new();
        let guard = cancellation.drop_guard();
        guard.disarm();
        assert!(!cancellation.is_cancelled());

        let guard = cancellation.drop_guard();
        drop(guard);
        assert!(cancellation.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiters() {
        let cancellation = Cancellation::new();
        let waiter = {
            let c = cancellation.clone();
            tokio::spawn(async move { c.cancelled().await })
        };
        tokio::task::yield_now().await;
        cancellation.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
