//! Request dispatch for both transports.
//!
//! The dispatcher is built once, when the server freezes its
//! registrations, and is shared read-only by every connection. For each
//! request it:
//!
//! 1. Builds the [`RequestContext`] (request ID, transport, logger, tracer,
//!    cancellation)
//! 2. Resolves the route: the HTTP table by `(verb, path)`, or the RPC
//!    registry by `/{service}/{method}`
//! 3. Runs the route's chain (global, then group or interceptors) and its
//!    endpoint
//! 4. Records metrics and finalizes the context, flushing buffered logs
//!
//! Unknown targets still run the global chain, ending in a not-found
//! endpoint: 404 over HTTP, `UNIMPLEMENTED` over RPC.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use http::Method;
use janus_core::{
    BoxFuture, Cancellation, JanusError, LogSink, MethodDescriptor, RequestContext, RequestId,
    RequestInfo, RequestValidator, RouteInfo, Tracer, Transport,
};
use janus_middleware::stages::tracing::REQUEST_ID_HEADER;
use janus_middleware::{Chain, Endpoint, Request, Response};
use janus_router::{RouteError, RouteMatch, RouteTable};
use janus_telemetry::metrics::{record_request, UNMATCHED_ROUTE};
use uuid::Uuid;

use crate::error::ServerError;
use crate::handler::error_response;
use crate::service::MethodBinding;

/// A resolved route: its middleware and terminal endpoint.
#[derive(Clone)]
pub(crate) struct Route {
    chain: Chain,
    endpoint: Arc<dyn Endpoint>,
    descriptor: Option<MethodDescriptor>,
    validator: Option<Arc<dyn RequestValidator>>,
}

impl Route {
    pub(crate) fn new(chain: Chain, endpoint: Arc<dyn Endpoint>) -> Self {
        Self {
            chain,
            endpoint,
            descriptor: None,
            validator: None,
        }
    }

    fn for_method(mut self, binding: &MethodBinding) -> Self {
        self.descriptor = Some(binding.descriptor().clone());
        self.validator = binding.validator().cloned();
        self
    }

    fn info(&self, pattern: &str, method: Method) -> RouteInfo {
        let mut info = RouteInfo::new(pattern, method);
        if let Some(descriptor) = &self.descriptor {
            info = info.with_descriptor(descriptor.clone());
        }
        if let Some(validator) = &self.validator {
            info = info.with_validator(Arc::clone(validator));
        }
        info
    }
}

enum NotFound {
    Http,
    Rpc,
}

impl Endpoint for NotFound {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext, request: Request) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let error = match self {
                Self::Http => {
                    JanusError::route_not_found(request.method().as_str(), request.uri().path())
                }
                Self::Rpc => {
                    let path = request.uri().path().trim_start_matches('/');
                    let (service, method) = path.split_once('/').unwrap_or((path, ""));
                    JanusError::method_not_found(service, method)
                }
            };
            error_response(ctx, &error)
        })
    }
}

/// Frozen routing state shared by all connections.
pub struct Dispatcher {
    http: RouteTable<Route>,
    rpc: HashMap<String, Route>,
    global: Chain,
    tracer: Arc<dyn Tracer>,
    log_sink: Arc<dyn LogSink>,
}

impl Dispatcher {
    pub(crate) fn new(global: Chain, tracer: Arc<dyn Tracer>, log_sink: Arc<dyn LogSink>) -> Self {
        Self {
            http: RouteTable::new(),
            rpc: HashMap::new(),
            global,
            tracer,
            log_sink,
        }
    }

    pub(crate) const fn global(&self) -> &Chain {
        &self.global
    }

    pub(crate) fn add_http(&mut self, verb: Method, path: &str, route: Route) -> Result<(), RouteError> {
        self.http.register(verb, path, route)
    }

    pub(crate) fn add_http_method(
        &mut self,
        prefix: &str,
        binding: &MethodBinding,
        route: Route,
    ) -> Result<String, RouteError> {
        self.http
            .register_method(prefix, binding.descriptor(), route.for_method(binding))
    }

    pub(crate) fn add_rpc(&mut self, binding: &MethodBinding, route: Route) -> Result<(), ServerError> {
        let path = binding.descriptor().rpc_path();
        if self.rpc.contains_key(&path) {
            return Err(ServerError::DuplicateRpcMethod { path });
        }
        self.rpc.insert(path, route.for_method(binding));
        Ok(())
    }

    /// Lists the HTTP routes as `(verb, pattern)`, sorted by pattern.
    #[must_use]
    pub fn http_routes(&self) -> Vec<(Method, String)> {
        self.http.routes()
    }

    /// Lists the RPC method paths, sorted.
    #[must_use]
    pub fn rpc_methods(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.rpc.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    /// Dispatches a request received on the HTTP listener.
    pub async fn dispatch_http(
        &self,
        request: Request,
        remote_addr: Option<SocketAddr>,
        cancellation: Cancellation,
    ) -> Response {
        let mut ctx = self.context(Transport::Http, &request, remote_addr, cancellation);
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let (response, label) = match self.http.resolve(&method, &path) {
            Ok(RouteMatch {
                handler: route,
                pattern,
                params,
            }) => {
                ctx.set_route(route.info(pattern, method));
                ctx.set_params(params);
                let response = route.chain.run(&mut ctx, request, route.endpoint.as_ref()).await;
                (response, pattern)
            }
            Err(_) => {
                let response = self.global.run(&mut ctx, request, &NotFound::Http).await;
                (response, UNMATCHED_ROUTE)
            }
        };

        Self::finish(&mut ctx, label, &response);
        response
    }

    /// Dispatches a call received on the RPC listener.
    ///
    /// `request` carries the decoded message as its body.
    pub async fn dispatch_rpc(
        &self,
        request: Request,
        remote_addr: Option<SocketAddr>,
        cancellation: Cancellation,
    ) -> Response {
        let mut ctx = self.context(Transport::Rpc, &request, remote_addr, cancellation);
        let path = request.uri().path().to_string();

        let (response, label) = match self.rpc.get_key_value(&path) {
            Some((pattern, route)) => {
                ctx.set_route(route.info(pattern, Method::POST));
                let response = route.chain.run(&mut ctx, request, route.endpoint.as_ref()).await;
                (response, pattern.as_str())
            }
            None => {
                let response = self.global.run(&mut ctx, request, &NotFound::Rpc).await;
                (response, UNMATCHED_ROUTE)
            }
        };

        Self::finish(&mut ctx, label, &response);
        response
    }

    /// Records a request whose connection failed before it could be
    /// dispatched, such as a socket closed while the body was in flight.
    ///
    /// The context is cancelled, `error` is recorded and exactly one log
    /// record is written. There is no response to send.
    pub fn abandon<B>(
        &self,
        transport: Transport,
        request: &http::Request<B>,
        remote_addr: Option<SocketAddr>,
        cancellation: Cancellation,
        error: &JanusError,
    ) {
        let mut ctx = self.context(transport, request, remote_addr, cancellation);
        ctx.cancellation().cancel();
        ctx.record_error(error);

        let info = ctx.info();
        let logger = ctx.logger();
        logger
            .with_field("ClientIP", info.client_ip())
            .with_field("RequestMethod", info.method().as_str())
            .with_field("UserAgent", info.user_agent())
            .with_field("Uri", info.uri().to_string())
            .with_field("Transport", transport.as_str())
            .with_field("Errors", ctx.errors().to_json())
            .with_field("Cancelled", true);
        logger.warn(error);
        ctx.finalize();
    }

    fn context<B>(
        &self,
        transport: Transport,
        request: &http::Request<B>,
        remote_addr: Option<SocketAddr>,
        cancellation: Cancellation,
    ) -> RequestContext {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .map_or_else(RequestId::new, RequestId::from_uuid);

        RequestContext::builder()
            .request_id(request_id)
            .info(RequestInfo::from_request(transport, request, remote_addr))
            .log_sink(Arc::clone(&self.log_sink))
            .tracer(Arc::clone(&self.tracer))
            .cancellation(cancellation)
            .build()
    }

    fn finish(ctx: &mut RequestContext, route: &str, response: &Response) {
        record_request(
            ctx.transport().as_str(),
            route,
            response.status().as_u16(),
            ctx.elapsed(),
        );
        ctx.finalize();
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("http_routes", &self.http.len())
            .field("rpc_methods", &self.rpc.len())
            .field("global", &self.global)
            .finish_non_exhaustive()
    }
}
