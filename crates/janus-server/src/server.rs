//! Server assembly and the listener lifecycle.
//!
//! [`Server`] collects registrations: global middleware, route groups and
//! the native RPC server. [`Server::bind`] freezes them into a
//! [`Dispatcher`] and opens the listeners; [`BoundServer::serve`] then
//! accepts connections on both until shutdown is signalled.
//!
//! # Shutdown
//!
//! When the signal fires the server:
//!
//! 1. Stops accepting (the listeners are closed, new connections are refused)
//! 2. Asks every open connection to finish its in-flight requests
//! 3. Waits up to the shutdown timeout for them to drain, then aborts the rest
//! 4. Removes its naming registration, exactly once

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use janus_core::{
    Cancellation, JanusError, LogSink, NamingRegistry, NoopTracer, RequestId, Tracer, TracingSink,
    Transport,
};
use janus_middleware::stages::{
    RecoveryMiddleware, RequestLogMiddleware, TracingMiddleware, ValidationMiddleware,
};
use janus_middleware::{Chain, Middleware, Request, Response, ResponseExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::grpc::{decode_frame, into_grpc_response};
use crate::group::RouterGroup;
use crate::naming::Registration;
use crate::rpc::RpcServer;
use crate::shutdown::{InFlightTracker, ShutdownSignal};

/// Builder for a dual-protocol server.
///
/// # Example
///
/// ```rust,no_run
/// use janus_server::{Server, ServerConfig};
///
/// # async fn run() -> Result<(), janus_server::ServerError> {
/// let mut server = Server::new(ServerConfig::default());
/// server.use_default_stages();
/// server.run("0.0.0.0:8080", Some("0.0.0.0:9090")).await
/// # }
/// ```
pub struct Server {
    config: ServerConfig,
    tracer: Arc<dyn Tracer>,
    log_sink: Arc<dyn LogSink>,
    registry: Option<Arc<dyn NamingRegistry>>,
    global: Chain,
    groups: Vec<RouterGroup>,
    rpc: RpcServer,
}

impl Server {
    /// Creates a server with no routes and no middleware.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            tracer: Arc::new(NoopTracer),
            log_sink: Arc::new(TracingSink),
            registry: None,
            global: Chain::new(),
            groups: Vec::new(),
            rpc: RpcServer::new(),
        }
    }

    /// Sets the tracer handed to every request context.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Sets where request logs are flushed.
    #[must_use]
    pub fn with_log_sink(mut self, log_sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = log_sink;
        self
    }

    /// Advertises the server in `registry` while it is serving.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn NamingRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the services served on the RPC listener.
    #[must_use]
    pub fn with_rpc_server(mut self, rpc: RpcServer) -> Self {
        self.rpc = rpc;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Adds global middleware, run for every request on both transports.
    pub fn use_middleware<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.global.push(Arc::new(middleware));
        self
    }

    /// Adds the standard stages: request logging, tracing, panic recovery
    /// and validation, in that order.
    pub fn use_default_stages(&mut self) -> &mut Self {
        self.use_middleware(RequestLogMiddleware::new())
            .use_middleware(TracingMiddleware::new())
            .use_middleware(RecoveryMiddleware::new())
            .use_middleware(ValidationMiddleware::new())
    }

    /// Opens a route group under `prefix`.
    pub fn group(&mut self, prefix: &str) -> &mut RouterGroup {
        let index = self.groups.len();
        self.groups.push(RouterGroup::new(prefix));
        &mut self.groups[index]
    }

    /// Freezes the registrations into a dispatcher.
    ///
    /// # Errors
    ///
    /// Returns an error if two registrations claim the same route.
    pub fn build_dispatcher(&self) -> Result<Dispatcher, ServerError> {
        let timeout = self.config.request_timeout();
        let mut dispatcher =
            Dispatcher::new(self.global.clone(), Arc::clone(&self.tracer), Arc::clone(&self.log_sink));
        for group in &self.groups {
            group.mount(&mut dispatcher, timeout)?;
        }
        self.rpc.mount(&mut dispatcher, timeout)?;
        Ok(dispatcher)
    }

    /// Freezes the registrations and binds the listeners.
    ///
    /// Routes are checked before any socket is opened.
    ///
    /// # Errors
    ///
    /// Returns an error for duplicate routes, unparsable addresses or
    /// listeners that cannot be bound.
    pub async fn bind(self, http_addr: &str, rpc_addr: Option<&str>) -> Result<BoundServer, ServerError> {
        let http_addr = parse_addr(http_addr)?;
        let rpc_addr = rpc_addr.map(parse_addr).transpose()?;

        let dispatcher = self.build_dispatcher()?;
        for (method, path) in dispatcher.http_routes() {
            tracing::debug!(%method, path = %path, "http route");
        }
        for path in dispatcher.rpc_methods() {
            tracing::debug!(path, "rpc method");
        }

        let http = bind_listener(http_addr).await?;
        let rpc = match rpc_addr {
            Some(addr) => Some(bind_listener(addr).await?),
            None => None,
        };

        let bound = BoundServer {
            http_addr: http.local_addr()?,
            rpc_addr: rpc.as_ref().map(TcpListener::local_addr).transpose()?,
            http,
            rpc,
            dispatcher: Arc::new(dispatcher),
            config: self.config,
            registry: self.registry,
        };
        tracing::info!(
            http = %bound.http_addr,
            rpc = ?bound.rpc_addr,
            "listeners bound"
        );
        Ok(bound)
    }

    /// Binds and serves until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails.
    pub async fn run(self, http_addr: &str, rpc_addr: Option<&str>) -> Result<(), ServerError> {
        let bound = self.bind(http_addr, rpc_addr).await?;
        bound.serve(ShutdownSignal::with_os_signals()).await
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("global", &self.global)
            .field("groups", &self.groups)
            .field("rpc", &self.rpc)
            .finish_non_exhaustive()
    }
}

/// A server with frozen routes and open listeners.
pub struct BoundServer {
    http: TcpListener,
    rpc: Option<TcpListener>,
    http_addr: SocketAddr,
    rpc_addr: Option<SocketAddr>,
    dispatcher: Arc<Dispatcher>,
    config: ServerConfig,
    registry: Option<Arc<dyn NamingRegistry>>,
}

impl BoundServer {
    /// Returns the bound HTTP address.
    #[must_use]
    pub const fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Returns the bound RPC address, if an RPC listener was requested.
    #[must_use]
    pub const fn rpc_addr(&self) -> Option<SocketAddr> {
        self.rpc_addr
    }

    /// Returns the dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Serves both listeners until `shutdown` fires, then drains.
    ///
    /// # Errors
    ///
    /// Currently infallible once bound; the `Result` leaves room for
    /// fatal listener errors.
    pub async fn serve(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let Self {
            http,
            rpc,
            http_addr,
            rpc_addr,
            dispatcher,
            config,
            registry,
        } = self;

        let registration = match registry {
            Some(registry) => {
                let address = config
                    .advertise_addr()
                    .map_or_else(|| rpc_addr.unwrap_or(http_addr).to_string(), str::to_string);
                Some(
                    Registration::start(
                        registry,
                        config.service_name(),
                        &address,
                        config.registry_ttl(),
                        config.registry_timeout(),
                    )
                    .await,
                )
            }
            None => None,
        };

        let tracker = InFlightTracker::new();
        let mut connections = JoinSet::new();
        let stop = shutdown.recv();
        tokio::pin!(stop);

        loop {
            tokio::select! {
                biased;

                () = &mut stop => {
                    tracing::info!("shutdown signal received, no longer accepting connections");
                    break;
                }

                accepted = http.accept() => match accepted {
                    Ok((stream, remote)) => {
                        connections.spawn(serve_http(
                            stream,
                            remote,
                            Arc::clone(&dispatcher),
                            tracker.clone(),
                            shutdown.clone(),
                            config.request_timeout(),
                        ));
                    }
                    Err(error) => tracing::warn!(%error, "failed to accept HTTP connection"),
                },

                accepted = accept_optional(rpc.as_ref()) => match accepted {
                    Ok((stream, remote)) => {
                        connections.spawn(serve_rpc(
                            stream,
                            remote,
                            Arc::clone(&dispatcher),
                            tracker.clone(),
                            shutdown.clone(),
                            config.request_timeout(),
                        ));
                    }
                    Err(error) => tracing::warn!(%error, "failed to accept RPC connection"),
                },

                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(http);
        drop(rpc);

        let drained = tokio::time::timeout(config.shutdown_timeout(), async {
            while connections.join_next().await.is_some() {}
            tracker.wait_idle().await;
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                remaining = tracker.active(),
                timeout = ?config.shutdown_timeout(),
                "shutdown timeout elapsed, aborting remaining connections"
            );
            connections.shutdown().await;
        }

        if let Some(registration) = registration {
            registration.stop().await;
        }

        tracing::info!("server stopped");
        Ok(())
    }
}

impl std::fmt::Debug for BoundServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundServer")
            .field("http_addr", &self.http_addr)
            .field("rpc_addr", &self.rpc_addr)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

fn parse_addr(addr: &str) -> Result<SocketAddr, ServerError> {
    addr.parse().map_err(|e: std::net::AddrParseError| ServerError::InvalidAddress {
        addr: addr.to_string(),
        reason: e.to_string(),
    })
}

async fn bind_listener(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

async fn accept_optional(listener: Option<&TcpListener>) -> io::Result<(TcpStream, SocketAddr)> {
    match listener {
        Some(listener) => listener.accept().await,
        None => std::future::pending().await,
    }
}

async fn serve_http(
    stream: TcpStream,
    remote: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    tracker: InFlightTracker,
    shutdown: ShutdownSignal,
    timeout: Duration,
) {
    let service = service_fn(move |request: hyper::Request<Incoming>| {
        let dispatcher = Arc::clone(&dispatcher);
        let tracker = tracker.clone();
        async move {
            let response = spawn_request(&tracker, move |cancellation| async move {
                match read_body(request, timeout).await {
                    Ok(request) => {
                        dispatcher
                            .dispatch_http(request, Some(remote), cancellation)
                            .await
                    }
                    Err(BodyFailure::Lost(request, error)) => {
                        dispatcher.abandon(
                            Transport::Http,
                            &request,
                            Some(remote),
                            cancellation,
                            &JanusError::transport(error.to_string()),
                        );
                        // Never written: the connection is gone.
                        Response::default()
                    }
                    Err(BodyFailure::TimedOut) => body_timeout(),
                }
            })
            .await;
            Ok::<_, Infallible>(response.map(Full::new))
        }
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        () = shutdown.recv() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(error) = result {
        tracing::debug!(%remote, %error, "http connection closed with error");
    }
}

async fn serve_rpc(
    stream: TcpStream,
    remote: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    tracker: InFlightTracker,
    shutdown: ShutdownSignal,
    timeout: Duration,
) {
    let service = service_fn(move |request: hyper::Request<Incoming>| {
        let dispatcher = Arc::clone(&dispatcher);
        let tracker = tracker.clone();
        async move {
            let response = spawn_request(&tracker, move |cancellation| async move {
                let request = match read_body(request, timeout).await {
                    Ok(request) => request,
                    Err(BodyFailure::Lost(request, error)) => {
                        dispatcher.abandon(
                            Transport::Rpc,
                            &request,
                            Some(remote),
                            cancellation,
                            &JanusError::transport(error.to_string()),
                        );
                        return Response::default();
                    }
                    Err(BodyFailure::TimedOut) => return body_timeout(),
                };
                let (parts, body) = request.into_parts();
                match decode_frame(&body) {
                    Ok(message) => {
                        dispatcher
                            .dispatch_rpc(Request::from_parts(parts, message), Some(remote), cancellation)
                            .await
                    }
                    Err(status) => status.into_response(),
                }
            })
            .await;
            Ok::<_, Infallible>(into_grpc_response(response))
        }
    });

    let builder = hyper::server::conn::http2::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        () = shutdown.recv() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(error) = result {
        tracing::debug!(%remote, %error, "rpc connection closed with error");
    }
}

/// Runs one request on its own task.
///
/// The request is cancelled if the connection drops this future before
/// the task finishes, so the handler can stop early and the failure is
/// still recorded and logged.
async fn spawn_request<F, Fut>(tracker: &InFlightTracker, work: F) -> Response
where
    F: FnOnce(Cancellation) -> Fut,
    Fut: Future<Output = Response> + Send + 'static,
{
    let guard = tracker.acquire();
    let cancellation = Cancellation::new();
    let on_drop = cancellation.drop_guard();
    let work = work(cancellation);

    let outcome = tokio::spawn(async move {
        let _guard = guard;
        work.await
    })
    .await;
    on_drop.disarm();

    outcome.unwrap_or_else(|error| {
        tracing::error!(%error, "request task failed");
        Response::from_error(&JanusError::internal("request task failed"), RequestId::new())
    })
}

/// Why a request body could not be collected.
enum BodyFailure {
    /// The connection failed mid-body. Keeps the request head for logging.
    Lost(http::Request<()>, hyper::Error),
    /// The body did not arrive within the request timeout.
    TimedOut,
}

/// Collects the request body within `timeout`.
async fn read_body(request: hyper::Request<Incoming>, timeout: Duration) -> Result<Request, BodyFailure> {
    let (parts, body) = request.into_parts();
    match tokio::time::timeout(timeout, body.collect()).await {
        Ok(Ok(collected)) => Ok(Request::from_parts(parts, collected.to_bytes())),
        Ok(Err(error)) => Err(BodyFailure::Lost(http::Request::from_parts(parts, ()), error)),
        Err(_) => Err(BodyFailure::TimedOut),
    }
}

fn body_timeout() -> Response {
    Response::json_error(
        StatusCode::REQUEST_TIMEOUT,
        "REQUEST_TIMEOUT",
        "request body not received in time",
    )
}
