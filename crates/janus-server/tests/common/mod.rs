//! Shared fixtures: a `Hello` service, the `/hi/hi` controller and small
//! HTTP/1 and gRPC clients.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::{TokioExecutor, TokioIo};
use janus_core::{BoxFuture, CallContext, Empty, JanusError, JanusResult, LogSink, Validate};
use janus_middleware::{Request, Response, ResponseExt};
use janus_server::grpc::{decode_frame, encode_frame, GRPC_MESSAGE, GRPC_STATUS};
use janus_server::{
    Controller, RpcServer, RpcService, Server, ServerConfig, ServiceDefinition, ServiceMethods,
    GRPC_CONTENT_TYPE,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;

#[derive(Debug, Deserialize)]
pub struct HelloRequest {
    #[serde(default)]
    pub greeting: String,
    #[serde(default)]
    pub delay_ms: u64,
}

impl Validate for HelloRequest {
    fn validate(&self) -> Result<(), JanusError> {
        if self.greeting.is_empty() {
            return Err(JanusError::validation_field("greeting", "is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct HelloReply {
    pub reply: String,
}

pub struct Hello;

impl Hello {
    async fn say_hello(self: Arc<Self>, ctx: CallContext, req: HelloRequest) -> JanusResult<HelloReply> {
        if req.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(req.delay_ms)).await;
        }
        if req.greeting == "taken" {
            return Err(JanusError::handler(StatusCode::CONFLICT, "greeting already taken"));
        }
        ctx.logger().with_field("greeting", &req.greeting);
        Ok(HelloReply {
            reply: format!("{} back", req.greeting),
        })
    }

    async fn say_hello_anonymous(
        self: Arc<Self>,
        _ctx: CallContext,
        _req: Empty,
    ) -> JanusResult<HelloReply> {
        Ok(HelloReply {
            reply: "hello, stranger".to_string(),
        })
    }
}

impl RpcService for Hello {
    const NAME: &'static str = "demo.Hello";

    fn bind(methods: &mut ServiceMethods<Self>) {
        methods
            .validated_method("SayHello", Hello::say_hello)
            .method("SayHelloAnonymous", Hello::say_hello_anonymous);
    }
}

pub struct TestController;

impl Controller for TestController {
    fn handle(&self, _ctx: CallContext, _request: Request) -> BoxFuture<'static, JanusResult<Response>> {
        Box::pin(async { Ok(Response::json(StatusCode::OK, &serde_json::json!({"reply": "ha"}))) })
    }
}

/// A server with the default stages, `/hi/hi` and `Hello` on both transports.
pub fn hello_server(config: ServerConfig, sink: Arc<dyn LogSink>) -> Server {
    let hello = ServiceDefinition::new(Hello);
    let mut server = Server::new(config)
        .with_log_sink(sink)
        .with_rpc_server(RpcServer::new().register(&hello));
    server.use_default_stages();
    server.group("/hi").controller("/hi", Method::POST, TestController);
    server.group("/").bind_service(&hello);
    server
}

pub fn http_request(method: Method, uri: &str, body: &str) -> Request {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::from(body.to_string()))
        .unwrap()
}

pub fn body_json(response: &Response) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

/// Sends one HTTP/1.1 request over a fresh connection.
pub async fn http_call(addr: SocketAddr, method: Method, path: &str, body: &str) -> (StatusCode, Value) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    tokio::spawn(conn);

    let request = http::Request::builder()
        .method(method)
        .uri(path)
        .header(http::header::HOST, addr.to_string())
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap();
    let response = sender.send_request(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Outcome of a gRPC call.
#[derive(Debug)]
pub struct RpcReply {
    pub code: i32,
    pub message: Option<String>,
    pub body: Option<Value>,
}

/// Sends one unary gRPC call with a JSON message over HTTP/2.
pub async fn rpc_call(addr: SocketAddr, path: &str, message: &Value) -> RpcReply {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut sender, conn) =
        hyper::client::conn::http2::handshake(TokioExecutor::new(), TokioIo::new(stream))
            .await
            .unwrap();
    tokio::spawn(conn);

    let payload = serde_json::to_vec(message).unwrap();
    let request = http::Request::builder()
        .method(Method::POST)
        .uri(format!("http://{addr}{path}"))
        .header(http::header::CONTENT_TYPE, GRPC_CONTENT_TYPE)
        .header("te", "trailers")
        .body(Full::new(encode_frame(&payload).unwrap()))
        .unwrap();
    let response = sender.send_request(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let collected = response.into_body().collect().await.unwrap();
    let trailers = collected.trailers().cloned().unwrap_or_default();
    let bytes = collected.to_bytes();

    let code = trailers
        .get(GRPC_STATUS)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap();
    let message = trailers
        .get(GRPC_MESSAGE)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    let body = if bytes.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&decode_frame(&bytes).unwrap()).unwrap())
    };
    RpcReply { code, message, body }
}
