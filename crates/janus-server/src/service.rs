//! RPC services and their method adapters.
//!
//! A service implements [`RpcService`]: a name plus a `bind` function that
//! lists its methods on a [`ServiceMethods`]. The result is a
//! [`ServiceDefinition`], which can be mounted on an HTTP group, on the
//! native RPC server, or both. Each method is classified once, when it is
//! listed, and the tag decides how its adapter reads requests.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use janus_core::{CallContext, Empty, JanusError, MethodKind};
//! use janus_server::{RpcService, ServiceDefinition, ServiceMethods};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct HelloRequest { greeting: String }
//!
//! #[derive(Serialize)]
//! struct HelloReply { reply: String }
//!
//! struct Hello;
//!
//! impl Hello {
//!     async fn say_hello(self: Arc<Self>, _ctx: CallContext, req: HelloRequest) -> Result<HelloReply, JanusError> {
//!         Ok(HelloReply { reply: req.greeting })
//!     }
//!
//!     async fn anonymous(self: Arc<Self>, _ctx: CallContext, _req: Empty) -> Result<HelloReply, JanusError> {
//!         Ok(HelloReply { reply: "hi".into() })
//!     }
//! }
//!
//! impl RpcService for Hello {
//!     const NAME: &'static str = "Hello";
//!
//!     fn bind(methods: &mut ServiceMethods<Self>) {
//!         methods
//!             .method("SayHello", Hello::say_hello)
//!             .method("SayHelloAnonymous", Hello::anonymous);
//!     }
//! }
//!
//! let definition = ServiceDefinition::new(Hello);
//! assert_eq!(definition.method("SayHello").unwrap().descriptor().kind(), MethodKind::Command);
//! assert_eq!(definition.method("SayHelloAnonymous").unwrap().descriptor().kind(), MethodKind::Query);
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::HeaderValue;
use janus_core::service::{decode_message, encode_message};
use janus_core::{
    BoxFuture, CallContext, JanusResult, JsonValidator, MethodDescriptor, MethodKind,
    RequestContext, RequestValidator, Validate,
};
use janus_middleware::{Endpoint, Request, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::handler::{bounded, error_response};

type MethodFn = Arc<dyn Fn(CallContext, Bytes) -> BoxFuture<'static, JanusResult<Bytes>> + Send + Sync>;

/// A service whose methods can be served over HTTP and RPC.
pub trait RpcService: Send + Sync + Sized + 'static {
    /// Service name, optionally package-qualified (`demo.v1.Hello`).
    const NAME: &'static str;

    /// Lists the service's methods.
    fn bind(methods: &mut ServiceMethods<Self>);
}

/// Collects the methods of service `S` during [`RpcService::bind`].
pub struct ServiceMethods<S> {
    service: Arc<S>,
    name: Arc<str>,
    bindings: Vec<MethodBinding>,
}

impl<S: Send + Sync + 'static> ServiceMethods<S> {
    /// Adds a method.
    ///
    /// `Req = Empty` makes it a query (GET, body ignored); anything else a
    /// command (POST, JSON body).
    pub fn method<Req, Res, F, Fut>(&mut self, name: &str, handler: F) -> &mut Self
    where
        Req: DeserializeOwned + Send + 'static,
        Res: Serialize + Send + 'static,
        F: Fn(Arc<S>, CallContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JanusResult<Res>> + Send + 'static,
    {
        self.push(name, handler, None)
    }

    /// Adds a method whose request is checked with [`Validate`] by the
    /// validation middleware before the handler runs.
    pub fn validated_method<Req, Res, F, Fut>(&mut self, name: &str, handler: F) -> &mut Self
    where
        Req: DeserializeOwned + Validate + Send + 'static,
        Res: Serialize + Send + 'static,
        F: Fn(Arc<S>, CallContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JanusResult<Res>> + Send + 'static,
    {
        self.push(name, handler, Some(Arc::new(JsonValidator::<Req>::new())))
    }

    fn push<Req, Res, F, Fut>(
        &mut self,
        name: &str,
        handler: F,
        validator: Option<Arc<dyn RequestValidator>>,
    ) -> &mut Self
    where
        Req: DeserializeOwned + Send + 'static,
        Res: Serialize + Send + 'static,
        F: Fn(Arc<S>, CallContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JanusResult<Res>> + Send + 'static,
    {
        let descriptor = MethodDescriptor::new::<Req, Res>(Arc::clone(&self.name), name);
        let kind = descriptor.kind();
        let service = Arc::clone(&self.service);
        let handler = Arc::new(handler);

        let call: MethodFn = Arc::new(move |ctx: CallContext, body: Bytes| {
            let service = Arc::clone(&service);
            let handler = Arc::clone(&handler);
            let fut: BoxFuture<'static, JanusResult<Bytes>> = Box::pin(async move {
                let request: Req = match kind {
                    MethodKind::Query => decode_message(&[])?,
                    MethodKind::Command => decode_message(&body)?,
                };
                let reply = handler(service, ctx, request).await?;
                encode_message(&reply).map(Bytes::from)
            });
            fut
        });

        self.bindings.push(MethodBinding {
            descriptor,
            validator,
            call,
        });
        self
    }
}

/// One registered method: its descriptor, optional validator and handler.
#[derive(Clone)]
pub struct MethodBinding {
    descriptor: MethodDescriptor,
    validator: Option<Arc<dyn RequestValidator>>,
    call: MethodFn,
}

impl MethodBinding {
    /// Returns the method descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// Returns the request validator, if the method was registered validated.
    #[must_use]
    pub fn validator(&self) -> Option<&Arc<dyn RequestValidator>> {
        self.validator.as_ref()
    }

    /// Decodes `body`, calls the handler and encodes the reply.
    ///
    /// # Errors
    ///
    /// A validation error when the body does not decode, or the handler's error.
    pub async fn invoke(&self, ctx: CallContext, body: Bytes) -> JanusResult<Bytes> {
        (self.call)(ctx, body).await
    }
}

impl fmt::Debug for MethodBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodBinding")
            .field("descriptor", &self.descriptor)
            .field("validated", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}

/// The methods of one service, ready to be mounted.
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    name: Arc<str>,
    methods: Vec<MethodBinding>,
}

impl ServiceDefinition {
    /// Builds the definition of `service`.
    #[must_use]
    pub fn new<S: RpcService>(service: S) -> Self {
        Self::from_arc(Arc::new(service))
    }

    /// Builds the definition of a shared service instance.
    #[must_use]
    pub fn from_arc<S: RpcService>(service: Arc<S>) -> Self {
        let mut methods = ServiceMethods {
            service,
            name: Arc::from(S::NAME),
            bindings: Vec::new(),
        };
        S::bind(&mut methods);
        Self {
            name: methods.name,
            methods: methods.bindings,
        }
    }

    /// Returns the service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the methods in registration order.
    #[must_use]
    pub fn methods(&self) -> &[MethodBinding] {
        &self.methods
    }

    /// Looks a method up by name.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodBinding> {
        self.methods.iter().find(|m| m.descriptor.method() == name)
    }
}

/// Terminal endpoint adapting a service method to the request pipeline.
pub(crate) struct MethodEndpoint {
    binding: MethodBinding,
    timeout: Duration,
}

impl MethodEndpoint {
    pub(crate) fn new(binding: MethodBinding, timeout: Duration) -> Self {
        Self { binding, timeout }
    }
}

impl Endpoint for MethodEndpoint {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext, request: Request) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let call = ctx.call_context();
            let cancellation = ctx.cancellation().clone();
            let work = self.binding.invoke(call, request.into_body());
            match bounded(cancellation, self.timeout, work).await {
                Ok(body) => {
                    let mut response = Response::new(body);
                    response
                        .headers_mut()
                        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                    response
                }
                Err(error) => error_response(ctx, &error),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use janus_core::{Empty, ErrorKind, JanusError};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Greeting {
        #[serde(default)]
        name: String,
    }

    impl Validate for Greeting {
        fn validate(&self) -> Result<(), JanusError> {
            if self.name.is_empty() {
                return Err(JanusError::validation_field("name", "is required"));
            }
            Ok(())
        }
    }

    #[derive(Serialize)]
    struct Reply {
        reply: String,
    }

    struct Greeter {
        prefix: &'static str,
    }

    impl Greeter {
        async fn greet(self: Arc<Self>, _ctx: CallContext, req: Greeting) -> JanusResult<Reply> {
            Ok(Reply {
                reply: format!("{}{}", self.prefix, req.name),
            })
        }

        async fn ping(self: Arc<Self>, _ctx: CallContext, _req: Empty) -> JanusResult<Reply> {
            Ok(Reply {
                reply: "pong".to_string(),
            })
        }

        async fn fail(self: Arc<Self>, _ctx: CallContext, _req: Greeting) -> JanusResult<Reply> {
            Err(JanusError::not_found("no such greeting"))
        }
    }

    impl RpcService for Greeter {
        const NAME: &'static str = "demo.Greeter";

        fn bind(methods: &mut ServiceMethods<Self>) {
            methods
                .validated_method("Greet", Greeter::greet)
                .method("Ping", Greeter::ping)
                .method("Fail", Greeter::fail);
        }
    }

    fn definition() -> ServiceDefinition {
        ServiceDefinition::new(Greeter { prefix: "hello " })
    }

    #[test]
    fn test_definition_lists_methods_in_order() {
        let def = definition();
        assert_eq!(def.name(), "demo.Greeter");
        let names: Vec<_> = def.methods().iter().map(|m| m.descriptor().method()).collect();
        assert_eq!(names, ["Greet", "Ping", "Fail"]);
        assert!(def.method("Greet").unwrap().validator().is_some());
        assert!(def.method("Ping").unwrap().validator().is_none());
    }

    #[test]
    fn test_classification_at_registration() {
        let def = definition();
        assert_eq!(def.method("Greet").unwrap().descriptor().kind(), MethodKind::Command);
        assert_eq!(def.method("Ping").unwrap().descriptor().kind(), MethodKind::Query);
    }

    #[tokio::test]
    async fn test_command_decodes_body() {
        let def = definition();
        let ctx = RequestContext::builder().build().call_context();
        let body = def
            .method("Greet")
            .unwrap()
            .invoke(ctx, Bytes::from_static(br#"{"name":"ada"}"#))
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"reply":"hello ada"}"#);
    }

    #[tokio::test]
    async fn test_query_ignores_body() {
        let def = definition();
        let ctx = RequestContext::builder().build().call_context();
        let body = def
            .method("Ping")
            .unwrap()
            .invoke(ctx, Bytes::from_static(b"not json at all"))
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"reply":"pong"}"#);
    }

    #[tokio::test]
    async fn test_empty_command_body_decodes_as_object() {
        let def = definition();
        let ctx = RequestContext::builder().build().call_context();
        let body = def.method("Greet").unwrap().invoke(ctx, Bytes::new()).await.unwrap();
        assert_eq!(&body[..], br#"{"reply":"hello "}"#);
    }

    #[tokio::test]
    async fn test_endpoint_maps_decode_failure_to_400() {
        let endpoint = MethodEndpoint::new(
            definition().method("Greet").unwrap().clone(),
            Duration::from_secs(1),
        );
        let mut ctx = RequestContext::builder().build();

        let response = endpoint
            .call(&mut ctx, http::Request::new(Bytes::from_static(b"{broken")))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ctx.errors().last().unwrap().kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_endpoint_maps_handler_error() {
        let endpoint = MethodEndpoint::new(
            definition().method("Fail").unwrap().clone(),
            Duration::from_secs(1),
        );
        let mut ctx = RequestContext::builder().build();

        let response = endpoint
            .call(&mut ctx, http::Request::new(Bytes::from_static(b"{}")))
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(ctx.errors().last().unwrap().kind, ErrorKind::Handler);
    }
}
