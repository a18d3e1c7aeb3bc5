//! # Hello demo
//!
//! A greeter served on both transports:
//!
//! | Call | HTTP | gRPC |
//! |------|------|------|
//! | `SayHello` | `POST /hello/say-hello` | `/demo.Hello/SayHello` |
//! | `SayHelloAnonymous` | `GET /hello/say-hello-anonymous` | `/demo.Hello/SayHelloAnonymous` |
//! | controller | `POST /hi/hi` | |
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p hello-demo
//! curl -X POST localhost:8080/hello/say-hello -d '{"greeting":"hi"}'
//! JANUS__SERVER__HTTP_ADDR=0.0.0.0:9000 cargo run -p hello-demo
//! ```

use std::sync::Arc;

use http::{Method, StatusCode};
use janus::prelude::*;
use janus::core::BoxFuture;
use janus_server::MemoryRegistry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct HelloRequest {
    #[serde(default)]
    greeting: String,
}

impl Validate for HelloRequest {
    fn validate(&self) -> Result<(), JanusError> {
        if self.greeting.trim().is_empty() {
            return Err(JanusError::validation_field("greeting", "must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct HelloReply {
    reply: String,
}

struct Hello {
    signature: String,
}

impl Hello {
    async fn say_hello(self: Arc<Self>, ctx: CallContext, req: HelloRequest) -> JanusResult<HelloReply> {
        ctx.logger().with_field("greeting", &req.greeting);
        Ok(HelloReply {
            reply: format!("{} from {}", req.greeting, self.signature),
        })
    }

    async fn say_hello_anonymous(self: Arc<Self>, _ctx: CallContext, _req: Empty) -> JanusResult<HelloReply> {
        Ok(HelloReply {
            reply: format!("hello from {}", self.signature),
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

struct TestController;

impl Controller for TestController {
    fn handle(&self, _ctx: CallContext, _request: Request) -> BoxFuture<'static, JanusResult<Response>> {
        Box::pin(async { Ok(Response::json(StatusCode::OK, &serde_json::json!({"reply": "ha"}))) })
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = ConfigLoader::new()
        .with_development()
        .with_optional_file("hello.toml")?
        .with_dotenv()?
        .with_env_prefix("JANUS")
        .load()?;

    let hello = ServiceDefinition::new(Hello {
        signature: config.telemetry.service_name.clone(),
    });
    let registry = Arc::new(MemoryRegistry::new(std::time::Duration::from_secs(
        config.naming.ttl_secs,
    )));

    let mut app = App::from_config(config)?
        .with_rpc_server(RpcServer::new().register(&hello))
        .with_registry(registry);

    let server = app.server();
    server.use_default_stages();
    server.group("/hi").controller("/hi", Method::POST, TestController);
    server.group("/").bind_service(&hello);

    tracing::info!("starting hello demo");
    app.run().await
}
