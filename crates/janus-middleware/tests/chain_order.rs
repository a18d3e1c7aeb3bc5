//! Ordering guarantees of the middleware chain.

use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use janus_core::{JanusError, RequestContext};
use janus_middleware::{
    BoxFuture, Chain, Endpoint, Middleware, Next, Request, Response, ResponseExt,
};
use parking_lot::Mutex;

type Trace = Arc<Mutex<Vec<String>>>;

struct Recorder {
    name: &'static str,
    trace: Trace,
}

impl Middleware for Recorder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            self.trace.lock().push(format!("{}-enter", self.name));
            let response = next.run(ctx, request).await;
            self.trace.lock().push(format!("{}-exit", self.name));
            response
        })
    }
}

struct Deny {
    trace: Trace,
}

impl Middleware for Deny {
    fn name(&self) -> &'static str {
        "deny"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        _request: Request,
        _next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            self.trace.lock().push("deny".to_string());
            let error = JanusError::handler(StatusCode::FORBIDDEN, "not allowed");
            ctx.record_error(&error);
            Response::from_error(&error, ctx.request_id())
        })
    }
}

struct Handler {
    trace: Trace,
}

impl Endpoint for Handler {
    fn call<'a>(&'a self, _ctx: &'a mut RequestContext, _request: Request) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            self.trace.lock().push("H".to_string());
            Response::json(StatusCode::OK, &serde_json::json!({"reply": "ha"}))
        })
    }
}

fn recorder(name: &'static str, trace: &Trace) -> Recorder {
    Recorder {
        name,
        trace: Arc::clone(trace),
    }
}

#[tokio::test]
async fn post_handler_code_runs_in_reverse_order() {
    let trace = Trace::default();
    let chain = Chain::new()
        .with(recorder("A", &trace))
        .with(recorder("B", &trace))
        .with(recorder("C", &trace));
    let handler = Handler {
        trace: Arc::clone(&trace),
    };

    let mut ctx = RequestContext::builder().build();
    let response = chain.run(&mut ctx, Request::new(Bytes::new()), &handler).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        *trace.lock(),
        vec!["A-enter", "B-enter", "C-enter", "H", "C-exit", "B-exit", "A-exit"]
    );
}

#[tokio::test]
async fn short_circuit_skips_the_rest_of_the_chain() {
    let trace = Trace::default();
    let chain = Chain::new()
        .with(recorder("A", &trace))
        .with(Deny {
            trace: Arc::clone(&trace),
        })
        .with(recorder("C", &trace));
    let handler = Handler {
        trace: Arc::clone(&trace),
    };

    let mut ctx = RequestContext::builder().build();
    let response = chain.run(&mut ctx, Request::new(Bytes::new()), &handler).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(*trace.lock(), vec!["A-enter", "deny", "A-exit"]);
    assert_eq!(ctx.errors().len(), 1);
}

#[tokio::test]
async fn one_chain_serves_concurrent_requests() {
    let trace = Trace::default();
    let chain = Arc::new(Chain::new().with(recorder("A", &trace)));
    let handler = Arc::new(Handler {
        trace: Arc::clone(&trace),
    });

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let chain = Arc::clone(&chain);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let mut ctx = RequestContext::builder().build();
                chain
                    .run(&mut ctx, Request::new(Bytes::new()), handler.as_ref())
                    .await
                    .status()
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }
    assert_eq!(trace.lock().len(), 8 * 3);
}
