//! Request logging middleware.
//!
//! Adds the request's carrier fields to the request logger before the rest
//! of the chain runs, then the outcome after it, and writes one `info`
//! record whose message is the completion timestamp (RFC 3339).
//!
//! | Field | When | Value |
//! |-------|------|-------|
//! | `ClientIP` | before | `X-Forwarded-For`, `X-Real-Ip`, then the socket address |
//! | `RequestMethod` | before | HTTP verb |
//! | `UserAgent` | before | `User-Agent` header |
//! | `Uri` | before | request URI |
//! | `Transport` | before | `http` or `rpc` |
//! | `Status` | after | response status code |
//! | `LatencyMs` | after | time since admission |
//! | `Errors` | after, if any | the request's error list as JSON |

use chrono::{SecondsFormat, Utc};
use janus_core::RequestContext;

use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};

/// Middleware that writes one structured log line per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogMiddleware;

impl RequestLogMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for RequestLogMiddleware {
    fn name(&self) -> &'static str {
        "request_log"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let info = ctx.info();
            ctx.logger()
                .with_field("ClientIP", info.client_ip())
                .with_field("RequestMethod", info.method().as_str())
                .with_field("UserAgent", info.user_agent())
                .with_field("Uri", info.uri().to_string())
                .with_field("Transport", info.transport().as_str());

            let response = next.run(ctx, request).await;

            let logger = ctx.logger();
            logger
                .with_field("Status", response.status().as_u16())
                .with_field("LatencyMs", ctx.elapsed().as_secs_f64() * 1000.0);
            if ctx.has_errors() {
                logger.with_field("Errors", ctx.errors().to_json());
            }
            if ctx.is_cancelled() {
                logger.with_field("Cancelled", true);
            }
            logger.info(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));

            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::middleware::FnEndpoint;
    use crate::types::ResponseExt;
    use bytes::Bytes;
    use http::{Method, StatusCode, Uri};
    use janus_core::{JanusError, LogLevel, MemorySink, RequestInfo, Transport};
    use std::sync::Arc;

    fn context(sink: &Arc<MemorySink>) -> RequestContext {
        let mut headers = http::HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.1, 10.0.0.2".parse().unwrap());
        headers.insert("user-agent", "janus-test".parse().unwrap());
        RequestContext::builder()
            .info(RequestInfo::new(
                Transport::Http,
                Method::POST,
                Uri::from_static("/hi/hi?x=1"),
                headers,
                None,
            ))
            .log_sink(sink.clone())
            .build()
    }

    #[tokio::test]
    async fn test_logs_one_line_with_request_fields() {
        let sink = Arc::new(MemorySink::new());
        let mut ctx = context(&sink);
        let chain = Chain::new().with(RequestLogMiddleware::new());
        let endpoint = FnEndpoint::new(|call: janus_core::CallContext, _req| async move {
            call.logger().with_field("handler", "hi");
            Response::text(StatusCode::OK, "ok")
        });

        chain.run(&mut ctx, Request::new(Bytes::new()), &endpoint).await;
        ctx.finalize();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.level, LogLevel::Info);
        assert!(chrono::DateTime::parse_from_rfc3339(&record.message).is_ok());
        assert_eq!(record.fields["ClientIP"], "10.0.0.1");
        assert_eq!(record.fields["RequestMethod"], "POST");
        assert_eq!(record.fields["UserAgent"], "janus-test");
        assert_eq!(record.fields["Uri"], "/hi/hi?x=1");
        assert_eq!(record.fields["Status"], 200);
        assert_eq!(record.fields["handler"], "hi");
        assert!(record.fields.get("Errors").is_none());
    }

    #[tokio::test]
    async fn test_logs_recorded_errors() {
        let sink = Arc::new(MemorySink::new());
        let mut ctx = context(&sink);
        let chain = Chain::new().with(RequestLogMiddleware::new());

        struct Failing;
        impl crate::middleware::Endpoint for Failing {
            fn call<'a>(
                &'a self,
                ctx: &'a mut RequestContext,
                _request: Request,
            ) -> BoxFuture<'a, Response> {
                Box::pin(async move {
                    let err = JanusError::validation("name is required");
                    ctx.record_error(&err);
                    Response::from_error(&err, ctx.request_id())
                })
            }
        }

        let response = chain.run(&mut ctx, Request::new(Bytes::new()), &Failing).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let records = sink.records();
        assert_eq!(records[0].fields["Status"], 400);
        let errors = records[0].fields["Errors"].as_str().unwrap();
        assert!(errors.contains("name is required"));
    }
}
