//! Ordered middleware chains.
//!
//! A [`Chain`] is assembled while routes are registered and frozen (shared
//! behind an `Arc`) before the server starts listening. Running a chain
//! never mutates it, so one chain serves every concurrent request.

use std::fmt;
use std::sync::Arc;

use janus_core::RequestContext;

use crate::middleware::{Endpoint, Middleware, Next};
use crate::types::{Request, Response};

/// An ordered list of middleware. Insertion order is execution order.
///
/// # Example
///
/// ```
/// use janus_middleware::Chain;
/// use janus_middleware::stages::{RecoveryMiddleware, RequestLogMiddleware};
///
/// let chain = Chain::new()
///     .with(RequestLogMiddleware::new())
///     .with(RecoveryMiddleware::new());
///
/// assert_eq!(chain.names(), vec!["request_log", "recovery"]);
/// ```
#[derive(Clone, Default)]
pub struct Chain {
    entries: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware, builder style.
    #[must_use]
    pub fn with<M: Middleware>(mut self, middleware: M) -> Self {
        self.push(Arc::new(middleware));
        self
    }

    /// Appends a shared middleware.
    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.entries.push(middleware);
    }

    /// Appends every entry of `other`, after the entries already present.
    pub fn extend(&mut self, other: &Chain) {
        self.entries.extend(other.entries.iter().cloned());
    }

    /// Returns a new chain holding `self`'s entries followed by `other`'s.
    #[must_use]
    pub fn then(&self, other: &Chain) -> Chain {
        let mut joined = self.clone();
        joined.extend(other);
        joined
    }

    /// Returns the entry names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|m| m.name()).collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the chain has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs the request through every entry and then `endpoint`.
    pub async fn run(
        &self,
        ctx: &mut RequestContext,
        request: Request,
        endpoint: &dyn Endpoint,
    ) -> Response {
        Next::new(&self.entries, endpoint).run(ctx, request).await
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("entries", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{BoxFuture, FnEndpoint};
    use crate::types::ResponseExt;
    use bytes::Bytes;
    use http::StatusCode;

    struct Named(&'static str);

    impl Middleware for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut RequestContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            next.run(ctx, request)
        }
    }

    #[test]
    fn test_then_keeps_order() {
        let global = Chain::new().with(Named("a")).with(Named("b"));
        let group = Chain::new().with(Named("c"));
        let joined = global.then(&group);
        assert_eq!(joined.names(), vec!["a", "b", "c"]);
        assert_eq!(global.len(), 2);
        assert!(!joined.is_empty());
    }

    #[test]
    fn test_debug_shows_names() {
        let chain = Chain::new().with(Named("x"));
        assert_eq!(format!("{chain:?}"), "Chain { entries: [\"x\"] }");
    }

    #[tokio::test]
    async fn test_pass_through_chain_reaches_endpoint() {
        let chain = Chain::new().with(Named("a")).with(Named("b"));
        let endpoint =
            FnEndpoint::new(|_call, request: Request| async move {
                Response::text(StatusCode::CREATED, std::str::from_utf8(request.body()).unwrap_or(""))
            });
        let mut ctx = RequestContext::builder().build();
        let response = chain
            .run(&mut ctx, Request::new(Bytes::from_static(b"echo")), &endpoint)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.body().as_ref(), b"echo");
    }
}
