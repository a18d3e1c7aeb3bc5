//! Route groups.
//!
//! A group is a path prefix with its own middleware. Controllers and
//! service methods registered on it are mounted under the prefix, and
//! every route of the group runs the group middleware after the global
//! middleware. Registration only records intent; routes are resolved into
//! the dispatcher's table when the server is frozen, so middleware added
//! after a route still applies to it.

use std::sync::Arc;
use std::time::Duration;

use http::Method;
use janus_middleware::{Chain, Middleware};
use janus_router::{join_paths, RouteError};

use crate::dispatcher::{Dispatcher, Route};
use crate::handler::{Controller, ControllerEndpoint};
use crate::service::{MethodBinding, MethodEndpoint, ServiceDefinition};

enum Entry {
    Controller {
        path: String,
        verb: Method,
        controller: Arc<dyn Controller>,
    },
    Method(MethodBinding),
}

/// A path prefix with its own middleware and routes.
///
/// # Example
///
/// ```rust
/// use http::{Method, StatusCode};
/// use janus_core::{CallContext, JanusError};
/// use janus_middleware::stages::RecoveryMiddleware;
/// use janus_middleware::{Request, Response, ResponseExt};
/// use janus_server::{Server, ServerConfig};
///
/// let mut server = Server::new(ServerConfig::default());
/// server
///     .group("/hi")
///     .use_middleware(RecoveryMiddleware::new())
///     .controller("/hi", Method::POST, |_ctx: CallContext, _req: Request| async {
///         Ok::<_, JanusError>(Response::json(StatusCode::OK, &serde_json::json!({"reply": "ha"})))
///     });
/// ```
pub struct RouterGroup {
    prefix: String,
    chain: Chain,
    entries: Vec<Entry>,
}

impl RouterGroup {
    pub(crate) fn new(prefix: &str) -> Self {
        Self {
            prefix: join_paths(prefix, ""),
            chain: Chain::new(),
            entries: Vec::new(),
        }
    }

    /// Returns the normalized prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Adds middleware for every route of this group.
    pub fn use_middleware<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.chain.push(Arc::new(middleware));
        self
    }

    /// Registers a controller at `path` (relative to the prefix) for `verb`.
    pub fn controller<C: Controller>(&mut self, path: &str, verb: Method, controller: C) -> &mut Self {
        self.entries.push(Entry::Controller {
            path: path.to_string(),
            verb,
            controller: Arc::new(controller),
        });
        self
    }

    /// Mounts every method of `service` under this group.
    ///
    /// Each method lands at `{prefix}/{kebab(service)}/{kebab(method)}`,
    /// answering `GET` for queries and `POST` for commands.
    pub fn bind_service(&mut self, service: &ServiceDefinition) -> &mut Self {
        self.entries
            .extend(service.methods().iter().cloned().map(Entry::Method));
        self
    }

    /// Returns the group middleware names, in execution order.
    #[must_use]
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.chain.names()
    }

    /// Resolves the group's routes into `dispatcher`.
    pub(crate) fn mount(
        &self,
        dispatcher: &mut Dispatcher,
        timeout: Duration,
    ) -> Result<(), RouteError> {
        let chain = dispatcher.global().then(&self.chain);
        for entry in &self.entries {
            match entry {
                Entry::Controller {
                    path,
                    verb,
                    controller,
                } => {
                    let endpoint = ControllerEndpoint::new(Arc::clone(controller), timeout);
                    let route = Route::new(chain.clone(), Arc::new(endpoint));
                    dispatcher.add_http(verb.clone(), &join_paths(&self.prefix, path), route)?;
                }
                Entry::Method(binding) => {
                    let endpoint = MethodEndpoint::new(binding.clone(), timeout);
                    let route = Route::new(chain.clone(), Arc::new(endpoint));
                    dispatcher.add_http_method(&self.prefix, binding, route)?;
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for RouterGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterGroup")
            .field("prefix", &self.prefix)
            .field("middleware", &self.chain.names())
            .field("routes", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use janus_middleware::stages::{RecoveryMiddleware, ValidationMiddleware};

    #[test]
    fn test_prefix_is_normalized() {
        assert_eq!(RouterGroup::new("api/").prefix(), "/api");
        assert_eq!(RouterGroup::new("/").prefix(), "/");
        assert_eq!(RouterGroup::new("").prefix(), "/");
    }

    #[test]
    fn test_group_middleware_order() {
        let mut group = RouterGroup::new("/v1");
        group
            .use_middleware(RecoveryMiddleware::new())
            .use_middleware(ValidationMiddleware::new());
        assert_eq!(group.middleware_names(), vec!["recovery", "validation"]);
    }
}
