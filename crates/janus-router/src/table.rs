//! High-level route table.

use http::Method;

use crate::error::RouteError;
use crate::naming::{derive_path, join_paths};
use crate::node::Node;
use crate::params::Params;
use crate::RouteMatch;

/// Naming information needed to derive a service method route.
///
/// Implemented by the core method descriptor; the router only needs the
/// names and the verb the method was classified into.
pub trait MethodRoute {
    /// Service name used for the first path fragment.
    fn service_name(&self) -> &str;
    /// Method name used for the second path fragment.
    fn method_name(&self) -> &str;
    /// HTTP verb the method is bound to.
    fn verb(&self) -> Method;
}

/// Route table mapping `(verb, path)` to handlers.
///
/// Registration happens at startup, on one thread. Once built the table
/// is only read, so it can be shared behind an `Arc` without locking.
///
/// Registering a `(verb, path)` pair twice is rejected with
/// [`RouteError::Duplicate`]; the first registration stays in place.
///
/// # Example
///
/// ```rust
/// use janus_router::{RouteError, RouteTable};
/// use http::Method;
///
/// let mut table = RouteTable::new();
/// table.register(Method::POST, "/hi/hi", "controller").unwrap();
///
/// let found = table.resolve(&Method::POST, "/hi/hi").unwrap();
/// assert_eq!(*found.handler, "controller");
///
/// assert!(matches!(
///     table.register(Method::POST, "/hi/hi", "again"),
///     Err(RouteError::Duplicate { .. })
/// ));
/// assert!(matches!(
///     table.resolve(&Method::GET, "/hi/hi"),
///     Err(RouteError::NotFound { .. })
/// ));
/// ```
#[derive(Debug, Clone)]
pub struct RouteTable<H> {
    root: Node<H>,
    route_count: usize,
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> RouteTable<H> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::root(),
            route_count: 0,
        }
    }

    /// Registers `handler` for `method` at `path`.
    ///
    /// The path is normalized first (leading slash, no empty segments).
    pub fn register(&mut self, method: Method, path: &str, handler: H) -> Result<(), RouteError> {
        let path = join_paths("", path);
        self.root.insert(method, &path, handler)?;
        self.route_count += 1;
        Ok(())
    }

    /// Registers a service method under `group`.
    ///
    /// The path is `group/kebab(service)/kebab(method)` and the verb comes
    /// from the method's classification. Returns the derived path.
    ///
    /// # Example
    ///
    /// ```rust
    /// use janus_router::{MethodRoute, RouteTable};
    /// use http::Method;
    ///
    /// struct Anonymous;
    /// impl MethodRoute for Anonymous {
    ///     fn service_name(&self) -> &str { "Hello" }
    ///     fn method_name(&self) -> &str { "SayHelloAnonymous" }
    ///     fn verb(&self) -> Method { Method::GET }
    /// }
    ///
    /// let mut table = RouteTable::new();
    /// let path = table.register_method("/", &Anonymous, 1).unwrap();
    /// assert_eq!(path, "/hello/say-hello-anonymous");
    /// assert!(table.resolve(&Method::GET, &path).is_ok());
    /// ```
    pub fn register_method<R: MethodRoute + ?Sized>(
        &mut self,
        group: &str,
        route: &R,
        handler: H,
    ) -> Result<String, RouteError> {
        let path = derive_path(group, route.service_name(), route.method_name());
        self.register(route.verb(), &path, handler)?;
        Ok(path)
    }

    /// Resolves a request to its handler.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<RouteMatch<'_, H>, RouteError> {
        let not_found = || RouteError::NotFound {
            method: method.clone(),
            path: path.to_string(),
        };
        let (methods, params) = self.root.match_path(path).ok_or_else(not_found)?;
        let endpoint = methods.get(method).ok_or_else(not_found)?;
        Ok(RouteMatch {
            handler: endpoint.handler(),
            pattern: endpoint.pattern(),
            params,
        })
    }

    /// Returns the verbs registered at a path, for diagnostics.
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        self.root
            .match_path(path)
            .map(|(methods, _)| methods.methods().cloned().collect())
            .unwrap_or_default()
    }

    /// Lists `(verb, pattern)` pairs sorted by pattern then verb.
    #[must_use]
    pub fn routes(&self) -> Vec<(Method, String)> {
        let mut routes = Vec::with_capacity(self.route_count);
        self.root.for_each_endpoint(&mut |method, endpoint| {
            routes.push((method.clone(), endpoint.pattern().to_string()));
        });
        routes.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        routes
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.route_count
    }

    /// Returns true if no routes are registered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.route_count == 0
    }
}

impl<'a, H> RouteMatch<'a, H> {
    /// Consumes the match, returning the extracted parameters.
    #[must_use]
    pub fn into_params(self) -> Params {
        self.params
    }
}
