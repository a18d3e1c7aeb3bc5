//! Per-path verb dispatch.

use std::sync::Arc;

use http::Method;

/// A handler registered for one verb, with the pattern it was registered as.
#[derive(Debug, Clone)]
pub struct Endpoint<H> {
    pattern: Arc<str>,
    handler: H,
}

impl<H> Endpoint<H> {
    /// Returns the registered pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the handler.
    #[must_use]
    pub const fn handler(&self) -> &H {
        &self.handler
    }
}

/// Maps HTTP methods to handlers for a single path.
///
/// Registration never overwrites: inserting a verb twice hands the second
/// handler back to the caller.
///
/// # Example
///
/// ```rust
/// use janus_router::MethodRouter;
/// use http::Method;
///
/// let mut router = MethodRouter::new();
/// assert!(router.insert(Method::GET, "/users", "listUsers").is_ok());
/// assert!(router.insert(Method::POST, "/users", "createUser").is_ok());
/// assert_eq!(router.insert(Method::GET, "/users", "again"), Err("again"));
///
/// assert_eq!(router.get(&Method::GET).map(|e| *e.handler()), Some("listUsers"));
/// assert!(router.get(&Method::DELETE).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct MethodRouter<H> {
    entries: Vec<(Method, Endpoint<H>)>,
}

impl<H> Default for MethodRouter<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> MethodRouter<H> {
    /// Creates an empty method router.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers `handler` for `method`.
    ///
    /// Returns the handler back if the verb is already taken.
    pub fn insert(&mut self, method: Method, pattern: &str, handler: H) -> Result<(), H> {
        if self.entries.iter().any(|(m, _)| *m == method) {
            return Err(handler);
        }
        self.entries.push((
            method,
            Endpoint {
                pattern: Arc::from(pattern),
                handler,
            },
        ));
        Ok(())
    }

    /// Returns the endpoint for a method.
    #[must_use]
    pub fn get(&self, method: &Method) -> Option<&Endpoint<H>> {
        self.entries
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, e)| e)
    }

    /// Returns the registered verbs.
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.entries.iter().map(|(m, _)| m)
    }

    /// Iterates over `(verb, endpoint)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Method, &Endpoint<H>)> {
        self.entries.iter().map(|(m, e)| (m, e))
    }

    /// Returns true if no verb is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut router = MethodRouter::new();
        router.insert(Method::GET, "/a", 1).unwrap();
        router.insert(Method::POST, "/a", 2).unwrap();

        assert_eq!(router.get(&Method::GET).map(|e| *e.handler()), Some(1));
        assert_eq!(router.get(&Method::POST).map(|e| e.pattern()), Some("/a"));
        assert!(router.get(&Method::PUT).is_none());
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let mut router = MethodRouter::new();
        router.insert(Method::GET, "/a", 1).unwrap();
        assert_eq!(router.insert(Method::GET, "/a", 2), Err(2));
        assert_eq!(router.get(&Method::GET).map(|e| *e.handler()), Some(1));
    }

    #[test]
    fn test_methods_in_registration_order() {
        let mut router = MethodRouter::new();
        router.insert(Method::POST, "/a", ()).unwrap();
        router.insert(Method::GET, "/a", ()).unwrap();
        let methods: Vec<_> = router.methods().cloned().collect();
        assert_eq!(methods, vec![Method::POST, Method::GET]);
    }
}
