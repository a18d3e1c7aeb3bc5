//! Route table and path derivation for Janus.
//!
//! This crate maps `(verb, path)` pairs to handlers with a radix tree, and
//! derives the HTTP path of RPC service methods by convention:
//!
//! ```text
//! group + "/" + kebab(service) + "/" + kebab(method)
//! ```
//!
//! # Features
//!
//! - **Radix Tree Matching**: O(k) path lookup
//! - **Path Parameters**: `:id` or `{id}` segments
//! - **Wildcards**: Catch-all routes (`/files/*path`)
//! - **Deterministic Derivation**: [`kebab_case`] and [`derive_path`] depend
//!   only on names
//! - **No Silent Overrides**: duplicate registrations are errors
//!
//! # Example
//!
//! ```rust
//! use janus_router::RouteTable;
//! use http::Method;
//!
//! let mut table = RouteTable::new();
//! table.register(Method::GET, "/users/:id", "getUser").unwrap();
//!
//! let found = table.resolve(&Method::GET, "/users/123").unwrap();
//! assert_eq!(*found.handler, "getUser");
//! assert_eq!(found.params.get("id"), Some("123"));
//! ```

#![doc(html_root_url = "https://docs.rs/janus-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod method_router;
mod naming;
mod node;
mod params;
mod table;

pub use error::RouteError;
pub use method_router::{Endpoint, MethodRouter};
pub use naming::{derive_path, join_paths, kebab_case};
pub use node::{Node, SegmentKind};
pub use params::Params;
pub use table::{MethodRoute, RouteTable};

/// A resolved route: the handler, the pattern it was registered under, and
/// the extracted path parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a, H> {
    /// The matched handler
    pub handler: &'a H,
    /// The registered pattern (used as a low-cardinality route label)
    pub pattern: &'a str,
    /// Extracted path parameters
    pub params: Params,
}
