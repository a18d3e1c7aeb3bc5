//! Radix tree node implementation.
//!
//! Each node owns one path segment. Lookup prefers static children, then
//! the parameter child, then the wildcard child, and backtracks when a
//! deeper match fails.

use http::Method;

use crate::error::RouteError;
use crate::method_router::{Endpoint, MethodRouter};
use crate::params::Params;

/// Type of path segment in the radix tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    /// Static path segment (e.g., "users", "api")
    Static,
    /// Named parameter (`:id` or `{id}`)
    Param(String),
    /// Catch-all wildcard (`*path`)
    Wildcard(String),
}

/// A node in the radix tree.
#[derive(Debug, Clone)]
pub struct Node<H> {
    segment: String,
    kind: SegmentKind,
    methods: Option<MethodRouter<H>>,
    /// Static children, sorted by segment for binary search
    static_children: Vec<Node<H>>,
    param_child: Option<Box<Node<H>>>,
    wildcard_child: Option<Box<Node<H>>>,
}

impl<H> Node<H> {
    fn new(segment: impl Into<String>, kind: SegmentKind) -> Self {
        Self {
            segment: segment.into(),
            kind,
            methods: None,
            static_children: Vec::new(),
            param_child: None,
            wildcard_child: None,
        }
    }

    /// Creates a root node for the tree.
    #[must_use]
    pub fn root() -> Self {
        Self::new("", SegmentKind::Static)
    }

    /// Returns the segment kind.
    #[must_use]
    pub const fn kind(&self) -> &SegmentKind {
        &self.kind
    }

    /// Parses a normalized path into segments.
    fn parse_path(path: &str) -> Result<Vec<(String, SegmentKind)>, RouteError> {
        let raw: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(raw.len());

        for (i, s) in raw.iter().enumerate() {
            let invalid = |reason: &str| RouteError::InvalidPattern {
                path: path.to_string(),
                reason: reason.to_string(),
            };
            let kind = if let Some(name) = s
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .or_else(|| s.strip_prefix(':'))
            {
                if name.is_empty() {
                    return Err(invalid("parameter name must not be empty"));
                }
                SegmentKind::Param(name.to_string())
            } else if let Some(name) = s.strip_prefix('*') {
                if i + 1 != raw.len() {
                    return Err(invalid("wildcard must be the last segment"));
                }
                SegmentKind::Wildcard(name.to_string())
            } else {
                SegmentKind::Static
            };
            segments.push(((*s).to_string(), kind));
        }

        Ok(segments)
    }

    /// Inserts a handler for `method` at `path`.
    pub fn insert(&mut self, method: Method, path: &str, handler: H) -> Result<(), RouteError> {
        let segments = Self::parse_path(path)?;
        let target = self.descend(&segments, path)?;
        let methods = target.methods.get_or_insert_with(MethodRouter::new);
        methods
            .insert(method.clone(), path, handler)
            .map_err(|_| RouteError::Duplicate {
                method,
                path: path.to_string(),
            })
    }

    /// Walks (creating as needed) to the node for `segments`.
    fn descend(
        &mut self,
        segments: &[(String, SegmentKind)],
        path: &str,
    ) -> Result<&mut Self, RouteError> {
        let Some(((segment, kind), remaining)) = segments.split_first() else {
            return Ok(self);
        };

        let child = match kind {
            SegmentKind::Static => {
                let index = match self
                    .static_children
                    .binary_search_by(|c| c.segment.as_str().cmp(segment))
                {
                    Ok(i) => i,
                    Err(i) => {
                        self.static_children
                            .insert(i, Node::new(segment.clone(), SegmentKind::Static));
                        i
                    }
                };
                &mut self.static_children[index]
            }
            SegmentKind::Param(name) | SegmentKind::Wildcard(name) => {
                let slot = if matches!(kind, SegmentKind::Param(_)) {
                    &mut self.param_child
                } else {
                    &mut self.wildcard_child
                };
                let child =
                    slot.get_or_insert_with(|| Box::new(Node::new(segment.clone(), kind.clone())));
                if child.kind != *kind {
                    let existing = match &child.kind {
                        SegmentKind::Param(n) | SegmentKind::Wildcard(n) => n.as_str(),
                        SegmentKind::Static => "",
                    };
                    return Err(RouteError::InvalidPattern {
                        path: path.to_string(),
                        reason: format!("'{name}' conflicts with existing parameter '{existing}'"),
                    });
                }
                child.as_mut()
            }
        };

        child.descend(remaining, path)
    }

    /// Matches a path against the tree.
    ///
    /// Returns the method router and extracted parameters if found.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&MethodRouter<H>, Params)> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = Params::new();
        let methods = self.match_segments(&segments, &mut params)?;
        Some((methods, params))
    }

    fn match_segments<'a>(
        &'a self,
        segments: &[&str],
        params: &mut Params,
    ) -> Option<&'a MethodRouter<H>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.methods.as_ref();
        };

        if let Some(child) = self.find_static_child(segment) {
            if let Some(found) = child.match_segments(remaining, params) {
                return Some(found);
            }
        }

        if let Some(child) = &self.param_child {
            if let SegmentKind::Param(name) = &child.kind {
                let mark = params.len();
                params.push(name.clone(), *segment);
                if let Some(found) = child.match_segments(remaining, params) {
                    return Some(found);
                }
                params.truncate(mark);
            }
        }

        if let Some(child) = &self.wildcard_child {
            if let SegmentKind::Wildcard(name) = &child.kind {
                params.push(name.clone(), segments.join("/"));
                return child.methods.as_ref();
            }
        }

        None
    }

    fn find_static_child(&self, segment: &str) -> Option<&Self> {
        self.static_children
            .binary_search_by(|c| c.segment.as_str().cmp(segment))
            .ok()
            .map(|i| &self.static_children[i])
    }

    /// Visits every registered endpoint.
    pub fn for_each_endpoint<'a>(&'a self, f: &mut impl FnMut(&'a Method, &'a Endpoint<H>)) {
        if let Some(methods) = &self.methods {
            for (method, endpoint) in methods.iter() {
                f(method, endpoint);
            }
        }
        for child in &self.static_children {
            child.for_each_endpoint(f);
        }
        if let Some(child) = &self.param_child {
            child.for_each_endpoint(f);
        }
        if let Some(child) = &self.wildcard_child {
            child.for_each_endpoint(f);
        }
    }
}
