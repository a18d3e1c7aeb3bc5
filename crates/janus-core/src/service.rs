//! RPC service method descriptors.
//!
//! A [`MethodDescriptor`] is built once, when a service method is
//! registered. It records the service and method names plus the identity of
//! the input and output message types, and carries the [`MethodKind`] tag
//! computed by the [classifier](crate::classify) at that moment. Nothing on
//! the request path inspects types again.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use http::Method;
use janus_router::MethodRoute;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::classify::classify_input;
use crate::error::JanusError;

/// The well-known empty message.
///
/// Methods taking `Empty` are queries: they read no body and are served
/// over HTTP `GET`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Empty {}

/// Identity of a message type.
#[derive(Clone, Copy)]
pub struct TypeIdentity {
    id: TypeId,
    name: &'static str,
}

impl TypeIdentity {
    /// Returns the identity of `T`.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns `true` if this identity is that of `T`.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Returns the Rust type name (for diagnostics only).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeIdentity {}

impl fmt::Debug for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Whether a method reads or changes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    /// No payload; served over `GET`.
    Query,
    /// Payload in the body; served over `POST`.
    Command,
}

impl MethodKind {
    /// Returns the HTTP verb the method is bound to.
    #[must_use]
    pub fn http_method(self) -> Method {
        match self {
            Self::Query => Method::GET,
            Self::Command => Method::POST,
        }
    }

    /// Returns `"query"` or `"command"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Command => "command",
        }
    }
}

/// Registration-time description of one service method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    service: Arc<str>,
    method: Arc<str>,
    input: TypeIdentity,
    output: TypeIdentity,
    kind: MethodKind,
}

impl MethodDescriptor {
    /// Describes method `method` of `service` taking `Req` and returning `Res`.
    ///
    /// # Example
    ///
    /// ```
    /// use janus_core::{Empty, MethodDescriptor, MethodKind};
    ///
    /// #[derive(serde::Serialize)]
    /// struct Reply { reply: String }
    ///
    /// let desc = MethodDescriptor::new::<Empty, Reply>("Hello", "SayHelloAnonymous");
    /// assert_eq!(desc.kind(), MethodKind::Query);
    /// assert_eq!(desc.rpc_path(), "/Hello/SayHelloAnonymous");
    /// ```
    #[must_use]
    pub fn new<Req: 'static, Res: 'static>(
        service: impl Into<Arc<str>>,
        method: impl Into<Arc<str>>,
    ) -> Self {
        Self::from_parts(
            service,
            method,
            TypeIdentity::of::<Req>(),
            TypeIdentity::of::<Res>(),
        )
    }

    /// Builds a descriptor from explicit type identities.
    #[must_use]
    pub fn from_parts(
        service: impl Into<Arc<str>>,
        method: impl Into<Arc<str>>,
        input: TypeIdentity,
        output: TypeIdentity,
    ) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            kind: classify_input(&input),
            input,
            output,
        }
    }

    /// Returns the (possibly package-qualified) service name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Returns the service name without its package qualifier.
    #[must_use]
    pub fn service_simple_name(&self) -> &str {
        self.service.rsplit('.').next().unwrap_or(&self.service)
    }

    /// Returns the method name.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the input type identity.
    #[must_use]
    pub const fn input(&self) -> &TypeIdentity {
        &self.input
    }

    /// Returns the output type identity.
    #[must_use]
    pub const fn output(&self) -> &TypeIdentity {
        &self.output
    }

    /// Returns the classification tag.
    #[must_use]
    pub const fn kind(&self) -> MethodKind {
        self.kind
    }

    /// Returns the gRPC path, `/{service}/{method}`.
    #[must_use]
    pub fn rpc_path(&self) -> String {
        format!("/{}/{}", self.service, self.method)
    }
}

impl MethodRoute for MethodDescriptor {
    fn service_name(&self) -> &str {
        self.service_simple_name()
    }

    fn method_name(&self) -> &str {
        &self.method
    }

    fn verb(&self) -> Method {
        self.kind.http_method()
    }
}

/// Decodes a JSON message.
///
/// An empty (or all-whitespace) body decodes as `{}`, so messages whose
/// fields all have defaults can be sent without a body.
pub fn decode_message<T: DeserializeOwned>(body: &[u8]) -> Result<T, JanusError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body)
        .map_err(|e| JanusError::validation(format!("invalid request body: {e}")))
}

/// Encodes a JSON message.
pub fn encode_message<T: Serialize>(message: &T) -> Result<Vec<u8>, JanusError> {
    serde_json::to_vec(message)
        .map_err(|e| JanusError::internal_with_source("failed to encode response", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Greeting {
        #[serde(default)]
        name: String,
    }

    #[test]
    fn test_simple_name_strips_package() {
        let desc = MethodDescriptor::new::<Greeting, Empty>("demo.v1.Hello", "SayHello");
        assert_eq!(desc.service(), "demo.v1.Hello");
        assert_eq!(desc.service_simple_name(), "Hello");
        assert_eq!(desc.rpc_path(), "/demo.v1.Hello/SayHello");
    }

    #[test]
    fn test_type_identity() {
        let id = TypeIdentity::of::<Empty>();
        assert!(id.is::<Empty>());
        assert!(!id.is::<Greeting>());
        assert_eq!(id, TypeIdentity::of::<Empty>());
        assert!(id.name().ends_with("Empty"));
    }

    #[test]
    fn test_decode_empty_body_as_object() {
        let greeting: Greeting = decode_message(b"").unwrap();
        assert_eq!(greeting, Greeting { name: String::new() });

        let empty: Empty = decode_message(b"  \n").unwrap();
        assert_eq!(empty, Empty {});
    }

    #[test]
    fn test_decode_failure_is_validation_error() {
        let err = decode_message::<Greeting>(b"{not json").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[test]
    fn test_route_source_uses_simple_name() {
        let desc = MethodDescriptor::new::<Greeting, Empty>("demo.Hello", "SayHello");
        assert_eq!(MethodRoute::service_name(&desc), "Hello");
        assert_eq!(desc.verb(), Method::POST);
    }
}
