//! Query/command classification.
//!
//! A method whose input type is [`Empty`] is a query: it has no payload and
//! is exposed over `GET`. Every other method is a command exposed over
//! `POST`. Classification is total and pure.

use crate::service::{Empty, MethodDescriptor, MethodKind, TypeIdentity};

/// Classifies a registered method.
#[must_use]
pub fn classify(descriptor: &MethodDescriptor) -> MethodKind {
    classify_input(descriptor.input())
}

/// Classifies a method by its input type identity alone.
#[must_use]
pub fn classify_input(input: &TypeIdentity) -> MethodKind {
    if input.is::<Empty>() {
        MethodKind::Query
    } else {
        MethodKind::Command
    }
}
