//! Request message validation.
//!
//! Message types opt into validation by implementing [`Validate`]. When a
//! method is registered as validated, the dispatcher attaches a
//! [`RequestValidator`] to its route and the validation middleware runs it
//! before the handler.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::error::JanusError;
use crate::service::decode_message;

/// Self-validation for request messages.
///
/// # Example
///
/// ```
/// use janus_core::{JanusError, Validate};
///
/// struct HelloRequest { greeting: String }
///
/// impl Validate for HelloRequest {
///     fn validate(&self) -> Result<(), JanusError> {
///         if self.greeting.is_empty() {
///             return Err(JanusError::validation_field("greeting", "is required"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Validate {
    /// Checks required fields and shape constraints.
    fn validate(&self) -> Result<(), JanusError>;
}

/// Type-erased validator attached to a route.
pub trait RequestValidator: Send + Sync + 'static {
    /// Validates a raw request body.
    fn validate(&self, body: &[u8]) -> Result<(), JanusError>;
}

/// Validator that decodes a JSON body into `T` and calls [`Validate`].
pub struct JsonValidator<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonValidator<T> {
    /// Creates a validator for `T`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonValidator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonValidator")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> RequestValidator for JsonValidator<T>
where
    T: DeserializeOwned + Validate + 'static,
{
    fn validate(&self, body: &[u8]) -> Result<(), JanusError> {
        decode_message::<T>(body)?.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Signup {
        #[serde(default)]
        email: String,
    }

    impl Validate for Signup {
        fn validate(&self) -> Result<(), JanusError> {
            if self.email.contains('@') {
                Ok(())
            } else {
                Err(JanusError::validation_field("email", "must contain @"))
            }
        }
    }

    #[test]
    fn test_valid_body_passes() {
        let validator = JsonValidator::<Signup>::new();
        assert!(validator.validate(br#"{"email":"a@b.c"}"#).is_ok());
    }

    #[test]
    fn test_invalid_field_fails() {
        let validator = JsonValidator::<Signup>::new();
        let err = validator.validate(br#"{"email":"nope"}"#).unwrap_err();
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn test_missing_body_runs_rules_on_defaults() {
        let validator = JsonValidator::<Signup>::new();
        assert!(validator.validate(b"").is_err());
    }

    #[test]
    fn test_malformed_body_fails() {
        let validator = JsonValidator::<Signup>::new();
        assert!(validator.validate(b"[1,2").is_err());
    }
}
