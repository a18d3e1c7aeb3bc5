//! Request and response types shared by both transports.
//!
//! Bodies are buffered into [`Bytes`] before the chain runs, so middleware
//! can inspect them and the same types serve HTTP and gRPC.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use janus_core::{JanusError, RequestId};
use serde::Serialize;

/// The request type seen by the middleware chain.
pub type Request = http::Request<Bytes>;

/// The response type produced by the middleware chain.
pub type Response = http::Response<Bytes>;

const APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");

/// Extension trait for building responses.
pub trait ResponseExt {
    /// Creates a plain-text response.
    fn text(status: StatusCode, message: &str) -> Response;

    /// Serializes `value` as a JSON response.
    ///
    /// Falls back to a 500 error envelope if serialization fails.
    fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response;

    /// Creates a JSON error envelope response.
    fn json_error(status: StatusCode, code: &str, message: &str) -> Response;

    /// Creates the error envelope response for `error`.
    fn from_error(error: &JanusError, request_id: RequestId) -> Response;
}

fn with_body(status: StatusCode, content_type: HeaderValue, body: impl Into<Bytes>) -> Response {
    let mut response = http::Response::new(body.into());
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    response
}

impl ResponseExt for Response {
    fn text(status: StatusCode, message: &str) -> Response {
        with_body(
            status,
            HeaderValue::from_static("text/plain; charset=utf-8"),
            message.to_string(),
        )
    }

    fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response {
        match serde_json::to_vec(value) {
            Ok(body) => with_body(status, APPLICATION_JSON, body),
            Err(e) => Self::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                &format!("failed to encode response: {e}"),
            ),
        }
    }

    fn json_error(status: StatusCode, code: &str, message: &str) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": code,
                "message": message
            }
        });
        with_body(status, APPLICATION_JSON, body.to_string())
    }

    fn from_error(error: &JanusError, request_id: RequestId) -> Response {
        let envelope = error.to_envelope(Some(&request_id.to_string()));
        Self::json(error.status_code(), &envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_json(response: &Response) -> serde_json::Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[test]
    fn test_text_response() {
        let response = Response::text(StatusCode::BAD_REQUEST, "Invalid input");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(response.body().as_ref(), b"Invalid input");
    }

    #[test]
    fn test_json_response() {
        let response = Response::json(StatusCode::OK, &serde_json::json!({"reply": "ha"}));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(body_json(&response)["reply"], "ha");
    }

    #[test]
    fn test_json_error_response() {
        let response = Response::json_error(
            StatusCode::UNAUTHORIZED,
            "AUTH_REQUIRED",
            "Authentication required",
        );
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(&response);
        assert_eq!(body["error"]["code"], "AUTH_REQUIRED");
        assert_eq!(body["error"]["message"], "Authentication required");
    }

    #[test]
    fn test_from_error_uses_error_status() {
        let id = RequestId::new();
        let response = Response::from_error(&JanusError::validation("name is required"), id);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(&response);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["request_id"], id.to_string());
    }
}
