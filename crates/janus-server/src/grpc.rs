//! gRPC wire format.
//!
//! Messages travel in the standard length-prefixed frame: one compression
//! flag byte (always `0` here), a big-endian `u32` length, then the payload.
//! Payloads are JSON, announced as `application/grpc+json`.
//!
//! The request pipeline produces ordinary HTTP-shaped responses on both
//! transports. [`into_grpc_response`] converts them at the edge: the body
//! becomes one message frame and the outcome moves into the `grpc-status`
//! and `grpc-message` trailers.

use std::convert::Infallible;

use bytes::{BufMut, Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, StatusCode};
use http_body_util::StreamBody;
use hyper::body::Frame;
use janus_core::{JanusError, RpcCode};
use janus_middleware::Response;

/// Content type of JSON-encoded gRPC messages.
pub const GRPC_CONTENT_TYPE: &str = "application/grpc+json";

/// Trailer carrying the numeric status code.
pub const GRPC_STATUS: &str = "grpc-status";

/// Trailer carrying the percent-encoded status message.
pub const GRPC_MESSAGE: &str = "grpc-message";

const FRAME_HEADER_LEN: usize = 5;

/// Response body of the RPC listener: data frames followed by trailers.
pub type GrpcBody =
    StreamBody<futures_util::stream::Iter<std::vec::IntoIter<Result<Frame<Bytes>, Infallible>>>>;

/// Outcome of an RPC, as sent in the trailers.
///
/// Endpoints attach one to their responses so the precise code survives
/// the trip through the HTTP-shaped pipeline. Responses without one are
/// mapped from their HTTP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcStatus {
    /// Status code.
    pub code: RpcCode,
    /// Human-readable message (empty on success).
    pub message: String,
}

impl RpcStatus {
    /// Creates a status.
    #[must_use]
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The success status.
    #[must_use]
    pub fn ok() -> Self {
        Self::new(RpcCode::Ok, "")
    }

    /// Maps a request error to its status.
    #[must_use]
    pub fn from_error(error: &JanusError) -> Self {
        Self::new(error.rpc_code(), error.to_string())
    }

    /// Wraps the status in an empty pipeline response.
    ///
    /// [`into_grpc_response`] turns it into a trailers-only reply.
    #[must_use]
    pub fn into_response(self) -> Response {
        let mut response = Response::default();
        response.extensions_mut().insert(self);
        response
    }

    /// Returns the status attached to `response`, or one derived from its
    /// HTTP status and JSON error envelope.
    #[must_use]
    pub fn of_response(response: &Response) -> Self {
        if let Some(status) = response.extensions().get::<Self>() {
            return status.clone();
        }
        let code = RpcCode::from_http_status(response.status());
        if code == RpcCode::Ok {
            return Self::ok();
        }
        Self::new(code, envelope_message(response.body(), response.status()))
    }
}

fn envelope_message(body: &[u8], status: StatusCode) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string())
}

/// Extracts the message from a request body.
///
/// An empty body is an empty message. Anything else must hold exactly one
/// uncompressed frame.
///
/// # Errors
///
/// `UNIMPLEMENTED` for compressed frames, `INTERNAL` for truncated or
/// oversized ones.
pub fn decode_frame(body: &Bytes) -> Result<Bytes, RpcStatus> {
    if body.is_empty() {
        return Ok(Bytes::new());
    }
    if body.len() < FRAME_HEADER_LEN {
        return Err(RpcStatus::new(RpcCode::Internal, "truncated message frame"));
    }
    if body[0] != 0 {
        return Err(RpcStatus::new(
            RpcCode::Unimplemented,
            "compressed messages are not supported",
        ));
    }

    let mut length = [0u8; 4];
    length.copy_from_slice(&body[1..FRAME_HEADER_LEN]);
    let length = u32::from_be_bytes(length) as usize;
    if body.len() - FRAME_HEADER_LEN != length {
        return Err(RpcStatus::new(
            RpcCode::Internal,
            format!(
                "message length mismatch: header says {length}, got {}",
                body.len() - FRAME_HEADER_LEN
            ),
        ));
    }

    Ok(body.slice(FRAME_HEADER_LEN..))
}

/// Wraps a message in an uncompressed frame.
///
/// # Errors
///
/// `RESOURCE_EXHAUSTED` if the message does not fit the `u32` length prefix.
pub fn encode_frame(message: &[u8]) -> Result<Bytes, RpcStatus> {
    let length = frame_length(message.len())?;
    let mut frame = BytesMut::with_capacity(FRAME_HEADER_LEN + message.len());
    frame.put_u8(0);
    frame.put_u32(length);
    frame.put_slice(message);
    Ok(frame.freeze())
}

fn frame_length(len: usize) -> Result<u32, RpcStatus> {
    u32::try_from(len).map_err(|_| {
        RpcStatus::new(
            RpcCode::ResourceExhausted,
            format!("message of {len} bytes exceeds the frame limit"),
        )
    })
}

/// Percent-encodes a status message for the `grpc-message` trailer.
///
/// Printable ASCII other than `%` passes through; every other byte of the
/// UTF-8 encoding becomes `%XX`.
#[must_use]
pub fn percent_encode(message: &str) -> String {
    let mut encoded = String::with_capacity(message.len());
    for byte in message.bytes() {
        if (0x20..=0x7e).contains(&byte) && byte != b'%' {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

/// Converts a pipeline response into a gRPC response.
#[must_use]
pub fn into_grpc_response(response: Response) -> http::Response<GrpcBody> {
    let mut status = RpcStatus::of_response(&response);
    let (parts, body) = response.into_parts();

    let mut frames = Vec::with_capacity(2);
    if status.code == RpcCode::Ok {
        match encode_frame(&body) {
            Ok(frame) => frames.push(Ok(Frame::data(frame))),
            Err(error) => status = error,
        }
    }
    frames.push(Ok(Frame::trailers(trailers(&status))));

    let mut headers = parts.headers;
    headers.remove(CONTENT_LENGTH);
    grpc_response(headers, frames)
}

fn grpc_response(
    mut headers: HeaderMap,
    frames: Vec<Result<Frame<Bytes>, Infallible>>,
) -> http::Response<GrpcBody> {
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(GRPC_CONTENT_TYPE));
    let mut response = http::Response::new(StreamBody::new(futures_util::stream::iter(frames)));
    *response.headers_mut() = headers;
    response
}

fn trailers(status: &RpcStatus) -> HeaderMap {
    let mut trailers = HeaderMap::new();
    trailers.insert(GRPC_STATUS, HeaderValue::from(status.code.as_i32()));
    if !status.message.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&percent_encode(&status.message)) {
            trailers.insert(GRPC_MESSAGE, value);
        }
    }
    trailers
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use janus_middleware::ResponseExt;

    #[test]
    fn test_frame_layout() {
        let frame = encode_frame(b"{}").unwrap();
        assert_eq!(&frame[..], &[0, 0, 0, 0, 2, b'{', b'}']);
        assert_eq!(decode_frame(&frame).unwrap(), Bytes::from_static(b"{}"));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_oversized_message_is_resource_exhausted() {
        let limit = u32::MAX as usize;
        assert_eq!(frame_length(limit).unwrap(), u32::MAX);
        assert_eq!(frame_length(limit + 1).unwrap_err().code, RpcCode::ResourceExhausted);
    }

    #[test]
    fn test_empty_body_is_empty_message() {
        assert!(decode_frame(&Bytes::new()).unwrap().is_empty());
    }

    #[test]
    fn test_compressed_frame_rejected() {
        let frame = Bytes::from_static(&[1, 0, 0, 0, 0]);
        assert_eq!(decode_frame(&frame).unwrap_err().code, RpcCode::Unimplemented);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let frame = Bytes::from_static(&[0, 0, 0, 0, 9, b'{', b'}']);
        assert_eq!(decode_frame(&frame).unwrap_err().code, RpcCode::Internal);

        let short = Bytes::from_static(&[0, 0]);
        assert_eq!(decode_frame(&short).unwrap_err().code, RpcCode::Internal);
    }

    #[test]
    fn test_percent_encode() {
        assert_eq!(percent_encode("plain text"), "plain text");
        assert_eq!(percent_encode("100%"), "100%25");
        assert_eq!(percent_encode("line\nbreak"), "line%0Abreak");
        assert_eq!(percent_encode("é"), "%C3%A9");
    }

    #[test]
    fn test_status_from_extension_wins() {
        let mut response = Response::json_error(StatusCode::NOT_FOUND, "ROUTE_NOT_FOUND", "nope");
        response
            .extensions_mut()
            .insert(RpcStatus::new(RpcCode::Unimplemented, "unknown method"));
        assert_eq!(RpcStatus::of_response(&response).code, RpcCode::Unimplemented);
    }

    #[tokio::test]
    async fn test_status_only_response_has_trailers() {
        let response = RpcStatus::new(RpcCode::Unimplemented, "compressed").into_response();
        let collected = into_grpc_response(response).into_body().collect().await.unwrap();
        let trailers = collected.trailers().cloned().unwrap();
        assert_eq!(trailers[GRPC_STATUS], "12");
        assert_eq!(trailers[GRPC_MESSAGE], "compressed");
        assert!(collected.to_bytes().is_empty());
    }

    #[test]
    fn test_status_mapped_from_http() {
        let response = Response::json_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "name: is required");
        let status = RpcStatus::of_response(&response);
        assert_eq!(status.code, RpcCode::InvalidArgument);
        assert_eq!(status.message, "name: is required");

        let ok = Response::text(StatusCode::OK, "fine");
        assert_eq!(RpcStatus::of_response(&ok), RpcStatus::ok());
    }

    #[tokio::test]
    async fn test_success_response_frames_and_trailers() {
        let response = Response::json(StatusCode::OK, &serde_json::json!({"reply": "ha"}));
        let grpc = into_grpc_response(response);

        assert_eq!(grpc.status(), StatusCode::OK);
        assert_eq!(grpc.headers()[CONTENT_TYPE], GRPC_CONTENT_TYPE);

        let collected = grpc.into_body().collect().await.unwrap();
        let trailers = collected.trailers().cloned().unwrap();
        assert_eq!(trailers[GRPC_STATUS], "0");

        let message = decode_frame(&collected.to_bytes()).unwrap();
        assert_eq!(&message[..], br#"{"reply":"ha"}"#);
    }

    #[tokio::test]
    async fn test_error_response_has_no_data() {
        let error = JanusError::validation_field("greeting", "is required");
        let mut response = Response::from_error(&error, janus_core::RequestId::new());
        response.extensions_mut().insert(RpcStatus::from_error(&error));

        let collected = into_grpc_response(response).into_body().collect().await.unwrap();
        let trailers = collected.trailers().cloned().unwrap();
        assert_eq!(trailers[GRPC_STATUS], "3");
        assert!(trailers[GRPC_MESSAGE].to_str().unwrap().contains("greeting"));
        assert!(collected.to_bytes().is_empty());
    }
}
