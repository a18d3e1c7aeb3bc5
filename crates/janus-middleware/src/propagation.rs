//! Trace context propagation headers.
//!
//! Incoming requests may carry their parent span in either format:
//!
//! - [W3C Trace Context](https://www.w3.org/TR/trace-context/): `traceparent`
//! - [B3](https://github.com/openzipkin/b3-propagation): the single `b3`
//!   header, or `X-B3-TraceId` / `X-B3-SpanId` / `X-B3-Sampled`
//!
//! W3C takes precedence when both are present.

use http::header::{HeaderMap, HeaderValue};
use janus_core::SpanContext;

/// The W3C Trace Context header.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// The B3 single-header format.
pub const B3_HEADER: &str = "b3";

/// B3 multi-header trace id.
pub const B3_TRACE_ID_HEADER: &str = "x-b3-traceid";

/// B3 multi-header span id.
pub const B3_SPAN_ID_HEADER: &str = "x-b3-spanid";

/// B3 multi-header sampling decision.
pub const B3_SAMPLED_HEADER: &str = "x-b3-sampled";

/// Extracts the caller's span context from request headers.
///
/// Returns `None` when no header is present or none parses.
#[must_use]
pub fn extract(headers: &HeaderMap) -> Option<SpanContext> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    header(TRACEPARENT_HEADER)
        .and_then(parse_traceparent)
        .or_else(|| header(B3_HEADER).and_then(parse_b3_single))
        .or_else(|| {
            let trace_id = header(B3_TRACE_ID_HEADER)?;
            let span_id = header(B3_SPAN_ID_HEADER)?;
            let sampled = header(B3_SAMPLED_HEADER).map_or(true, b3_sampled);
            b3_context(trace_id, span_id, sampled)
        })
}

/// Writes `context` into outgoing headers in both W3C and B3 formats.
pub fn inject(context: &SpanContext, headers: &mut HeaderMap) {
    if !context.is_valid() {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&context.to_traceparent()) {
        headers.insert(TRACEPARENT_HEADER, value);
    }
    let b3 = format!(
        "{}-{}-{}",
        context.trace_id,
        context.span_id,
        if context.sampled { "1" } else { "0" }
    );
    if let Ok(value) = HeaderValue::from_str(&b3) {
        headers.insert(B3_HEADER, value);
    }
}

/// Parses a `traceparent` value: `00-<32 hex>-<16 hex>-<2 hex>`.
#[must_use]
pub fn parse_traceparent(value: &str) -> Option<SpanContext> {
    let mut parts = value.trim().split('-');
    let version = parts.next()?;
    let trace_id = parts.next()?;
    let span_id = parts.next()?;
    let flags = parts.next()?;
    if version != "00" || parts.next().is_some() || flags.len() != 2 {
        return None;
    }
    let flags = u8::from_str_radix(flags, 16).ok()?;
    let context = SpanContext::new(
        trace_id.to_ascii_lowercase(),
        span_id.to_ascii_lowercase(),
        flags & 0x01 == 0x01,
    );
    context.is_valid().then_some(context)
}

/// Parses a single `b3` header: `{trace}-{span}[-{sampled}[-{parent}]]`.
///
/// A bare sampling decision (`0`, `1`, `d`) carries no ids and yields `None`.
#[must_use]
pub fn parse_b3_single(value: &str) -> Option<SpanContext> {
    let mut parts = value.trim().split('-');
    let trace_id = parts.next()?;
    let span_id = parts.next()?;
    let sampled = parts.next().map_or(true, b3_sampled);
    b3_context(trace_id, span_id, sampled)
}

fn b3_sampled(value: &str) -> bool {
    matches!(value.trim(), "1" | "d" | "true")
}

fn b3_context(trace_id: &str, span_id: &str, sampled: bool) -> Option<SpanContext> {
    let trace_id = trace_id.trim().to_ascii_lowercase();
    // 64-bit B3 trace ids are left-padded to 128 bits.
    let trace_id = if trace_id.len() == 16 {
        format!("{trace_id:0>32}")
    } else {
        trace_id
    };
    let context = SpanContext::new(trace_id, span_id.trim().to_ascii_lowercase(), sampled);
    context.is_valid().then_some(context)
}
