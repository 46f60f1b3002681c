//! W3C Trace Context propagation for outbound HTTP calls.
//!
//! The current span's context is written as `traceparent`/`tracestate`
//! headers so the upstream (or an intermediate proxy) can join the trace.
//!
//! See: https://www.w3.org/TR/trace-context/

use opentelemetry::trace::TraceContextExt as _;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Header name for W3C traceparent
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Header name for W3C tracestate
pub const TRACESTATE_HEADER: &str = "tracestate";

/// Header name for request correlation ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Format the current span as a `traceparent` value, if it is sampled into a
/// valid OpenTelemetry context.
pub fn current_traceparent() -> Option<String> {
    let context = Span::current().context();
    let otel_span = context.span();
    let span_context = otel_span.span_context();

    if !span_context.is_valid() {
        return None;
    }

    // version-trace_id-span_id-trace_flags; version is always "00"
    Some(format!(
        "00-{}-{}-{:02x}",
        span_context.trace_id(),
        span_context.span_id(),
        span_context.trace_flags().to_u8()
    ))
}

/// Write trace context and the optional request id into `headers`.
pub fn inject_trace_headers(headers: &mut HeaderMap, request_id: Option<&str>) {
    if let Some(traceparent) = current_traceparent()
        && let Ok(value) = HeaderValue::from_str(&traceparent)
    {
        headers.insert(TRACEPARENT_HEADER, value);

        let context = Span::current().context();
        let tracestate = context.span().span_context().trace_state().header();
        if !tracestate.is_empty()
            && let Ok(value) = HeaderValue::from_str(&tracestate)
        {
            headers.insert(TRACESTATE_HEADER, value);
        }
    }

    if let Some(id) = request_id
        && let Ok(value) = HeaderValue::from_str(id)
    {
        headers.insert(REQUEST_ID_HEADER, value);
    }
}

/// Extension trait for attaching trace headers to an outbound request.
pub trait TraceContextExt {
    fn with_trace_context(self, request_id: Option<&str>) -> Self;
}

impl TraceContextExt for reqwest::RequestBuilder {
    fn with_trace_context(self, request_id: Option<&str>) -> Self {
        let mut headers = HeaderMap::new();
        inject_trace_headers(&mut headers, request_id);
        self.headers(headers)
    }
}
