use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use http::HeaderMap;
use http::header::HeaderName;
use keel_core::{HttpError, RequestContext, TraceIds};
use opentelemetry::propagation::Extractor;
use opentelemetry::trace::TraceContextExt;
use tower_http::trace::MakeSpan;
use tracing::Span;
use tracing::field::Empty;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Opens the server span, continuing an inbound W3C trace when present
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &http::Request<B>) -> Span {
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map_or_else(|| request.uri().path(), MatchedPath::as_str);

        // the layer falls back to the current OTel context when the span has no tracing parent
        let parent =
            opentelemetry::global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(request.headers())));
        let _attached = parent.attach();

        tracing::info_span!(
            "http.request",
            otel.name = %format!("{} {route}", request.method()),
            otel.kind = "server",
            otel.status_code = Empty,
            http.route = route,
            http.request.method = Empty,
            http.response.status_code = Empty,
            url.path = Empty,
            client.address = Empty,
            enduser.id = Empty,
            error.code = Empty,
            error.message = Empty,
        )
    }
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(HeaderName::as_str).collect()
    }
}

/// Record request and outcome attributes on the current span
///
/// Trace ids are copied into the [`RequestContext`] only when the span is
/// exported, so their absence means tracing is off.
pub async fn trace_enrichment_middleware(request: Request, next: Next) -> Response {
    let span = Span::current();
    let context = request.extensions().get::<RequestContext>().cloned();

    span.record("http.request.method", request.method().as_str());
    span.record("url.path", request.uri().path());

    if let Some(context) = &context {
        span.record("client.address", context.client_ip());

        let otel_context = span.context();
        let span_context = otel_context.span().span_context().clone();
        if span_context.is_valid() {
            context.set_trace(TraceIds {
                trace_id: span_context.trace_id().to_string(),
                span_id: span_context.span_id().to_string(),
            });
        }
    }

    let response = next.run(request).await;

    span.record("http.response.status_code", response.status().as_u16());

    if let Some(user_id) = context.as_ref().and_then(RequestContext::user_id) {
        span.record("enduser.id", user_id);
    }

    if let Some(err) = response.extensions().get::<HttpError>() {
        let code: &'static str = err.code().into();
        span.record("error.code", code);
        span.record("error.message", err.message());

        if err.status().is_server_error() {
            span.record("otel.status_code", "ERROR");
        }
    }

    response
}
