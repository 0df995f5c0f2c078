use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use keel_core::RequestContext;
use tracing::Instrument;
use tracing::field::Empty;

/// Build the per-request logger and run everything downstream inside it
///
/// The logger is a span carrying the request id, method, path, client
/// address and, when tracing is on, the trace ids.
pub async fn request_context_middleware(request: Request, next: Next) -> Response {
    let Some(context) = request.extensions().get::<RequestContext>().cloned() else {
        return next.run(request).await;
    };

    let logger = tracing::info_span!(
        "request",
        request_id = context.request_id(),
        method = %context.method(),
        path = context.path(),
        client_ip = context.client_ip(),
        trace_id = Empty,
        span_id = Empty,
    );

    if let Some(trace) = context.trace() {
        logger.record("trace_id", trace.trace_id.as_str());
        logger.record("span_id", trace.span_id.as_str());
    }

    context.set_logger(logger.clone());

    next.run(request).instrument(logger).await
}
