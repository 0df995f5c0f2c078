use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use keel_core::RequestContext;

/// Emit one log line per completed request
///
/// Level follows the status: `error` for 5xx, `warn` for 4xx, `info` otherwise.
pub async fn request_logger_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let context = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(RequestContext::empty);

    let response = next.run(request).await;

    let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;
    let status = response.status().as_u16();
    let method = context.method().as_str();
    let path = context.path();
    let request_id = context.request_id();
    let user_id = context.user_id().unwrap_or_default();

    context.logger().in_scope(|| {
        if response.status().is_server_error() {
            tracing::error!(status, latency_ms, method, path, request_id, user_id, "request completed");
        } else if response.status().is_client_error() {
            tracing::warn!(status, latency_ms, method, path, request_id, user_id, "request completed");
        } else {
            tracing::info!(status, latency_ms, method, path, request_id, user_id, "request completed");
        }
    });

    response
}
