use std::sync::Arc;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use http::HeaderValue;
use http::header::RETRY_AFTER;
use keel_core::{HttpError, Observability};
use keel_ratelimit::{RateLimitError, RequestLimiter};

use crate::client_ip::client_ip;
use crate::formatter::error_response;

/// Event recorded for every rejected request
pub const RATE_LIMIT_HIT: &str = "rate_limit.hit";

/// Shared state of the rate limiting stage
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RequestLimiter>,
    pub observability: Arc<dyn Observability>,
}

/// Fixed-window rate limiting keyed by client address
///
/// Runs before any request context exists. A failing counter backend lets
/// the request through.
pub async fn rate_limit_middleware(state: RateLimitState, request: Request, next: Next) -> Response {
    let client = client_ip(&request);

    match state.limiter.check(&client).await {
        Ok(()) => next.run(request).await,
        Err(RateLimitError::Exceeded { retry_after }) => {
            let endpoint = request
                .extensions()
                .get::<MatchedPath>()
                .map_or_else(|| request.uri().path().to_string(), |p| p.as_str().to_string());

            tracing::warn!(client = %client, endpoint = %endpoint, retry_after, "rate limit exceeded");
            state.observability.record_event(RATE_LIMIT_HIT, &[("endpoint", endpoint)]);

            rate_limit_response(retry_after)
        }
        Err(e) => {
            tracing::error!(error = %e, "rate limiter unavailable, allowing request");
            next.run(request).await
        }
    }
}

fn rate_limit_response(retry_after: u64) -> Response {
    let mut response = error_response(HttpError::rate_limited());

    if let Ok(val) = HeaderValue::try_from(retry_after.to_string()) {
        response.headers_mut().insert(RETRY_AFTER, val);
    }

    response
}
