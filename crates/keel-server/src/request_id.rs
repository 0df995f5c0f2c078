use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use http::header::HeaderName;
use http::{HeaderMap, HeaderValue};
use keel_core::RequestContext;

use crate::client_ip::client_ip;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Longest inbound id that is trusted as-is
const MAX_REQUEST_ID_LEN: usize = 128;

/// Establish the request id and create the [`RequestContext`]
///
/// Reuses a sane inbound `X-Request-ID`, otherwise generates a UUID. The id
/// is echoed on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = inbound_request_id(request.headers()).unwrap_or_else(generate);

    let context = RequestContext::new(
        request_id.clone(),
        request.method().clone(),
        request.uri().path(),
        client_ip(&request),
    );

    let value = HeaderValue::try_from(request_id.as_str()).ok();
    if let Some(value) = &value {
        request.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
    }
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;
    if let Some(value) = value {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// Outermost guard for responses produced before the request id stage
///
/// Never builds a context; only makes sure the header is present.
pub async fn ensure_request_id_middleware(request: Request, next: Next) -> Response {
    let inbound = inbound_request_id(request.headers());
    let mut response = next.run(request).await;

    if !response.headers().contains_key(REQUEST_ID_HEADER)
        && let Ok(value) = HeaderValue::try_from(inbound.unwrap_or_else(generate))
    {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

fn inbound_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
}

fn generate() -> String {
    uuid::Uuid::new_v4().to_string()
}
