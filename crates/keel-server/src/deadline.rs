use std::time::Duration;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use http::StatusCode;
use keel_core::{ErrorCode, HttpError};

use crate::formatter::error_response;

/// Message sent when a request runs out of time
pub const TIMEOUT_MESSAGE: &str = "request timed out";

/// Bound the whole downstream chain by `deadline`
///
/// On expiry the in-flight future is dropped, which cancels any I/O it was
/// awaiting.
pub async fn deadline_middleware(deadline: Duration, request: Request, next: Next) -> Response {
    match tokio::time::timeout(deadline, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(deadline = ?deadline, "request deadline exceeded");
            error_response(timeout_error())
        }
    }
}

pub(crate) fn timeout_error() -> HttpError {
    HttpError::overridden(ErrorCode::InternalServerError, StatusCode::SERVICE_UNAVAILABLE, TIMEOUT_MESSAGE)
}
