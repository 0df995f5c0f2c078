use axum::response::Response;
use http::StatusCode;
use keel_core::{ErrorCode, HttpError};

use crate::formatter::error_response;

/// Unknown path
pub async fn not_found() -> Response {
    error_response(HttpError::not_found("route not found"))
}

/// Known path, unsupported method
pub async fn method_not_allowed() -> Response {
    error_response(HttpError::overridden(
        ErrorCode::BadRequest,
        StatusCode::METHOD_NOT_ALLOWED,
        "method not allowed",
    ))
}
