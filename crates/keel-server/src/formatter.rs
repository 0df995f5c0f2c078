use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use keel_core::{AppError, ErrorCode, HttpError, translate};

/// Serialize an error as the JSON envelope with its status code
///
/// The normalized error is also stored in the response extensions so outer
/// stages can attach it to spans and logs.
pub fn error_response(err: HttpError) -> Response {
    let err = err.normalized();
    let mut response = (err.status(), axum::Json(&err)).into_response();
    response.extensions_mut().insert(err);
    response
}

/// Translate a business error and serialize it
///
/// Internal causes are logged here and never reach the client.
pub fn app_error_response(err: &AppError) -> Response {
    if err.is_internal() {
        tracing::error!(error = ?err, "request failed");
    } else {
        tracing::debug!(error = %err, "request rejected");
    }

    error_response(translate(err))
}

/// Marks a response whose error status comes with a deliberate body
///
/// The global formatter leaves such responses untouched.
#[derive(Debug, Clone, Copy)]
pub struct ShapedBody;

/// Exempt `response` from error formatting
pub fn keep_body(mut response: Response) -> Response {
    response.extensions_mut().insert(ShapedBody);
    response
}

/// Global error formatter
///
/// Error responses produced without an [`HttpError`] (framework rejections,
/// hand-written handlers) are rewritten into the JSON envelope unless they
/// are marked with [`ShapedBody`]. Headers such as `Allow` or `Retry-After`
/// are kept.
pub async fn format_errors_middleware(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let status = response.status();
    let extensions = response.extensions();
    if !(status.is_client_error() || status.is_server_error())
        || extensions.get::<HttpError>().is_some()
        || extensions.get::<ShapedBody>().is_some()
    {
        return response;
    }

    let (parts, _) = response.into_parts();
    let mut formatted = error_response(from_status(status));

    for (name, value) in &parts.headers {
        if name != CONTENT_TYPE && name != CONTENT_LENGTH {
            formatted.headers_mut().insert(name.clone(), value.clone());
        }
    }

    formatted
}

/// Taxonomy error for a bare status code
pub(crate) fn from_status(status: StatusCode) -> HttpError {
    match status {
        StatusCode::BAD_REQUEST => HttpError::bad_request(""),
        StatusCode::UNAUTHORIZED => HttpError::unauthorized(""),
        StatusCode::FORBIDDEN => HttpError::forbidden(""),
        StatusCode::NOT_FOUND => HttpError::not_found(""),
        StatusCode::TOO_MANY_REQUESTS => HttpError::rate_limited(),
        s if s.is_server_error() => HttpError::internal(),
        s => HttpError::overridden(
            ErrorCode::BadRequest,
            s,
            s.canonical_reason().unwrap_or("bad request").to_lowercase(),
        ),
    }
}
