use axum::body::Bytes;
use axum::response::{IntoResponse, Response};
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use http::{HeaderValue, StatusCode};
use keel_core::HttpError;
use serde::Serialize;

use crate::formatter::error_response;

/// Response shape chosen when a route is registered
pub trait Envelope<O>: Clone + Send + Sync + 'static {
    /// Shape a successful handler result
    fn respond(&self, output: O) -> Response;
}

/// JSON body with a fixed success status
#[derive(Debug, Clone, Copy)]
pub struct JsonBody {
    pub(crate) status: StatusCode,
}

impl<O: Serialize> Envelope<O> for JsonBody {
    fn respond(&self, output: O) -> Response {
        match serde_json::to_vec(&output) {
            Ok(body) => (
                self.status,
                [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response body");
                error_response(HttpError::internal())
            }
        }
    }
}

/// Empty `204 No Content`
#[derive(Debug, Clone, Copy)]
pub struct NoContent;

impl Envelope<()> for NoContent {
    fn respond(&self, (): ()) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}

/// Binary download
#[derive(Debug, Clone, Copy)]
pub struct FileBody;

/// Payload of a file response
#[derive(Debug, Clone)]
pub struct FileDownload {
    /// Name offered to the client when saving
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl FileDownload {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

impl Envelope<FileDownload> for FileBody {
    fn respond(&self, output: FileDownload) -> Response {
        let content_type = HeaderValue::try_from(output.content_type.as_str())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
        let disposition = HeaderValue::try_from(format!("attachment; filename=\"{}\"", safe_filename(&output.filename)))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

        (
            StatusCode::OK,
            [(CONTENT_TYPE, content_type), (CONTENT_DISPOSITION, disposition)],
            output.bytes,
        )
            .into_response()
    }
}

/// Filename that fits in a quoted header parameter
fn safe_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
