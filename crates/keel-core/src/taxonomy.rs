use crate::error::{FieldError, HttpError};
use crate::storage::{StorageError, StorageErrorCode};

/// Error returned by business logic
///
/// Every variant is translated into an [`HttpError`] before it reaches the
/// client; see [`translate`].
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Already shaped for the client
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Raised by the storage collaborator
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Anything else
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether translation hides the underlying cause from the client
    pub fn is_internal(&self) -> bool {
        match self {
            Self::Http(_) => false,
            Self::Storage(err) => err.code() == StorageErrorCode::Other,
            Self::Internal(_) => true,
        }
    }
}

/// Translate any business error into the client-facing taxonomy
///
/// Pure and total: HTTP errors come back unchanged, storage errors follow the
/// fixed template per class, everything else becomes a generic 500.
pub fn translate(err: &AppError) -> HttpError {
    match err {
        AppError::Http(http) => http.clone(),
        AppError::Storage(storage) => translate_storage(storage),
        AppError::Internal(_) => HttpError::internal(),
    }
}

/// Fixed HttpError template for each storage failure class
pub fn translate_storage(err: &StorageError) -> HttpError {
    let column = match err {
        StorageError::Database(failure) => failure.column_name(),
        StorageError::NoRows | StorageError::Unavailable(_) => None,
    };

    match err.code() {
        StorageErrorCode::NotNullViolation => with_field(
            column,
            |c| format!("{c} is required"),
            "a required value is missing",
            "required",
        ),
        StorageErrorCode::ForeignKeyViolation => with_field(
            column,
            |c| format!("referenced {c} does not exist"),
            "referenced record does not exist",
            "references a record that does not exist",
        ),
        StorageErrorCode::CheckViolation => with_field(
            column,
            |c| format!("{c} has an invalid value"),
            "value violates a constraint",
            "invalid value",
        ),
        StorageErrorCode::UniqueViolation => HttpError::bad_request(
            column.map_or_else(
                || "a record with this value already exists".to_owned(),
                |c| format!("a record with this {c} already exists"),
            ),
        ),
        StorageErrorCode::NotFound => HttpError::not_found("resource not found"),
        StorageErrorCode::Other => HttpError::internal(),
    }
}

fn with_field(
    column: Option<String>,
    message: impl FnOnce(&str) -> String,
    fallback: &str,
    field_message: &str,
) -> HttpError {
    match column {
        Some(column) => HttpError::bad_request(message(&column))
            .with_field_errors(vec![FieldError::new(column, field_message)]),
        None => HttpError::bad_request(fallback),
    }
}
