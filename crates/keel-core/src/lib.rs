//! Shared request-processing types for keel
//!
//! Holds the error taxonomy, storage failure classes, validation rules and the
//! per-request context. Kept free of any web framework so collaborators can
//! depend on it directly.

mod context;
mod error;
mod observe;
pub mod storage;
mod taxonomy;
pub mod validation;

pub use context::{Identity, RequestContext, TraceIds};
pub use error::{Action, ActionKind, ErrorCode, FieldError, GENERIC_INTERNAL_MESSAGE, HttpError};
pub use observe::{HealthCheck, NoopObservability, Observability, Phase};
pub use storage::{DatabaseFailure, StorageError, StorageErrorCode, map_storage_code};
pub use taxonomy::{AppError, translate, translate_storage};
pub use validation::{Validate, Validator};
