use http::StatusCode;
use serde::Serialize;

/// Message returned for every internal failure
///
/// The underlying cause is only ever written to server-side logs.
pub const GENERIC_INTERNAL_MESSAGE: &str = "an internal error occurred";

/// Stable machine-readable error codes exposed to API consumers
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::IntoStaticStr, strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed input that could not be bound
    BadRequest,
    /// Input bound but failed field-level rules
    ValidationError,
    /// Missing or invalid credentials
    Unauthorized,
    /// Authenticated but not allowed
    Forbidden,
    /// Resource or route does not exist
    NotFound,
    /// Client exceeded the request rate
    RateLimited,
    /// Catch-all for anything unexpected
    InternalServerError,
}

impl ErrorCode {
    /// Status code implied by this error code
    pub const fn status(self) -> StatusCode {
        match self {
            Self::BadRequest | Self::ValidationError => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message used when an error carries no message of its own
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::BadRequest => "bad request",
            Self::ValidationError => "validation failed",
            Self::Unauthorized => "authentication required",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::RateLimited => "rate limit exceeded",
            Self::InternalServerError => GENERIC_INTERNAL_MESSAGE,
        }
    }
}

/// A single failing field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field path, e.g. `address.zip` or `items[1].sku`
    pub field: String,
    /// Human-readable rule failure
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Hint telling the client what to do next
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    /// Kind of action, e.g. `redirect`
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Human-readable explanation
    pub message: String,
    /// Action target (URL for redirects)
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Redirect,
}

/// Canonical error crossing the HTTP boundary
///
/// Serializes to `{code, message, errors?, action?}`. The status code travels
/// next to the body rather than inside it. Values are built once at the point
/// of failure and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct HttpError {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<Action>,
    #[serde(skip)]
    status: StatusCode,
    #[serde(skip)]
    overridden: bool,
}

impl HttpError {
    /// Build an error whose status is derived from its code
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            errors: Vec::new(),
            action: None,
            status: code.status(),
            overridden: false,
        }
    }

    /// Build an error with an explicit status and message the formatter keeps as-is
    pub fn overridden(code: ErrorCode, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            overridden: true,
            status,
            ..Self::new(code, message)
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Field-level validation failure
    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self {
            errors,
            ..Self::new(ErrorCode::ValidationError, ErrorCode::ValidationError.default_message())
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn rate_limited() -> Self {
        Self::new(ErrorCode::RateLimited, ErrorCode::RateLimited.default_message())
    }

    /// Generic internal error, never carrying the underlying cause
    pub fn internal() -> Self {
        Self::new(ErrorCode::InternalServerError, GENERIC_INTERNAL_MESSAGE)
    }

    /// Attach field errors to a bad-request style error
    #[must_use]
    pub fn with_field_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.errors = errors;
        self
    }

    /// Attach a client action hint
    #[must_use]
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field_errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub const fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    pub const fn status(&self) -> StatusCode {
        self.status
    }

    pub const fn is_overridden(&self) -> bool {
        self.overridden
    }

    /// Final shape written to the client
    ///
    /// Overridden errors pass through untouched. Everything else gets its
    /// status re-derived from the code, an empty message replaced by the
    /// code's default, and internal errors reduced to the generic message.
    #[must_use]
    pub fn normalized(self) -> Self {
        if self.overridden {
            return self;
        }

        let status = self.code.status();
        let message = if self.code == ErrorCode::InternalServerError {
            GENERIC_INTERNAL_MESSAGE.to_owned()
        } else if self.message.is_empty() {
            self.code.default_message().to_owned()
        } else {
            self.message
        };

        Self {
            status,
            message,
            ..self
        }
    }
}
