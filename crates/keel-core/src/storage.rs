//! Storage failure classes and their native code table

/// Closed set of storage failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum StorageErrorCode {
    NotNullViolation,
    ForeignKeyViolation,
    UniqueViolation,
    CheckViolation,
    NotFound,
    Other,
}

/// Native (SQLSTATE) codes with a dedicated class
const NATIVE_CODES: &[(&str, StorageErrorCode)] = &[
    ("23502", StorageErrorCode::NotNullViolation),
    ("23503", StorageErrorCode::ForeignKeyViolation),
    ("23505", StorageErrorCode::UniqueViolation),
    ("23514", StorageErrorCode::CheckViolation),
    ("02000", StorageErrorCode::NotFound),
    ("P0002", StorageErrorCode::NotFound),
];

/// Map a native storage error code to its class
///
/// Total over all inputs: anything outside the table is `Other`.
pub fn map_storage_code(native: &str) -> StorageErrorCode {
    NATIVE_CODES
        .iter()
        .find(|(code, _)| *code == native)
        .map_or(StorageErrorCode::Other, |(_, class)| *class)
}

/// Details reported by the database for a failed statement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseFailure {
    /// Native error code (SQLSTATE)
    pub code: String,
    /// Database-provided message, never shown to clients
    pub message: String,
    pub table: Option<String>,
    pub column: Option<String>,
    pub constraint: Option<String>,
}

impl DatabaseFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    #[must_use]
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    #[must_use]
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    /// Column that caused the failure
    ///
    /// Uses the reported column when present, otherwise derives it from a
    /// constraint named `<table>_<column>_<suffix>`.
    pub fn column_name(&self) -> Option<String> {
        if let Some(column) = self.column.as_deref().filter(|c| !c.is_empty()) {
            return Some(column.to_owned());
        }

        let constraint = self.constraint.as_deref()?;
        let stem = ["_fkey", "_key", "_check", "_not_null"]
            .iter()
            .find_map(|suffix| constraint.strip_suffix(suffix))?;

        let column = match self.table.as_deref() {
            Some(table) => stem.strip_prefix(table)?.strip_prefix('_')?,
            None => stem.rsplit_once('_').map_or(stem, |(_, last)| last),
        };

        (!column.is_empty()).then(|| column.to_owned())
    }
}

/// Errors surfaced by the storage collaborator
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// Query expected a row and found none
    #[error("no rows in result set")]
    NoRows,

    /// Statement rejected by the database
    #[error("database error {}: {}", .0.code, .0.message)]
    Database(DatabaseFailure),

    /// Connection, pool or driver failure outside the statement itself
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Class of this failure
    pub fn code(&self) -> StorageErrorCode {
        match self {
            Self::NoRows => StorageErrorCode::NotFound,
            Self::Database(failure) => map_storage_code(&failure.code),
            Self::Unavailable(_) => StorageErrorCode::Other,
        }
    }
}
