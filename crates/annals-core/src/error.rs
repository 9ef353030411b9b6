//! Error types for annals-core

use thiserror::Error;

/// Result type alias for annals operations
pub type Result<T> = std::result::Result<T, AnnalsError>;

/// Main error type for annals operations
#[derive(Error, Debug)]
pub enum AnnalsError {
    /// Rejected input; nothing was written
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unknown event or user
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backing store unreachable or write failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Artifact write/delete failure on the upload area
    #[error("IO error: {0}")]
    Io(String),
}

/// Coarse classification shared by every failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Storage,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Storage => "storage",
            ErrorKind::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AnnalsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnnalsError::Validation(_) => ErrorKind::Validation,
            AnnalsError::NotFound(_) => ErrorKind::NotFound,
            AnnalsError::Storage(_) => ErrorKind::Storage,
            AnnalsError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn event_not_found(id: i64) -> Self {
        AnnalsError::NotFound(format!("event {}", id))
    }

    pub fn user_not_found(id: i64) -> Self {
        AnnalsError::NotFound(format!("user {}", id))
    }
}

/// Validation-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required field absent or blank
    #[error("missing field: {0}")]
    MissingField(String),

    /// created_by does not name an existing user
    #[error("invalid creator")]
    InvalidCreator,

    /// updated_by does not name an existing user
    #[error("invalid updater")]
    InvalidUpdater,

    /// Date not in YYYY-MM-DD form
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Upload extension outside the allowed set
    #[error("file type not allowed: {0:?}")]
    DisallowedExtension(String),

    /// Username already taken
    #[error("username already exists: {0}")]
    DuplicateUsername(String),

    /// Anything else the caller supplied that cannot be used
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<rusqlite::Error> for AnnalsError {
    fn from(err: rusqlite::Error) -> Self {
        AnnalsError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for AnnalsError {
    fn from(err: std::io::Error) -> Self {
        AnnalsError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AnnalsError {
    fn from(err: serde_json::Error) -> Self {
        AnnalsError::Storage(format!("serialization: {}", err))
    }
}
