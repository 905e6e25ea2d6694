//! Error classification for store operations.
//!
//! Backends report raw failures ([`BackendError`]); the client turns every one of
//! them into a [`StoreError`] whose [`ErrorKind`] callers can branch on. Nothing
//! here retries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Classified failure surfaced by the document store client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document already exists: {0}")]
    Conflict(String),

    #[error("document was modified concurrently: {0}")]
    PreconditionFailed(String),

    #[error("invalid document: {0}")]
    Validation(String),

    /// An identifier was supplied without the partition key needed to address it.
    #[error("partition key is required to address a document")]
    MissingPartitionKey,

    #[error("{operation} exceeded its deadline")]
    Timeout { operation: &'static str },

    #[error("{operation} was cancelled")]
    Cancelled { operation: &'static str },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected store failure: {0}")]
    Unknown(String),
}

/// Stable classification of [`StoreError`], one per distinct caller reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    PreconditionFailed,
    ValidationError,
    Timeout,
    Unavailable,
    Unknown,
}

impl ErrorKind {
    /// Transport status code for this kind; distinct per kind.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::PreconditionFailed => 412,
            ErrorKind::ValidationError => 400,
            ErrorKind::Timeout => 504,
            ErrorKind::Unavailable => 503,
            ErrorKind::Unknown => 500,
        }
    }
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Conflict(_) => ErrorKind::Conflict,
            StoreError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            StoreError::Validation(_) | StoreError::MissingPartitionKey => {
                ErrorKind::ValidationError
            }
            StoreError::Timeout { .. } | StoreError::Cancelled { .. } => ErrorKind::Timeout,
            StoreError::Unavailable(_) => ErrorKind::Unavailable,
            StoreError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Classifies a raw backend failure for the given operation and target.
    pub fn from_backend(operation: &'static str, target: &str, err: BackendError) -> Self {
        match err {
            BackendError::Status { code, message } => match code {
                404 => StoreError::NotFound(target.to_string()),
                409 => StoreError::Conflict(target.to_string()),
                412 => StoreError::PreconditionFailed(target.to_string()),
                400 | 422 => StoreError::Validation(message),
                408 | 504 => StoreError::Timeout { operation },
                429 | 503 => StoreError::Unavailable(format!(
                    "{operation} on {target}: status {code}: {message}"
                )),
                _ => StoreError::Unknown(format!(
                    "{operation} on {target}: status {code}: {message}"
                )),
            },
            BackendError::Transport(message) => {
                StoreError::Unavailable(format!("{operation} on {target}: {message}"))
            }
            BackendError::TimedOut => StoreError::Timeout { operation },
            BackendError::Malformed(message) => {
                StoreError::Unknown(format!("{operation} on {target}: {message}"))
            }
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Validation(err.to_string())
    }
}

/// Raw failure reported by a backend, before classification.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The store answered with a non-success status.
    #[error("status {code}: {message}")]
    Status { code: u16, message: String },

    /// The store could not be reached.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The store did not answer within its own network timeout.
    #[error("store did not respond in time")]
    TimedOut,

    /// The store answered with something that could not be decoded.
    #[error("malformed store response: {0}")]
    Malformed(String),
}

impl BackendError {
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        BackendError::Status {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::status(404, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::status(409, message)
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::status(412, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::status(400, message)
    }
}
