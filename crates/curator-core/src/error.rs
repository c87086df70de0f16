//! Error types for the curator sync engine.

use thiserror::Error;

/// Result type alias using curator's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// PostgREST error code for a row-level-security / privilege rejection.
pub const PERMISSION_DENIED_CODE: &str = "42501";

/// Core error type for curator operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed before a response was received
    #[error("Request error: {0}")]
    Request(String),

    /// The cloud service answered with a non-success status
    #[error("Cloud error ({status}): {message}")]
    Cloud {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Authentication failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (authenticated but not authorized)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error carries a permission-denied signature.
    ///
    /// Matches authorization statuses, the PostgREST privilege code, and
    /// policy-rejection messages surfaced by the cloud service.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Error::Unauthorized(_) | Error::Forbidden(_) => true,
            Error::Cloud {
                status,
                code,
                message,
            } => {
                *status == 401
                    || *status == 403
                    || code.as_deref() == Some(PERMISSION_DENIED_CODE)
                    || message_signals_permission_denied(message)
            }
            other => message_signals_permission_denied(&other.to_string()),
        }
    }
}

fn message_signals_permission_denied(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("permission denied") || lower.contains("row-level security")
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
