//! Error types for the driven crate.

use thiserror::Error;

/// Errors that can occur when talking to a Drive backend through the facade.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Not authenticated: call authenticate() first")]
    NotAuthenticated,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

/// Coarse classification of a [`DriveError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotAuthenticated,
    AuthenticationFailed,
    NotFound,
    RemoteFailure,
    InvalidArgument,
}

impl DriveError {
    /// Map this error onto its [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriveError::NotAuthenticated => ErrorKind::NotAuthenticated,
            DriveError::AuthenticationFailed(_) | DriveError::JwtError(_) => {
                ErrorKind::AuthenticationFailed
            }
            DriveError::NotFound(_) => ErrorKind::NotFound,
            DriveError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            DriveError::HttpError(_)
            | DriveError::ApiError { .. }
            | DriveError::Io(_)
            | DriveError::Json(_)
            | DriveError::TaskFailed(_) => ErrorKind::RemoteFailure,
        }
    }

    /// Re-label a failure that happened while obtaining a session.
    pub(crate) fn into_auth_failure(self) -> DriveError {
        match self {
            DriveError::AuthenticationFailed(_) => self,
            other => DriveError::AuthenticationFailed(other.to_string()),
        }
    }
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
