//! Registry client errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("registry returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, RegistryError::AlreadyExists(_))
    }

    /// Maps an HTTP status and message from an error body to a typed error.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 => RegistryError::InvalidArgument(message),
            404 => RegistryError::NotFound(message),
            409 => RegistryError::AlreadyExists(message),
            412 => RegistryError::FailedPrecondition(message),
            _ => RegistryError::Status { status, message },
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
