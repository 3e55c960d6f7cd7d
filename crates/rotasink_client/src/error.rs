//! Error types for store clients.

use std::io;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors reported by an object-store or blob-store client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The bucket, container or object already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The bucket, container or object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service rejected the request.
    #[error("service error: {0}")]
    Service(String),

    /// Reading the request body or talking to the service failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Creates a service error.
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service(message.into())
    }

    /// Returns true if the error means the target already exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClientError::AlreadyExists(_))
    }

    /// Returns true if the error means the target is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}
