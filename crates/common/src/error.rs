//! Common error types for the Model Manager client
//!
//! Construction of request values fails with [`ModelManagerError::Validation`],
//! parsing of backend payloads fails with [`ModelManagerError::Deserialization`].
//! All errors are convertible to gRPC status codes so a transport can surface
//! them without its own mapping table.

use thiserror::Error;

/// Main error type for the Model Manager client
#[derive(Error, Debug)]
pub enum ModelManagerError {
    /// Malformed or inconsistent caller input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backend payload does not match the canonical response shape
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModelManagerError {
    /// Convert error to gRPC status code
    pub fn to_status(&self) -> tonic::Status {
        match self {
            ModelManagerError::Validation(msg) => {
                tonic::Status::invalid_argument(format!("Validation error: {}", msg))
            }
            ModelManagerError::Deserialization(msg) => {
                tonic::Status::internal(format!("Deserialization error: {}", msg))
            }
            ModelManagerError::Config(msg) => {
                tonic::Status::failed_precondition(format!("Configuration error: {}", msg))
            }
            ModelManagerError::Io(err) => tonic::Status::internal(format!("I/O error: {}", err)),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        ModelManagerError::Validation(msg.into())
    }

    /// Create a deserialization error
    pub fn deserialization(msg: impl Into<String>) -> Self {
        ModelManagerError::Deserialization(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        ModelManagerError::Config(msg.into())
    }

    /// True for errors on caller-supplied input
    pub fn is_validation(&self) -> bool {
        matches!(self, ModelManagerError::Validation(_))
    }

    /// True for errors on backend payloads
    pub fn is_deserialization(&self) -> bool {
        matches!(self, ModelManagerError::Deserialization(_))
    }
}

/// Result type alias for Model Manager operations
pub type Result<T> = std::result::Result<T, ModelManagerError>;
