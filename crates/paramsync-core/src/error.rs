use thiserror::Error;

/// Validation errors for paramsync domain values
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Invalid parameter status: {0}")]
    InvalidStatus(String),

    #[error("Invalid parameter data: {message}")]
    InvalidParameter { message: String },

    #[error("Invalid owner scope: {0}")]
    InvalidScope(String),
}

impl CoreError {
    /// Create a new InvalidId error
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }

    /// Create a new InvalidStatus error
    pub fn invalid_status(status: impl Into<String>) -> Self {
        Self::InvalidStatus(status.into())
    }

    /// Create a new InvalidParameter error
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create a new InvalidScope error
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope(message.into())
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
