//! Storage error types for the parameter store abstraction.

use std::fmt;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested row was not found.
    #[error("Parameter not found: {id}")]
    NotFound {
        /// The ID of the row that was not found.
        id: String,
    },

    /// Attempted to insert a row whose ID already exists.
    #[error("Parameter already exists: {id}")]
    AlreadyExists {
        /// The ID of the row that already exists.
        id: String,
    },

    /// The `(parent_id, key)` pair is already taken by another row.
    #[error("Duplicate parameter key '{key}' for parent {parent_id}")]
    DuplicateKey {
        /// The parent the key is scoped to.
        parent_id: String,
        /// The conflicting key.
        key: String,
    },

    /// The row may not be deleted (e.g. it is still referenced elsewhere).
    #[error("Delete precondition failed for {id}: {reason}")]
    PreconditionFailed {
        /// The row ID.
        id: String,
        /// Why the precondition failed.
        reason: String,
    },

    /// A write would break an invariant of the row.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Description of the violated invariant.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    /// Creates a new `DuplicateKey` error.
    #[must_use]
    pub fn duplicate_key(parent_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            parent_id: parent_id.into(),
            key: key.into(),
        }
    }

    /// Creates a new `PreconditionFailed` error.
    #[must_use]
    pub fn precondition_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidParameter` error.
    #[must_use]
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a duplicate key or duplicate ID error.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. } | Self::AlreadyExists { .. })
    }

    /// Returns `true` if the delete precondition blocked the operation.
    #[must_use]
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } | Self::DuplicateKey { .. } => ErrorCategory::Conflict,
            Self::PreconditionFailed { .. } => ErrorCategory::Precondition,
            Self::InvalidParameter { .. } => ErrorCategory::Validation,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<paramsync_core::CoreError> for StorageError {
    fn from(err: paramsync_core::CoreError) -> Self {
        Self::invalid_parameter(err.to_string())
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Row not found.
    NotFound,
    /// Conflict (duplicate ID or key).
    Conflict,
    /// Delete precondition.
    Precondition,
    /// Validation error.
    Validation,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Precondition => write!(f, "precondition"),
            Self::Validation => write!(f, "validation"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
