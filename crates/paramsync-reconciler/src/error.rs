use std::time::Duration;

use paramsync_core::CoreError;
use paramsync_storage::StorageError;
use thiserror::Error;

use crate::dispatch::DispatchError;

/// Errors raised by reconciliation, dispatch and the user update path
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("External view unavailable for {parent_id}: {message}")]
    ExternalView { parent_id: String, message: String },

    #[error("Parameter not found: {0}")]
    NotFound(String),

    #[error("Parent resource not found: {0}")]
    ParentNotFound(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("{0} is not modifiable")]
    NotModifiable(String),

    #[error("Parameter {parameter_id} already has outstanding task {task_id}")]
    TaskSlotOccupied {
        parameter_id: String,
        task_id: String,
    },

    #[error("Task {task_id} is not the active task of parameter {parameter_id}")]
    TaskMismatch {
        parameter_id: String,
        task_id: String,
    },

    #[error("Task dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Timed out after {waited:?} waiting for lock {key}")]
    LockTimeout { key: String, waited: Duration },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ReconcileError {
    pub fn external_view(parent_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalView {
            parent_id: parent_id.into(),
            message: message.into(),
        }
    }

    pub fn missing_parameter(name: impl Into<String>) -> Self {
        Self::MissingParameter(name.into())
    }

    pub fn not_modifiable(name: impl Into<String>) -> Self {
        Self::NotModifiable(name.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Errors surfaced synchronously to a caller before any state change.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingParameter(_) | Self::NotModifiable(_) | Self::TaskSlotOccupied { .. }
        )
    }

    /// Returns `true` if a delete was blocked by the store's precondition check.
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::Storage(err) if err.is_precondition_failed())
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Storage(err) if err.is_precondition_failed() => ErrorCategory::Precondition,
            Self::Storage(err) if err.is_duplicate() => ErrorCategory::Conflict,
            Self::Storage(err) if err.is_not_found() => ErrorCategory::NotFound,
            Self::Storage(_) => ErrorCategory::Storage,
            Self::ExternalView { .. } | Self::Dispatch(_) => ErrorCategory::Upstream,
            Self::NotFound(_) | Self::ParentNotFound(_) => ErrorCategory::NotFound,
            Self::MissingParameter(_) | Self::NotModifiable(_) | Self::Core(_) => {
                ErrorCategory::Validation
            }
            Self::TaskSlotOccupied { .. } | Self::TaskMismatch { .. } => ErrorCategory::Conflict,
            Self::LockTimeout { .. } => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    Precondition,
    Storage,
    Upstream,
    Timeout,
    Configuration,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Precondition => write!(f, "precondition"),
            Self::Storage => write!(f, "storage"),
            Self::Upstream => write!(f, "upstream"),
            Self::Timeout => write!(f, "timeout"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
