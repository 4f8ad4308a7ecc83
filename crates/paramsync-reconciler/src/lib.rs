//! Resource state reconciliation for parameter mirrors.
//!
//! A [`Reconciler`] compares the parameters stored locally for a parent
//! resource with the control plane's live view and applies the difference
//! under a per-owner scope lock. User-initiated changes go through
//! [`ParameterUpdater`], which moves the row to `updating` and hands the new
//! value to the task execution system via [`TaskDispatcher`].
//!
//! [`SyncEngine`] wires these pieces together from a [`ReconcilerConfig`];
//! [`SyncScheduler`] drives periodic passes.

pub mod compare;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod lock;
pub mod observability;
pub mod reconciler;
pub mod result;
pub mod scheduler;
pub mod scope;
pub mod source;
pub mod update;

pub use compare::{ParameterPartitions, Partitions, SyncIdentity, compare_sets};
pub use config::{DispatchSettings, LoggingConfig, ReconcilerConfig, SyncSettings};
pub use dispatch::{
    ChannelExecutor, DispatchError, DynTaskExecutor, PARAMETER_UPDATE_TASK, TaskDescriptor,
    TaskDispatcher, TaskExecutor, TaskHandle, TaskOutcome,
};
pub use engine::SyncEngine;
pub use error::{ErrorCategory, ReconcileError, Result};
pub use lock::{LockCoordinator, LockGuard, LockKey};
pub use reconciler::{Reconciler, needs_update};
pub use result::{OutcomeCounter, RowFailure, SyncCategory, SyncResult};
pub use scheduler::{ParentSync, SyncScheduler};
pub use scope::ScopeResolver;
pub use source::{DynExternalViewSource, ExternalViewSource};
pub use update::{ParameterUpdater, UpdateOutcome, UpdateRequest};
