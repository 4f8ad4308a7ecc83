//! Hand-off of follow-up work to the external task execution system.
//!
//! A parameter may have at most one outstanding task. The slot lives on the
//! row itself (`active_task_id`) and is claimed through the store's atomic
//! read-modify-write, so two concurrent dispatches for the same row cannot
//! both win.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use paramsync_core::{ChildParameter, ParameterStatus, generate_id, now_utc};
use paramsync_storage::DynParameterStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{ReconcileError, Result};

/// Task kind used to push a changed parameter value to the control plane.
pub const PARAMETER_UPDATE_TASK: &str = "ElasticcacheParameterUpdateTask";

/// Errors reported by a [`TaskExecutor`]
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Task {kind} rejected: {reason}")]
    Rejected { kind: String, reason: String },

    #[error("Task executor unavailable: {0}")]
    Unavailable(String),

    #[error("Task channel closed")]
    ChannelClosed,
}

/// Description of a unit of work submitted to the execution system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_id: String,
    pub kind: String,
    pub target_id: String,
    pub params: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Reference to a submitted task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub task_id: String,
    pub kind: String,
    pub target_id: String,
}

impl From<&TaskDescriptor> for TaskHandle {
    fn from(task: &TaskDescriptor) -> Self {
        Self {
            task_id: task.task_id.clone(),
            kind: task.kind.clone(),
            target_id: task.target_id.clone(),
        }
    }
}

/// Result reported back by the execution system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    Succeeded { value: String },
    Failed { reason: String },
}

/// The external task execution system.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn submit(&self, task: TaskDescriptor) -> std::result::Result<TaskHandle, DispatchError>;
}

pub type DynTaskExecutor = Arc<dyn TaskExecutor>;

/// Executor that queues descriptors on a bounded tokio channel.
///
/// A worker pool drains the receiving end and reports results through
/// [`TaskDispatcher::complete`].
#[derive(Clone)]
pub struct ChannelExecutor {
    tx: mpsc::Sender<TaskDescriptor>,
}

impl ChannelExecutor {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TaskDescriptor>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TaskExecutor for ChannelExecutor {
    async fn submit(&self, task: TaskDescriptor) -> std::result::Result<TaskHandle, DispatchError> {
        let handle = TaskHandle::from(&task);
        self.tx.try_send(task).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                DispatchError::Unavailable("task queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => DispatchError::ChannelClosed,
        })?;
        Ok(handle)
    }
}

/// Creates tasks for parameters and tracks the per-row task slot
#[derive(Clone)]
pub struct TaskDispatcher {
    store: DynParameterStore,
    executor: DynTaskExecutor,
    enforce_single_task: bool,
}

impl TaskDispatcher {
    pub fn new(store: DynParameterStore, executor: DynTaskExecutor) -> Self {
        Self {
            store,
            executor,
            enforce_single_task: true,
        }
    }

    pub fn with_single_task(mut self, enforce: bool) -> Self {
        self.enforce_single_task = enforce;
        self
    }

    pub fn enforces_single_task(&self) -> bool {
        self.enforce_single_task
    }

    /// Submits a task of `kind` targeting `target`.
    ///
    /// The row's task slot is claimed before submission and released again
    /// if the executor refuses the task.
    pub async fn dispatch(
        &self,
        target: &ChildParameter,
        kind: &str,
        params: serde_json::Value,
        parent_task_id: Option<String>,
    ) -> Result<TaskHandle> {
        let task_id = generate_id();
        self.claim_slot(target, &task_id).await?;

        let task = TaskDescriptor {
            task_id: task_id.clone(),
            kind: kind.to_string(),
            target_id: target.id.clone(),
            params,
            parent_task_id,
            created_at: now_utc(),
        };

        match self.executor.submit(task).await {
            Ok(handle) => {
                info!(
                    task_id = %handle.task_id,
                    kind = %handle.kind,
                    target_id = %handle.target_id,
                    "Task dispatched"
                );
                Ok(handle)
            }
            Err(err) => {
                if let Err(release_err) = self.release_slot(target, &task_id).await {
                    warn!(
                        target_id = %target.id,
                        task_id = %task_id,
                        error = %release_err,
                        "Failed to release task slot after rejected dispatch"
                    );
                }
                Err(err.into())
            }
        }
    }

    /// Applies a task result reported by the execution system.
    ///
    /// Both outcomes return the row to `ready` and free the task slot. A
    /// success stores the value the execution system applied; a failure
    /// keeps the local value until the next sync pass mirrors the control
    /// plane again.
    pub async fn complete(
        &self,
        target_id: &str,
        task_id: &str,
        outcome: TaskOutcome,
    ) -> Result<ChildParameter> {
        let row = self
            .store
            .get(target_id)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(target_id.to_string()))?;

        let mismatch = || ReconcileError::TaskMismatch {
            parameter_id: target_id.to_string(),
            task_id: task_id.to_string(),
        };
        if row.active_task_id.as_deref() != Some(task_id) {
            return Err(mismatch());
        }

        let applied = AtomicBool::new(false);
        let mutator = |mut current: ChildParameter| {
            let owns_slot = current.active_task_id.as_deref() == Some(task_id);
            applied.store(owns_slot, Ordering::SeqCst);
            if !owns_slot {
                return current;
            }
            match &outcome {
                TaskOutcome::Succeeded { value } => {
                    current.value = value.clone();
                    current.status_reason = None;
                }
                TaskOutcome::Failed { reason } => {
                    current.status_reason = Some(reason.clone());
                }
            }
            current.status = ParameterStatus::Ready;
            current.active_task_id = None;
            current
        };
        let stored = self.store.update_fields(&row, &mutator).await?;

        if !applied.load(Ordering::SeqCst) {
            return Err(mismatch());
        }

        match &outcome {
            TaskOutcome::Succeeded { .. } => {
                info!(target_id = %target_id, task_id = %task_id, "Task completed");
            }
            TaskOutcome::Failed { reason } => {
                warn!(target_id = %target_id, task_id = %task_id, reason = %reason, "Task failed");
            }
        }
        Ok(stored)
    }

    async fn claim_slot(&self, target: &ChildParameter, task_id: &str) -> Result<()> {
        let enforce = self.enforce_single_task;
        let claim = |mut current: ChildParameter| {
            if current.active_task_id.is_none() || !enforce {
                current.active_task_id = Some(task_id.to_string());
            }
            current
        };
        let stored = self.store.update_fields(target, &claim).await?;

        match stored.active_task_id {
            Some(ref active) if active == task_id => {
                debug!(target_id = %target.id, task_id = %task_id, "Task slot claimed");
                Ok(())
            }
            Some(active) => Err(ReconcileError::TaskSlotOccupied {
                parameter_id: target.id.clone(),
                task_id: active,
            }),
            None => Err(ReconcileError::TaskSlotOccupied {
                parameter_id: target.id.clone(),
                task_id: String::new(),
            }),
        }
    }

    async fn release_slot(&self, target: &ChildParameter, task_id: &str) -> Result<()> {
        let release = |mut current: ChildParameter| {
            if current.active_task_id.as_deref() == Some(task_id) {
                current.active_task_id = None;
            }
            current
        };
        self.store.update_fields(target, &release).await?;
        Ok(())
    }
}
