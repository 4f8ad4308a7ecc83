//! User-initiated parameter changes.
//!
//! The new value is written locally together with the move to `updating`,
//! then a task carrying the same value is handed to the execution system.
//! The update holds the owner's scope lock and the row's entity lock, the
//! same pair a sync pass takes, so the two never interleave on one row.

use paramsync_core::{ChildParameter, ParameterStatus};
use paramsync_storage::DynParameterStore;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::dispatch::{PARAMETER_UPDATE_TASK, TaskDispatcher, TaskHandle, TaskOutcome};
use crate::error::{ReconcileError, Result};
use crate::lock::LockCoordinator;
use crate::scope::ScopeResolver;

/// Body of an update request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub value: Option<String>,
}

impl UpdateRequest {
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The propagation task was accepted.
    Dispatched(TaskHandle),
    /// The row is `updating` but no task is running for it.
    Stalled { reason: String },
}

impl UpdateOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Self::Dispatched(_))
    }
}

#[derive(Clone)]
pub struct ParameterUpdater {
    store: DynParameterStore,
    locks: LockCoordinator,
    scopes: ScopeResolver,
    dispatcher: TaskDispatcher,
}

impl ParameterUpdater {
    pub fn new(
        store: DynParameterStore,
        locks: LockCoordinator,
        scopes: ScopeResolver,
        dispatcher: TaskDispatcher,
    ) -> Self {
        Self {
            store,
            locks,
            scopes,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &TaskDispatcher {
        &self.dispatcher
    }

    pub async fn update(&self, parameter_id: &str, request: UpdateRequest) -> Result<UpdateOutcome> {
        let row = self.load(parameter_id).await?;

        let value = request
            .value
            .ok_or_else(|| ReconcileError::missing_parameter("value"))?;
        if !row.modifiable {
            return Err(ReconcileError::not_modifiable(&row.name));
        }

        let scope = self.scopes.scope_for_parameter(&row).await?;
        let _scope_guard = self.locks.lock_scope(&scope).await;
        let _guard = self.locks.lock_entity(&row.id).await;

        // Re-read under the lock; the row may have changed while we waited.
        let row = self.load(parameter_id).await?;
        if self.dispatcher.enforces_single_task()
            && let Some(task_id) = &row.active_task_id
        {
            return Err(ReconcileError::TaskSlotOccupied {
                parameter_id: row.id.clone(),
                task_id: task_id.clone(),
            });
        }

        let to_updating = |mut current: ChildParameter| {
            current.value = value.clone();
            current.status = ParameterStatus::Updating;
            current.status_reason = None;
            current
        };
        let row = self.store.update_fields(&row, &to_updating).await?;

        let mut parameters = serde_json::Map::new();
        parameters.insert(row.name.clone(), serde_json::Value::String(value));
        let params = serde_json::json!({ "parameters": parameters });

        match self
            .dispatcher
            .dispatch(&row, PARAMETER_UPDATE_TASK, params, None)
            .await
        {
            Ok(handle) => {
                info!(parameter_id = %row.id, name = %row.name, task_id = %handle.task_id, "Parameter update dispatched");
                Ok(UpdateOutcome::Dispatched(handle))
            }
            Err(err @ ReconcileError::TaskSlotOccupied { .. }) => Err(err),
            Err(err) => {
                let reason = err.to_string();
                error!(parameter_id = %row.id, name = %row.name, error = %err, "Failed to dispatch parameter update");

                let stall = |mut current: ChildParameter| {
                    current.status_reason = Some(reason.clone());
                    current
                };
                self.store.update_fields(&row, &stall).await?;
                Ok(UpdateOutcome::Stalled { reason })
            }
        }
    }

    /// Records the result of a previously dispatched update task.
    pub async fn complete_update(
        &self,
        parameter_id: &str,
        task_id: &str,
        outcome: TaskOutcome,
    ) -> Result<ChildParameter> {
        let _guard = self.locks.lock_entity(parameter_id).await;
        self.dispatcher.complete(parameter_id, task_id, outcome).await
    }

    async fn load(&self, parameter_id: &str) -> Result<ChildParameter> {
        self.store
            .get(parameter_id)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(parameter_id.to_string()))
    }
}
