#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use paramsync_core::{ChildParameter, ExternalParameterView, OwnerId, ParentResource};
use paramsync_db_memory::{InMemoryParameterStore, SharedMemoryStore, create_memory_store};
use paramsync_reconciler::{
    ChannelExecutor, DispatchError, ExternalViewSource, LockCoordinator, ReconcileError,
    Reconciler, ReconcilerConfig, ScopeResolver, SyncEngine, TaskDescriptor, TaskExecutor,
    TaskHandle,
};
use paramsync_storage::{ParameterMutator, ParameterStore, StorageError};
use tokio::sync::mpsc;

pub const MANAGER: &str = "elasticcacheparameters";

pub fn parent(id: &str, project: &str) -> ParentResource {
    ParentResource::new(id, OwnerId::project(project))
}

pub fn store_with_parents(parents: &[&ParentResource]) -> SharedMemoryStore {
    let store = create_memory_store();
    for p in parents {
        store.register_parent((*p).clone());
    }
    store
}

pub fn scopes(store: &SharedMemoryStore) -> ScopeResolver {
    ScopeResolver::new(MANAGER, store.clone())
}

pub fn reconciler(store: SharedMemoryStore) -> Reconciler {
    let scopes = scopes(&store);
    Reconciler::new(store, LockCoordinator::new(), scopes)
}

pub fn engine(
    store: SharedMemoryStore,
) -> (SyncEngine, mpsc::Receiver<TaskDescriptor>) {
    let (executor, rx) = ChannelExecutor::new(16);
    let engine = SyncEngine::new(
        ReconcilerConfig::default(),
        store.clone(),
        store,
        Arc::new(executor),
    );
    (engine, rx)
}

pub fn view(id: &str, key: &str, value: &str) -> ExternalParameterView {
    ExternalParameterView::new(id, key, value)
}

/// Inserts a row that already mirrors `view`.
pub async fn seed(
    store: &InMemoryParameterStore,
    parent: &ParentResource,
    view: &ExternalParameterView,
) -> ChildParameter {
    store
        .insert(ChildParameter::from_external(parent, view))
        .await
        .expect("seed row")
}

pub async fn rows_by_key(store: &InMemoryParameterStore, parent_id: &str) -> Vec<(String, String)> {
    let mut rows: Vec<(String, String)> = store
        .find_by_parent(parent_id)
        .await
        .expect("find_by_parent")
        .into_iter()
        .map(|row| (row.key, row.value))
        .collect();
    rows.sort();
    rows
}

/// Fixed external view per parent.
#[derive(Default)]
pub struct StaticSource {
    views: Mutex<std::collections::HashMap<String, Vec<ExternalParameterView>>>,
    failing: Mutex<HashSet<String>>,
}

impl StaticSource {
    pub fn set(&self, parent_id: &str, views: Vec<ExternalParameterView>) {
        self.views
            .lock()
            .unwrap()
            .insert(parent_id.to_string(), views);
    }

    pub fn fail_for(&self, parent_id: &str) {
        self.failing.lock().unwrap().insert(parent_id.to_string());
    }
}

#[async_trait]
impl ExternalViewSource for StaticSource {
    async fn fetch_parameters(
        &self,
        parent: &ParentResource,
    ) -> Result<Vec<ExternalParameterView>, ReconcileError> {
        if self.failing.lock().unwrap().contains(&parent.id) {
            return Err(ReconcileError::external_view(&parent.id, "control plane unreachable"));
        }
        Ok(self
            .views
            .lock()
            .unwrap()
            .get(&parent.id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Executor that refuses every task.
pub struct RejectingExecutor;

#[async_trait]
impl TaskExecutor for RejectingExecutor {
    async fn submit(&self, task: TaskDescriptor) -> Result<TaskHandle, DispatchError> {
        Err(DispatchError::Rejected {
            kind: task.kind,
            reason: "worker pool offline".into(),
        })
    }
}

/// Store decorator that fails writes for selected keys.
pub struct FaultyStore {
    pub inner: SharedMemoryStore,
    pub fail_update_keys: HashSet<String>,
    pub fail_insert_keys: HashSet<String>,
    pub fail_find: bool,
}

impl FaultyStore {
    pub fn new(inner: SharedMemoryStore) -> Self {
        Self {
            inner,
            fail_update_keys: HashSet::new(),
            fail_insert_keys: HashSet::new(),
            fail_find: false,
        }
    }
}

#[async_trait]
impl ParameterStore for FaultyStore {
    async fn find_by_parent(&self, parent_id: &str) -> Result<Vec<ChildParameter>, StorageError> {
        if self.fail_find {
            return Err(StorageError::internal("connection reset"));
        }
        self.inner.find_by_parent(parent_id).await
    }

    async fn get(&self, id: &str) -> Result<Option<ChildParameter>, StorageError> {
        self.inner.get(id).await
    }

    async fn insert(&self, row: ChildParameter) -> Result<ChildParameter, StorageError> {
        if self.fail_insert_keys.contains(&row.key) {
            return Err(StorageError::internal(format!("insert of {} failed", row.key)));
        }
        self.inner.insert(row).await
    }

    async fn update_fields(
        &self,
        row: &ChildParameter,
        mutator: ParameterMutator<'_>,
    ) -> Result<ChildParameter, StorageError> {
        if self.fail_update_keys.contains(&row.key) {
            return Err(StorageError::internal(format!("update of {} failed", row.key)));
        }
        self.inner.update_fields(row, mutator).await
    }

    async fn delete(&self, row: &ChildParameter) -> Result<(), StorageError> {
        self.inner.delete(row).await
    }

    async fn delete_precondition(&self, row: &ChildParameter) -> Result<(), StorageError> {
        self.inner.delete_precondition(row).await
    }

    fn backend_name(&self) -> &'static str {
        "faulty-memory"
    }
}
