use std::sync::Arc;

use paramsync_storage::{DynParameterStore, DynParentRegistry};
use tokio::sync::mpsc;

use crate::config::ReconcilerConfig;
use crate::dispatch::{ChannelExecutor, DynTaskExecutor, TaskDescriptor, TaskDispatcher};
use crate::lock::LockCoordinator;
use crate::reconciler::Reconciler;
use crate::scheduler::SyncScheduler;
use crate::scope::ScopeResolver;
use crate::source::DynExternalViewSource;
use crate::update::ParameterUpdater;

/// Wires the reconciler and the update path around one shared lock table.
///
/// Both halves must share the same [`LockCoordinator`], otherwise a sync
/// pass and a user update on the same row would not exclude each other.
#[derive(Clone)]
pub struct SyncEngine {
    config: ReconcilerConfig,
    locks: LockCoordinator,
    reconciler: Reconciler,
    updater: ParameterUpdater,
}

impl SyncEngine {
    pub fn new(
        config: ReconcilerConfig,
        store: DynParameterStore,
        parents: DynParentRegistry,
        executor: DynTaskExecutor,
    ) -> Self {
        let locks = LockCoordinator::new();
        let scopes = ScopeResolver::new(config.sync.manager.clone(), parents);
        let reconciler = Reconciler::new(store.clone(), locks.clone(), scopes.clone())
            .with_lock_timeout(config.sync.lock_timeout());
        let dispatcher = TaskDispatcher::new(store.clone(), executor)
            .with_single_task(config.dispatch.enforce_single_task);
        let updater = ParameterUpdater::new(store, locks.clone(), scopes, dispatcher);

        Self {
            config,
            locks,
            reconciler,
            updater,
        }
    }

    /// Builds an engine whose tasks are queued on a bounded channel of
    /// `dispatch.channel_capacity` slots. The receiver is the worker side.
    pub fn with_channel(
        config: ReconcilerConfig,
        store: DynParameterStore,
        parents: DynParentRegistry,
    ) -> (Self, mpsc::Receiver<TaskDescriptor>) {
        let (executor, tasks) = ChannelExecutor::new(config.dispatch.channel_capacity);
        let engine = Self::new(config, store, parents, Arc::new(executor));
        (engine, tasks)
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn locks(&self) -> &LockCoordinator {
        &self.locks
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn updater(&self) -> &ParameterUpdater {
        &self.updater
    }

    /// Builds a scheduler ticking at `sync.interval_secs`.
    pub fn scheduler(&self, source: DynExternalViewSource) -> SyncScheduler {
        SyncScheduler::new(self.reconciler.clone(), source, self.config.sync.interval())
    }
}
