//! Periodic reconciliation of every registered parent.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use paramsync_core::ParentResource;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};

use crate::reconciler::Reconciler;
use crate::result::SyncResult;
use crate::source::DynExternalViewSource;

/// Outcome of one pass for one parent.
#[derive(Debug)]
pub struct ParentSync {
    pub parent_id: String,
    pub result: SyncResult,
}

#[derive(Clone)]
pub struct SyncScheduler {
    reconciler: Reconciler,
    source: DynExternalViewSource,
    parents: Arc<DashMap<String, ParentResource>>,
    interval: Duration,
}

impl SyncScheduler {
    pub fn new(reconciler: Reconciler, source: DynExternalViewSource, interval: Duration) -> Self {
        Self {
            reconciler,
            source,
            parents: Arc::new(DashMap::new()),
            interval,
        }
    }

    pub fn register(&self, parent: ParentResource) {
        self.parents.insert(parent.id.clone(), parent);
    }

    pub fn unregister(&self, parent_id: &str) -> Option<ParentResource> {
        self.parents.remove(parent_id).map(|(_, parent)| parent)
    }

    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    /// Runs one pass for every registered parent and waits for all of them.
    ///
    /// Parents are reconciled concurrently; same-owner parents still serialize
    /// on their scope lock. Results are ordered by parent id.
    pub async fn run_once(&self) -> Vec<ParentSync> {
        let parents: Vec<ParentResource> = self
            .parents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut tasks = JoinSet::new();
        for parent in parents {
            let reconciler = self.reconciler.clone();
            let source = Arc::clone(&self.source);
            tasks.spawn(async move {
                let result = reconciler.sync_from_source(&parent, source.as_ref()).await;
                ParentSync {
                    parent_id: parent.id,
                    result,
                }
            });
        }

        let mut synced = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(sync) => {
                    if sync.result.is_error() {
                        warn!(parent_id = %sync.parent_id, summary = %sync.result, "Parameter sync finished with errors");
                    }
                    synced.push(sync);
                }
                Err(e) => error!(error = %e, "Parameter sync task panicked"),
            }
        }
        synced.sort_by(|a, b| a.parent_id.cmp(&b.parent_id));
        synced
    }

    /// Ticks until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = self.interval.as_secs(), "Parameter sync scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let synced = self.run_once().await;
                    let failed = synced.iter().filter(|s| s.result.is_error()).count();
                    info!(parents = synced.len(), failed, "Parameter sync tick complete");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Parameter sync scheduler stopped");
    }
}
