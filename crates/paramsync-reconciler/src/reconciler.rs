//! Diff-and-apply of one parent's parameters against the control plane.
//!
//! A pass holds the owner's scope lock from start to finish. Inside it the
//! three partitions are applied in order (delete, update, create) and a
//! failing row never stops the rest of the pass. Every row write also takes
//! that row's entity lock. Nothing is rolled back; running the pass again
//! converges.

use std::collections::HashSet;
use std::time::Duration;

use paramsync_core::{ChildParameter, ExternalParameterView, ParentResource};
use paramsync_storage::DynParameterStore;
use tracing::{debug, info, instrument, warn};

use crate::compare::compare_sets;
use crate::error::Result;
use crate::lock::{LockCoordinator, LockGuard};
use crate::result::SyncResult;
use crate::scope::ScopeResolver;
use crate::source::ExternalViewSource;

#[derive(Clone)]
pub struct Reconciler {
    store: DynParameterStore,
    locks: LockCoordinator,
    scopes: ScopeResolver,
    lock_timeout: Option<Duration>,
}

impl Reconciler {
    pub fn new(store: DynParameterStore, locks: LockCoordinator, scopes: ScopeResolver) -> Self {
        Self {
            store,
            locks,
            scopes,
            lock_timeout: None,
        }
    }

    /// Bounds the wait for the scope lock; a timeout aborts the pass.
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn locks(&self) -> &LockCoordinator {
        &self.locks
    }

    pub fn scopes(&self) -> &ScopeResolver {
        &self.scopes
    }

    /// Fetches the live view from `source` and reconciles against it.
    ///
    /// The fetch happens before any lock is taken. If it fails the pass is
    /// fatal and the local rows are left untouched.
    pub async fn sync_from_source(
        &self,
        parent: &ParentResource,
        source: &dyn ExternalViewSource,
    ) -> SyncResult {
        match source.fetch_parameters(parent).await {
            Ok(external) => self.sync_parameters(parent, external).await,
            Err(err) => {
                warn!(parent_id = %parent.id, error = %err, "Failed to fetch external parameters");
                SyncResult::fatal(err)
            }
        }
    }

    #[instrument(skip_all, fields(parent_id = %parent.id, external = external.len()))]
    pub async fn sync_parameters(
        &self,
        parent: &ParentResource,
        external: Vec<ExternalParameterView>,
    ) -> SyncResult {
        let _scope_guard = match self.lock_parent(parent).await {
            Ok(guard) => guard,
            Err(err) => return SyncResult::fatal(err),
        };

        let local = match self.store.find_by_parent(&parent.id).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "Failed to load local parameters");
                return SyncResult::fatal(err.into());
            }
        };

        let partitions = compare_sets(local, external);
        debug!(
            removed = partitions.removed.len(),
            matched = partitions.matched_local.len(),
            added = partitions.added.len(),
            "Partitioned parameters"
        );

        let mut result = SyncResult::new();

        for row in partitions.removed {
            match self.remove_row(&row).await {
                Ok(()) => result.delete(),
                Err(err) => {
                    warn!(row_id = %row.id, key = %row.key, error = %err, category = %err.category(), "Failed to delete parameter");
                    result.delete_error(row.id, err);
                }
            }
        }

        let mut pending = Vec::new();
        for (row, view) in partitions
            .matched_local
            .into_iter()
            .zip(partitions.matched_external)
        {
            if needs_update(&row, &view) {
                pending.push((row, view));
            } else {
                result.unchanged();
            }
        }

        // A rename onto a key another matched row is giving up has to wait
        // until that key is free.
        let vacating: HashSet<String> = pending
            .iter()
            .filter(|(row, view)| row.key != view.key)
            .map(|(row, _)| row.key.clone())
            .collect();
        let (contested, direct): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|(row, view)| row.key != view.key && vacating.contains(&view.key));

        for (row, view) in direct {
            self.update_row(&mut result, &row, &view).await;
        }

        let mut parked = Vec::with_capacity(contested.len());
        for (row, view) in contested {
            match self.park_key(&row).await {
                Ok(row) => parked.push((row, view)),
                Err(err) => {
                    warn!(row_id = %row.id, key = %row.key, error = %err, "Failed to release parameter key");
                    result.update_error(row.id, err);
                }
            }
        }
        for (row, view) in parked {
            self.update_row(&mut result, &row, &view).await;
        }

        for view in partitions.added {
            match self.create_from_external(parent, &view).await {
                Ok(_) => result.add(),
                Err(err) => {
                    warn!(global_id = %view.global_id, key = %view.key, error = %err, "Failed to create parameter");
                    result.add_error(view.global_id, err);
                }
            }
        }

        info!(
            added = result.added.ok,
            updated = result.updated.ok,
            deleted = result.deleted.ok,
            unchanged = result.unchanged,
            failed = result.failures.len(),
            "Parameters reconciled"
        );

        result
    }

    async fn lock_parent(&self, parent: &ParentResource) -> Result<LockGuard> {
        let scope = self.scopes.checked_scope_for_parent(parent)?;
        match self.lock_timeout {
            Some(wait) => self.locks.lock_scope_timeout(&scope, wait).await,
            None => Ok(self.locks.lock_scope(&scope).await),
        }
    }

    async fn remove_row(&self, row: &ChildParameter) -> Result<()> {
        let _guard = self.locks.lock_entity(&row.id).await;
        self.store.delete_precondition(row).await?;
        self.store.delete(row).await?;
        Ok(())
    }

    async fn update_row(
        &self,
        result: &mut SyncResult,
        row: &ChildParameter,
        view: &ExternalParameterView,
    ) {
        match self.apply_external(row, view).await {
            Ok(_) => result.update(),
            Err(err) => {
                warn!(row_id = %row.id, key = %row.key, error = %err, "Failed to update parameter");
                result.update_error(row.id.clone(), err);
            }
        }
    }

    async fn apply_external(
        &self,
        row: &ChildParameter,
        view: &ExternalParameterView,
    ) -> Result<ChildParameter> {
        let _guard = self.locks.lock_entity(&row.id).await;
        let mirror = |mut current: ChildParameter| {
            current.status = view.status;
            current.key = view.key.clone();
            current.value = view.value.clone();
            current.modifiable = view.modifiable;
            current.force_restart = view.force_restart;
            current
        };
        Ok(self.store.update_fields(row, &mirror).await?)
    }

    /// Moves a row onto a key no sibling can hold so its old key is free.
    async fn park_key(&self, row: &ChildParameter) -> Result<ChildParameter> {
        let _guard = self.locks.lock_entity(&row.id).await;
        let park = |mut current: ChildParameter| {
            current.key = format!("{}#{}", current.key, current.id);
            current
        };
        Ok(self.store.update_fields(row, &park).await?)
    }

    async fn create_from_external(
        &self,
        parent: &ParentResource,
        view: &ExternalParameterView,
    ) -> Result<ChildParameter> {
        let row = ChildParameter::from_external(parent, view);
        Ok(self.store.insert(row).await?)
    }
}

/// Returns `true` if the local row differs from the control plane in any
/// mirrored field.
pub fn needs_update(row: &ChildParameter, view: &ExternalParameterView) -> bool {
    row.status != view.status
        || row.key != view.key
        || row.value != view.value
        || row.modifiable != view.modifiable
        || row.force_restart != view.force_restart
}
