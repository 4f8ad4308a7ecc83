use paramsync_core::{ChildParameter, OwnerId, ParentResource, ScopeKey};
use paramsync_storage::DynParentRegistry;

use crate::error::{ReconcileError, Result};

/// Derives lock partitions from parent ownership.
#[derive(Clone)]
pub struct ScopeResolver {
    manager: String,
    parents: DynParentRegistry,
}

impl ScopeResolver {
    pub fn new(manager: impl Into<String>, parents: DynParentRegistry) -> Self {
        Self {
            manager: manager.into(),
            parents,
        }
    }

    pub fn manager(&self) -> &str {
        &self.manager
    }

    pub fn scope_for_parent(&self, parent: &ParentResource) -> ScopeKey {
        ScopeKey::new(self.manager.clone(), parent.owner.clone())
    }

    /// Scope of a parent whose owner has been checked.
    ///
    /// An owner without a project would share one lock with every other
    /// ownerless parent, so it is rejected instead.
    pub fn checked_scope_for_parent(&self, parent: &ParentResource) -> Result<ScopeKey> {
        parent.owner.validate()?;
        Ok(self.scope_for_parent(parent))
    }

    /// Resolves the owner of a parent known only by id.
    pub async fn owner_of_parent(&self, parent_id: &str) -> Result<OwnerId> {
        let owner = self
            .parents
            .get_parent(parent_id)
            .await?
            .map(|parent| parent.owner)
            .ok_or_else(|| ReconcileError::ParentNotFound(parent_id.to_string()))?;
        owner.validate()?;
        Ok(owner)
    }

    pub async fn scope_for_parameter(&self, row: &ChildParameter) -> Result<ScopeKey> {
        let owner = self.owner_of_parent(&row.parent_id).await?;
        Ok(ScopeKey::new(self.manager.clone(), owner))
    }
}

impl std::fmt::Debug for ScopeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeResolver")
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}
