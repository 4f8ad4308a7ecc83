//! Ownership and lock-partitioning identities.
//!
//! A [`ScopeKey`] is never stored. It is derived on demand from the owner of
//! a parent resource and the name of the manager that guards it, so two
//! managers can lock the same owner independently.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// The tenant/project that owns a parent resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    pub project_id: String,
}

impl OwnerId {
    pub fn project(project_id: impl Into<String>) -> Self {
        Self {
            domain_id: None,
            project_id: project_id.into(),
        }
    }

    pub fn with_domain(mut self, domain_id: impl Into<String>) -> Self {
        self.domain_id = Some(domain_id.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(CoreError::invalid_scope("owner project_id must not be empty"));
        }
        Ok(())
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.domain_id {
            Some(domain) => write!(f, "{domain}/{}", self.project_id),
            None => write!(f, "{}", self.project_id),
        }
    }
}

/// Lock partition key: manager identity plus owning scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub manager: String,
    pub owner: OwnerId,
}

impl ScopeKey {
    pub fn new(manager: impl Into<String>, owner: OwnerId) -> Self {
        Self {
            manager: manager.into(),
            owner,
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.manager, self.owner)
    }
}
