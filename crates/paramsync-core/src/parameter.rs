use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

use crate::error::{CoreError, Result};
use crate::scope::OwnerId;

/// Lifecycle status of a [`ChildParameter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParameterStatus {
    Creating,
    #[default]
    Ready,
    Updating,
    Deleting,
    Unknown,
}

impl ParameterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Ready => "ready",
            Self::Updating => "updating",
            Self::Deleting => "deleting",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient mapping for statuses reported by the control plane.
    ///
    /// Anything unrecognised becomes [`ParameterStatus::Unknown`] rather than
    /// failing the whole sync pass.
    pub fn from_external(status: &str) -> Self {
        status.parse().unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for ParameterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "creating" => Ok(Self::Creating),
            "ready" | "available" => Ok(Self::Ready),
            "updating" => Ok(Self::Updating),
            "deleting" => Ok(Self::Deleting),
            "unknown" => Ok(Self::Unknown),
            other => Err(CoreError::invalid_status(other)),
        }
    }
}

impl<'de> Deserialize<'de> for ParameterStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_external(&s))
    }
}

/// The managed service instance (e.g. a cache cluster) owning parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentResource {
    pub id: String,
    pub owner: OwnerId,
}

impl ParentResource {
    pub fn new(id: impl Into<String>, owner: OwnerId) -> Self {
        Self {
            id: id.into(),
            owner,
        }
    }
}

/// Read-only projection of one parameter as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalParameterView {
    pub global_id: String,
    #[serde(default)]
    pub name: String,
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_range: Option<String>,
    #[serde(default)]
    pub modifiable: bool,
    #[serde(default)]
    pub force_restart: bool,
    #[serde(default)]
    pub status: ParameterStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ExternalParameterView {
    pub fn new(
        global_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let key = key.into();
        Self {
            global_id: global_id.into(),
            name: key.clone(),
            key,
            value: value.into(),
            value_range: None,
            modifiable: false,
            force_restart: false,
            status: ParameterStatus::Ready,
            description: None,
        }
    }

    pub fn with_modifiable(mut self, modifiable: bool) -> Self {
        self.modifiable = modifiable;
        self
    }

    pub fn with_force_restart(mut self, force_restart: bool) -> Self {
        self.force_restart = force_restart;
        self
    }

    pub fn with_status(mut self, status: ParameterStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_value_range(mut self, value_range: impl Into<String>) -> Self {
        self.value_range = Some(value_range.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A key/value configuration entry scoped to exactly one parent resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildParameter {
    pub id: String,
    pub parent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_range: Option<String>,
    pub modifiable: bool,
    pub force_restart: bool,
    pub status: ParameterStatus,
    /// Human-readable reason attached to the last status transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    /// Outstanding propagation task, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_task_id: Option<String>,
    /// Monotonic row version, bumped by every successful store write.
    #[serde(default)]
    pub version: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ChildParameter {
    pub fn new(
        parent_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let now = crate::time::now_utc();
        Self {
            id: crate::id::generate_id(),
            parent_id: parent_id.into(),
            external_id: None,
            name: key.clone(),
            description: None,
            key,
            value: value.into(),
            value_range: None,
            modifiable: false,
            force_restart: false,
            status: ParameterStatus::Ready,
            status_reason: None,
            active_task_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builds a fresh local row mirroring an externally observed parameter.
    pub fn from_external(parent: &ParentResource, view: &ExternalParameterView) -> Self {
        let mut row = Self::new(parent.id.clone(), view.key.clone(), view.value.clone());
        row.external_id = Some(view.global_id.clone());
        row.name = if view.name.is_empty() {
            view.key.clone()
        } else {
            view.name.clone()
        };
        row.description = view.description.clone();
        row.value_range = view.value_range.clone();
        row.modifiable = view.modifiable;
        row.force_restart = view.force_restart;
        row.status = view.status;
        row
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_modifiable(mut self, modifiable: bool) -> Self {
        self.modifiable = modifiable;
        self
    }

    pub fn with_status(mut self, status: ParameterStatus) -> Self {
        self.status = status;
        self
    }

    pub fn validate(&self) -> Result<()> {
        crate::id::validate_id(&self.id)?;
        if self.parent_id.is_empty() {
            return Err(CoreError::invalid_parameter("parent_id is required"));
        }
        if self.key.is_empty() {
            return Err(CoreError::invalid_parameter("key is required"));
        }
        if let Some(external_id) = &self.external_id {
            crate::id::validate_external_id(external_id)?;
        }
        Ok(())
    }

    pub fn has_outstanding_task(&self) -> bool {
        self.active_task_id.is_some()
    }
}
