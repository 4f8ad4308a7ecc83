use std::sync::Arc;

use async_trait::async_trait;
use paramsync_core::{ExternalParameterView, ParentResource};

use crate::error::Result;

/// Supplier of the control plane's current view of a parent's parameters.
///
/// Transport and API client live behind this trait. Implementations should
/// map any failure to [`ReconcileError::ExternalView`](crate::ReconcileError::ExternalView).
#[async_trait]
pub trait ExternalViewSource: Send + Sync {
    async fn fetch_parameters(&self, parent: &ParentResource) -> Result<Vec<ExternalParameterView>>;
}

pub type DynExternalViewSource = Arc<dyn ExternalViewSource>;
