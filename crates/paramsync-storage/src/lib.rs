//! # paramsync-storage
//!
//! Storage abstraction for the local mirror of parameters.
//!
//! This crate defines the traits that a storage backend must implement for
//! the reconciler to work against it. It contains no implementation; see
//! `paramsync-db-memory` for the in-memory backend.
//!
//! ## Overview
//!
//! - [`ParameterStore`]: CRUD plus an atomic read-modify-write
//!   ([`ParameterStore::update_fields`]) taking a typed mutator.
//! - [`ParentRegistry`]: lookup of parent resources, used to resolve the
//!   owning scope of a parameter.
//!
//! ## Example
//!
//! ```ignore
//! use paramsync_storage::{ParameterStore, StorageError};
//!
//! async fn bump(store: &dyn ParameterStore, row: &ChildParameter) -> Result<(), StorageError> {
//!     store
//!         .update_fields(row, &|mut p| {
//!             p.value = "200".into();
//!             p
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

mod error;
mod traits;

pub use error::{ErrorCategory, StorageError};
pub use traits::{ParameterMutator, ParameterStore, ParentRegistry};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shareable parameter store.
pub type DynParameterStore = std::sync::Arc<dyn ParameterStore>;

/// Type alias for a shareable parent registry.
pub type DynParentRegistry = std::sync::Arc<dyn ParentRegistry>;
