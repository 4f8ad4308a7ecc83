//! Storage traits for the parameter mirror.

use async_trait::async_trait;
use paramsync_core::{ChildParameter, ParentResource};

use crate::error::StorageError;

/// Typed read-modify-write step applied atomically by the store.
///
/// The store may invoke the mutator more than once if it retries after a
/// concurrent write, so it must be a pure function of its input.
pub type ParameterMutator<'a> = &'a (dyn Fn(ChildParameter) -> ChildParameter + Send + Sync);

/// The contract the reconciler relies on for the local mirror.
///
/// Implementations must be thread-safe (`Send + Sync`) and enforce the row
/// invariants themselves:
/// - `(parent_id, key)` is unique,
/// - `parent_id` never changes,
/// - `external_id`, once set, never changes.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Returns every row belonging to `parent_id`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues; an unknown parent
    /// yields an empty list.
    async fn find_by_parent(&self, parent_id: &str) -> Result<Vec<ChildParameter>, StorageError>;

    /// Reads a single row by local ID.
    async fn get(&self, id: &str) -> Result<Option<ChildParameter>, StorageError>;

    /// Inserts a new row and returns it as stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the ID is taken and
    /// `StorageError::DuplicateKey` if `(parent_id, key)` is taken.
    async fn insert(&self, row: ChildParameter) -> Result<ChildParameter, StorageError>;

    /// Applies `mutator` to the current stored version of `row` atomically.
    ///
    /// The mutator sees the latest stored state, not the caller's copy.
    /// Returns the row as stored after the write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row is gone,
    /// `StorageError::InvalidParameter` if the mutator breaks an invariant and
    /// `StorageError::DuplicateKey` if a new key collides with a sibling.
    async fn update_fields(
        &self,
        row: &ChildParameter,
        mutator: ParameterMutator<'_>,
    ) -> Result<ChildParameter, StorageError>;

    /// Removes a row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row does not exist.
    async fn delete(&self, row: &ChildParameter) -> Result<(), StorageError>;

    /// Checks whether `row` may be deleted right now.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PreconditionFailed` when deletion is blocked.
    async fn delete_precondition(&self, row: &ChildParameter) -> Result<(), StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Lookup of parent resources, used to resolve owning scopes.
#[async_trait]
pub trait ParentRegistry: Send + Sync {
    /// Returns the parent with the given ID, or `None` if it is unknown.
    async fn get_parent(&self, id: &str) -> Result<Option<ParentResource>, StorageError>;
}
