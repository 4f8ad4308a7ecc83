//! In-memory parameter store backend for paramsync.
//!
//! This crate provides an in-memory implementation of the `ParameterStore`
//! and `ParentRegistry` traits from `paramsync-storage`, using papaya
//! lock-free HashMaps for reads and a single writer lock for invariant checks.
//!
//! # Example
//!
//! ```ignore
//! use paramsync_db_memory::InMemoryParameterStore;
//! use paramsync_storage::ParameterStore;
//!
//! let store = InMemoryParameterStore::new();
//! store.register_parent(ParentResource::new("cache-1", OwnerId::project("p-1")));
//! let row = store.insert(ChildParameter::new("cache-1", "maxmemory", "100")).await?;
//! ```

pub mod storage;

pub use paramsync_storage::{ParameterStore, ParentRegistry, StorageError};
pub use storage::InMemoryParameterStore;

/// Type alias for a shareable in-memory store.
pub type SharedMemoryStore = std::sync::Arc<InMemoryParameterStore>;

/// Creates a new shareable in-memory store.
pub fn create_memory_store() -> SharedMemoryStore {
    std::sync::Arc::new(InMemoryParameterStore::new())
}
