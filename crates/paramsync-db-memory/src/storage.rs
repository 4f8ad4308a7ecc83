use async_trait::async_trait;
use paramsync_core::{ChildParameter, ParentResource, now_utc};
use paramsync_storage::{ParameterMutator, ParameterStore, ParentRegistry, StorageError};
use papaya::HashMap as PapayaHashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// A stored row plus its insertion sequence number.
#[derive(Debug, Clone)]
pub(crate) struct StoredRow {
    pub(crate) seq: u64,
    pub(crate) row: ChildParameter,
}

/// In-memory parameter store using papaya lock-free HashMaps.
///
/// Reads never block. Writes are serialized by a single writer lock so the
/// `(parent_id, key)` uniqueness check and the write happen atomically.
///
/// Deletion can be blocked by registering a reference to a row with
/// [`InMemoryParameterStore::add_reference`]; the delete precondition fails
/// while any reference is held.
#[derive(Debug)]
pub struct InMemoryParameterStore {
    /// Rows keyed by local ID
    pub(crate) data: Arc<PapayaHashMap<String, StoredRow>>,
    /// Known parent resources keyed by ID
    parents: Arc<PapayaHashMap<String, ParentResource>>,
    /// Row ID -> holders that reference it
    references: Arc<PapayaHashMap<String, Vec<String>>>,
    /// Serializes all writers
    write_lock: Mutex<()>,
    /// Insertion order counter
    seq_counter: AtomicU64,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
            parents: Arc::new(PapayaHashMap::new()),
            references: Arc::new(PapayaHashMap::new()),
            write_lock: Mutex::new(()),
            seq_counter: AtomicU64::new(1),
        }
    }

    pub fn register_parent(&self, parent: ParentResource) {
        let guard = self.parents.pin();
        guard.insert(parent.id.clone(), parent);
    }

    pub fn remove_parent(&self, id: &str) -> Option<ParentResource> {
        let guard = self.parents.pin();
        guard.remove(id).cloned()
    }

    /// Marks `row_id` as referenced by `holder`, blocking its deletion.
    pub async fn add_reference(&self, row_id: &str, holder: impl Into<String>) {
        let holder = holder.into();
        let _writer = self.write_lock.lock().await;
        let guard = self.references.pin();
        let mut holders = guard.get(row_id).cloned().unwrap_or_default();
        if !holders.contains(&holder) {
            holders.push(holder);
        }
        guard.insert(row_id.to_string(), holders);
    }

    pub async fn remove_reference(&self, row_id: &str, holder: &str) {
        let _writer = self.write_lock.lock().await;
        let guard = self.references.pin();
        let Some(mut holders) = guard.get(row_id).cloned() else {
            return;
        };
        holders.retain(|h| h != holder);
        if holders.is_empty() {
            guard.remove(row_id);
        } else {
            guard.insert(row_id.to_string(), holders);
        }
    }

    pub fn count(&self) -> usize {
        self.data.pin().len()
    }

    pub fn count_by_parent(&self, parent_id: &str) -> usize {
        let guard = self.data.pin();
        guard
            .iter()
            .filter(|(_, stored)| stored.row.parent_id == parent_id)
            .count()
    }

    fn next_seq(&self) -> u64 {
        self.seq_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Returns `true` if a row other than `except_id` already uses `key` under `parent_id`.
    fn key_taken(
        data: &PapayaHashMap<String, StoredRow>,
        parent_id: &str,
        key: &str,
        except_id: &str,
    ) -> bool {
        let guard = data.pin();
        guard.iter().any(|(id, stored)| {
            id != except_id && stored.row.parent_id == parent_id && stored.row.key == key
        })
    }

    fn check_invariants(current: &ChildParameter, next: &ChildParameter) -> Result<(), StorageError> {
        if next.id != current.id {
            return Err(StorageError::invalid_parameter(format!(
                "row id is immutable ({} -> {})",
                current.id, next.id
            )));
        }
        if next.parent_id != current.parent_id {
            return Err(StorageError::invalid_parameter(format!(
                "parent_id of {} is immutable",
                current.id
            )));
        }
        if current.external_id.is_some() && next.external_id != current.external_id {
            return Err(StorageError::invalid_parameter(format!(
                "external_id of {} is immutable once set",
                current.id
            )));
        }
        if next.key.is_empty() {
            return Err(StorageError::invalid_parameter("key is required"));
        }
        Ok(())
    }
}

impl Default for InMemoryParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParameterStore for InMemoryParameterStore {
    async fn find_by_parent(&self, parent_id: &str) -> Result<Vec<ChildParameter>, StorageError> {
        let mut rows: Vec<StoredRow> = {
            let guard = self.data.pin();
            guard
                .iter()
                .filter(|(_, stored)| stored.row.parent_id == parent_id)
                .map(|(_, stored)| stored.clone())
                .collect()
        };
        rows.sort_by_key(|stored| stored.seq);
        Ok(rows.into_iter().map(|stored| stored.row).collect())
    }

    async fn get(&self, id: &str) -> Result<Option<ChildParameter>, StorageError> {
        let guard = self.data.pin();
        Ok(guard.get(id).map(|stored| stored.row.clone()))
    }

    async fn insert(&self, mut row: ChildParameter) -> Result<ChildParameter, StorageError> {
        row.validate()?;

        let _writer = self.write_lock.lock().await;
        if self.data.pin().get(&row.id).is_some() {
            return Err(StorageError::already_exists(row.id));
        }
        if Self::key_taken(&self.data, &row.parent_id, &row.key, &row.id) {
            return Err(StorageError::duplicate_key(row.parent_id, row.key));
        }

        row.version = 1;
        row.updated_at = now_utc();
        let stored = StoredRow {
            seq: self.next_seq(),
            row: row.clone(),
        };
        self.data.pin().insert(row.id.clone(), stored);

        tracing::debug!(id = %row.id, parent_id = %row.parent_id, key = %row.key, "parameter inserted");
        Ok(row)
    }

    async fn update_fields(
        &self,
        row: &ChildParameter,
        mutator: ParameterMutator<'_>,
    ) -> Result<ChildParameter, StorageError> {
        let _writer = self.write_lock.lock().await;
        let current = self
            .data
            .pin()
            .get(&row.id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(&row.id))?;

        let mut next = mutator(current.row.clone());
        Self::check_invariants(&current.row, &next)?;
        if next.key != current.row.key
            && Self::key_taken(&self.data, &next.parent_id, &next.key, &next.id)
        {
            return Err(StorageError::duplicate_key(next.parent_id, next.key));
        }

        next.version = current.row.version + 1;
        next.created_at = current.row.created_at;
        next.updated_at = now_utc();
        self.data.pin().insert(
            next.id.clone(),
            StoredRow {
                seq: current.seq,
                row: next.clone(),
            },
        );
        Ok(next)
    }

    async fn delete(&self, row: &ChildParameter) -> Result<(), StorageError> {
        let _writer = self.write_lock.lock().await;
        let removed = self.data.pin().remove(&row.id).is_some();
        if !removed {
            return Err(StorageError::not_found(&row.id));
        }
        self.references.pin().remove(&row.id);

        tracing::debug!(id = %row.id, parent_id = %row.parent_id, "parameter deleted");
        Ok(())
    }

    async fn delete_precondition(&self, row: &ChildParameter) -> Result<(), StorageError> {
        let guard = self.references.pin();
        match guard.get(&row.id) {
            Some(holders) if !holders.is_empty() => Err(StorageError::precondition_failed(
                &row.id,
                format!("still referenced by {}", holders.join(", ")),
            )),
            _ => Ok(()),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl ParentRegistry for InMemoryParameterStore {
    async fn get_parent(&self, id: &str) -> Result<Option<ParentResource>, StorageError> {
        let guard = self.parents.pin();
        Ok(guard.get(id).cloned())
    }
}
