//! Partitioning of the local mirror against the external live view.
//!
//! Rows are matched purely on the external identifier. A local row that has
//! none can never match anything and always lands in `removed`, so every row
//! the reconciler creates carries the identifier from the start.

use std::collections::{HashMap, VecDeque};

use paramsync_core::{ChildParameter, ExternalParameterView};

/// Access to the identity key used for matching.
pub trait SyncIdentity {
    fn sync_key(&self) -> Option<&str>;
}

impl SyncIdentity for ChildParameter {
    fn sync_key(&self) -> Option<&str> {
        self.external_id.as_deref()
    }
}

impl SyncIdentity for ExternalParameterView {
    fn sync_key(&self) -> Option<&str> {
        Some(self.global_id.as_str())
    }
}

/// The four disjoint groups produced by [`compare_sets`].
///
/// `matched_local[i]` and `matched_external[i]` describe the same entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partitions<L, E> {
    pub removed: Vec<L>,
    pub matched_local: Vec<L>,
    pub matched_external: Vec<E>,
    pub added: Vec<E>,
}

impl<L, E> Default for Partitions<L, E> {
    fn default() -> Self {
        Self {
            removed: Vec::new(),
            matched_local: Vec::new(),
            matched_external: Vec::new(),
            added: Vec::new(),
        }
    }
}

impl<L, E> Partitions<L, E> {
    pub fn matched(&self) -> impl Iterator<Item = (&L, &E)> {
        self.matched_local.iter().zip(self.matched_external.iter())
    }
}

pub type ParameterPartitions = Partitions<ChildParameter, ExternalParameterView>;

/// Splits `local` and `external` into removed / matched / added.
///
/// `removed` keeps local order; the matched pairs and `added` follow the
/// order of the external response. Duplicate identifiers are not an error:
/// each external row claims at most one unclaimed local row with the same key
/// and anything left over falls into `added` or `removed`.
pub fn compare_sets<L, E>(local: Vec<L>, external: Vec<E>) -> Partitions<L, E>
where
    L: SyncIdentity,
    E: SyncIdentity,
{
    let mut by_key: HashMap<String, VecDeque<usize>> = HashMap::with_capacity(local.len());
    for (idx, row) in local.iter().enumerate() {
        if let Some(key) = row.sync_key() {
            by_key.entry(key.to_owned()).or_default().push_back(idx);
        }
    }

    let mut slots: Vec<Option<L>> = local.into_iter().map(Some).collect();
    let mut partitions = Partitions::default();

    for ext in external {
        let claimed = ext
            .sync_key()
            .and_then(|key| by_key.get_mut(key))
            .and_then(VecDeque::pop_front)
            .and_then(|idx| slots[idx].take());

        match claimed {
            Some(row) => {
                partitions.matched_local.push(row);
                partitions.matched_external.push(ext);
            }
            None => partitions.added.push(ext),
        }
    }

    partitions.removed = slots.into_iter().flatten().collect();
    partitions
}
