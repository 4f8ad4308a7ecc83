use std::fmt;

use crate::error::ReconcileError;

/// The three kinds of change a pass applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncCategory {
    Add,
    Update,
    Delete,
}

impl fmt::Display for SyncCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Success and failure counts for one category.
#[derive(Debug, Default)]
pub struct OutcomeCounter {
    pub ok: usize,
    pub failed: usize,
    pub first_error: Option<ReconcileError>,
}

impl OutcomeCounter {
    fn record_ok(&mut self) {
        self.ok += 1;
    }

    fn record_err(&mut self, err: ReconcileError) {
        self.failed += 1;
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }
}

/// A single row that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    pub category: SyncCategory,
    pub row: String,
    pub message: String,
}

/// Aggregated outcome of one reconciliation pass
#[derive(Debug, Default)]
pub struct SyncResult {
    pub added: OutcomeCounter,
    pub updated: OutcomeCounter,
    pub deleted: OutcomeCounter,
    /// Matched rows that already agreed with the control plane.
    pub unchanged: usize,
    pub fatal: Option<ReconcileError>,
    pub failures: Vec<RowFailure>,
}

impl SyncResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pass that stopped before applying anything.
    pub fn fatal(err: ReconcileError) -> Self {
        Self {
            fatal: Some(err),
            ..Self::default()
        }
    }

    pub fn add(&mut self) {
        self.added.record_ok();
    }

    pub fn add_error(&mut self, row: impl Into<String>, err: ReconcileError) {
        self.record_failure(SyncCategory::Add, row.into(), err);
    }

    pub fn update(&mut self) {
        self.updated.record_ok();
    }

    pub fn update_error(&mut self, row: impl Into<String>, err: ReconcileError) {
        self.record_failure(SyncCategory::Update, row.into(), err);
    }

    pub fn delete(&mut self) {
        self.deleted.record_ok();
    }

    pub fn delete_error(&mut self, row: impl Into<String>, err: ReconcileError) {
        self.record_failure(SyncCategory::Delete, row.into(), err);
    }

    pub fn unchanged(&mut self) {
        self.unchanged += 1;
    }

    fn record_failure(&mut self, category: SyncCategory, row: String, err: ReconcileError) {
        self.failures.push(RowFailure {
            category,
            row,
            message: err.to_string(),
        });
        let counter = match category {
            SyncCategory::Add => &mut self.added,
            SyncCategory::Update => &mut self.updated,
            SyncCategory::Delete => &mut self.deleted,
        };
        counter.record_err(err);
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }

    /// Returns `true` if anything at all went wrong.
    pub fn is_error(&self) -> bool {
        self.is_fatal() || !self.failures.is_empty()
    }

    /// The fatal error, or else the first per-row error in add, update, delete order.
    pub fn first_error(&self) -> Option<&ReconcileError> {
        self.fatal
            .as_ref()
            .or(self.added.first_error.as_ref())
            .or(self.updated.first_error.as_ref())
            .or(self.deleted.first_error.as_ref())
    }

    pub fn counter(&self, category: SyncCategory) -> &OutcomeCounter {
        match category {
            SyncCategory::Add => &self.added,
            SyncCategory::Update => &self.updated,
            SyncCategory::Delete => &self.deleted,
        }
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(err) = &self.fatal {
            return write!(f, "sync aborted: {err}");
        }
        write!(
            f,
            "added {}/{} updated {}/{} deleted {}/{} unchanged {}",
            self.added.ok,
            self.added.ok + self.added.failed,
            self.updated.ok,
            self.updated.ok + self.updated.failed,
            self.deleted.ok,
            self.deleted.ok + self.deleted.failed,
            self.unchanged,
        )
    }
}
