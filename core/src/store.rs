//! The in-memory log, kept in step with a durable [`Backend`].

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendError};
use crate::codec::{SkipDiagnostic, SkipReason};
use crate::models::{
    DaySummary, HistorySummary, LogEntry, ValidationError, total_calories, validate_entry,
};

/// Every user's entries, in append order.
pub type LogTable = BTreeMap<i64, Vec<LogEntry>>;

/// Decides what the in-memory log becomes when the backend is re-read.
pub trait ConflictPolicy {
    fn resolve(&self, local: LogTable, remote: LogTable) -> LogTable;
}

/// The backend's copy replaces the in-memory log wholesale.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastWriterWins;

impl ConflictPolicy for LastWriterWins {
    fn resolve(&self, _local: LogTable, remote: LogTable) -> LogTable {
        remote
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entry rejected: {0}")]
    Validation(#[from] ValidationError),
    /// The entry is kept in memory but was not persisted.
    #[error("entry kept in memory but not saved: {0}")]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub users: usize,
    pub entries: usize,
    pub skipped: Vec<SkipDiagnostic>,
    /// The backend table was missing and has been created empty.
    pub initialized: bool,
}

pub struct LogStore<B> {
    backend: B,
    logs: LogTable,
    conflict_policy: Box<dyn ConflictPolicy>,
}

impl<B: fmt::Debug> fmt::Debug for LogStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStore")
            .field("backend", &self.backend)
            .field("logs", &self.logs)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> LogStore<B> {
    /// An empty store over `backend`. Call [`LogStore::reconcile`] to load it.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            logs: LogTable::new(),
            conflict_policy: Box::new(LastWriterWins),
        }
    }

    /// Build a store and load it from the backend.
    pub fn open(backend: B) -> Result<Self, BackendError> {
        let mut store = Self::new(backend);
        store.reconcile()?;
        Ok(store)
    }

    #[must_use]
    pub fn with_conflict_policy(mut self, policy: impl ConflictPolicy + 'static) -> Self {
        self.conflict_policy = Box::new(policy);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Total number of entries across all users.
    pub fn len(&self) -> usize {
        self.logs.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn users(&self) -> impl Iterator<Item = i64> + '_ {
        self.logs.keys().copied()
    }

    /// Validate, record in memory, then persist.
    ///
    /// A validation failure leaves the store untouched. A backend failure
    /// is returned, but the entry stays in memory until the next reconcile.
    pub fn append(&mut self, entry: LogEntry) -> Result<(), StoreError> {
        let entry = entry.normalized();
        validate_entry(&entry)?;

        self.logs
            .entry(entry.user_id)
            .or_default()
            .push(entry.clone());

        if let Err(e) = self.backend.append(&entry) {
            warn!(user_id = entry.user_id, error = %e, "append not persisted");
            return Err(e.into());
        }
        debug!(user_id = entry.user_id, timestamp = %entry.timestamp, "appended entry");
        Ok(())
    }

    pub fn query_all(&self, user_id: i64) -> &[LogEntry] {
        self.logs.get(&user_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Entries on the given `YYYY-MM-DD` day that carry a calorie value.
    pub fn query_day(&self, user_id: i64, date_prefix: &str) -> Vec<&LogEntry> {
        self.query_all(user_id)
            .iter()
            .filter(|e| e.is_on(date_prefix) && e.calories.is_some())
            .collect()
    }

    pub fn day_summary(&self, user_id: i64, date_prefix: &str) -> DaySummary {
        let entries: Vec<LogEntry> = self
            .query_day(user_id, date_prefix)
            .into_iter()
            .cloned()
            .collect();
        DaySummary {
            user_id,
            date: date_prefix.to_string(),
            total_calories: total_calories(&entries),
            entries,
        }
    }

    pub fn history_summary(&self, user_id: i64) -> HistorySummary {
        let entries = self.query_all(user_id).to_vec();
        HistorySummary {
            user_id,
            total_calories: total_calories(&entries),
            entries,
        }
    }

    /// Overwrite one user's sequence and rewrite the whole backend table.
    ///
    /// Other users are left as they are. An empty `entries` removes the user.
    /// If the rewrite fails the in-memory replacement is kept.
    pub fn replace_user(&mut self, user_id: i64, entries: Vec<LogEntry>) -> Result<(), BackendError> {
        if entries.is_empty() {
            self.logs.remove(&user_id);
        } else {
            self.logs.insert(user_id, entries);
        }
        self.persist_all()
    }

    /// Re-read the backend and replace the in-memory log.
    ///
    /// Safe to call repeatedly. A failed read leaves the log unchanged.
    pub fn reconcile(&mut self) -> Result<ReconcileReport, BackendError> {
        let mut outcome = self.backend.read_all()?;
        let mut report = ReconcileReport {
            skipped: std::mem::take(&mut outcome.skipped),
            ..ReconcileReport::default()
        };

        if outcome.needs_init {
            self.backend.write_all(&[])?;
            report.initialized = true;
            info!("initialized empty log table");
        }

        let mut remote = LogTable::new();
        let entries = std::mem::take(&mut outcome.entries);
        for (idx, entry) in entries.into_iter().enumerate() {
            let entry = entry.normalized();
            if validate_entry(&entry).is_err() {
                report.skipped.push(SkipDiagnostic {
                    line: outcome.line_of(idx),
                    reason: SkipReason::EmptyEntry,
                });
                continue;
            }
            remote.entry(entry.user_id).or_default().push(entry);
        }
        report.skipped.sort_by_key(|d| d.line);

        for diag in &report.skipped {
            warn!(%diag, "skipped backend row");
        }

        let local = std::mem::take(&mut self.logs);
        self.logs = self.conflict_policy.resolve(local, remote);
        report.users = self.logs.len();
        report.entries = self.len();
        info!(
            users = report.users,
            entries = report.entries,
            skipped = report.skipped.len(),
            "reconciled log"
        );
        Ok(report)
    }

    fn persist_all(&mut self) -> Result<(), BackendError> {
        let all: Vec<LogEntry> = self.logs.values().flatten().cloned().collect();
        self.backend.write_all(&all)
    }
}
