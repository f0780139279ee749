use tracing::{debug, warn};

use super::{Backend, BackendError, ReadOutcome};
use crate::codec::{self, CaloriesPolicy, HEADER, RemoteRecord, SkipDiagnostic, SkipReason};
use crate::models::LogEntry;

/// A remote spreadsheet-like table reachable over the network.
///
/// Every call may fail with a transport or authentication error.
/// `reinitialize` re-establishes the connection (fresh client, refreshed
/// credentials) and is called at most once per failed operation.
pub trait RemoteTable {
    fn fetch_all_records(&self) -> Result<Vec<RemoteRecord>, BackendError>;
    fn append_record(&self, row: &[String]) -> Result<(), BackendError>;
    /// Replace the whole table; `rows[0]` is the header.
    fn overwrite_all(&self, rows: &[Vec<String>]) -> Result<(), BackendError>;
    fn reinitialize(&mut self) -> Result<(), BackendError>;
}

#[derive(Debug)]
pub struct RemoteTableBackend<T> {
    table: T,
    policy: CaloriesPolicy,
}

impl<T: RemoteTable> RemoteTableBackend<T> {
    pub fn new(table: T, policy: CaloriesPolicy) -> Self {
        Self { table, policy }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Run `op`, and on failure reconnect and run it exactly once more.
    fn with_retry<R>(
        &mut self,
        name: &str,
        op: impl Fn(&T) -> Result<R, BackendError>,
    ) -> Result<R, BackendError> {
        match op(&self.table) {
            Ok(v) => Ok(v),
            Err(first) => {
                warn!(operation = name, error = %first, "remote table call failed, reconnecting");
                self.table.reinitialize()?;
                op(&self.table).inspect_err(|e| {
                    warn!(operation = name, error = %e, "remote table call failed after reconnect");
                })
            }
        }
    }
}

impl<T: RemoteTable> Backend for RemoteTableBackend<T> {
    fn read_all(&mut self) -> Result<ReadOutcome, BackendError> {
        let records = self.with_retry("fetch_all_records", T::fetch_all_records)?;
        let mut outcome = ReadOutcome::default();
        for (idx, record) in records.iter().enumerate() {
            let line = codec::data_line(idx);
            match codec::decode_record(record, self.policy) {
                Ok(entry) => outcome.push(line, entry),
                Err(e) => outcome.skipped.push(SkipDiagnostic {
                    line,
                    reason: SkipReason::Row(e),
                }),
            }
        }
        debug!(
            entries = outcome.entries.len(),
            skipped = outcome.skipped.len(),
            "read remote table"
        );
        Ok(outcome)
    }

    fn write_all(&mut self, entries: &[LogEntry]) -> Result<(), BackendError> {
        let rows: Vec<Vec<String>> = std::iter::once(HEADER.map(String::from).to_vec())
            .chain(entries.iter().map(codec::encode))
            .collect();
        self.with_retry("overwrite_all", |t| t.overwrite_all(&rows))
    }

    fn append(&mut self, entry: &LogEntry) -> Result<(), BackendError> {
        let row = codec::encode(entry);
        self.with_retry("append_record", |t| t.append_record(&row))
    }
}
