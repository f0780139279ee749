//! Per-user export to a flat table and validated import back into the store.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{Backend, BackendError};
use crate::codec::{self, CaloriesPolicy, HEADER, SkipDiagnostic, SkipReason};
use crate::models::validate_entry;
use crate::store::LogStore;

/// Header row followed by one 5-field row per entry.
pub type FlatTable = Vec<Vec<String>>;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("table is empty")]
    EmptyTable,
    #[error("unexpected header '{found}', expected '{}'", HEADER.join(","))]
    BadHeader { found: String },
    /// Rows were accepted into memory but the full-table rewrite failed.
    #[error("imported {accepted} rows but could not save them: {source}")]
    Persist {
        accepted: usize,
        #[source]
        source: BackendError,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub accepted: usize,
    pub skipped: Vec<SkipDiagnostic>,
}

impl ImportReport {
    /// No row survived validation; the store was left untouched.
    #[must_use]
    pub fn nothing_imported(&self) -> bool {
        self.accepted == 0
    }
}

/// The user's entries as a flat table, in append order.
pub fn export<B: Backend>(store: &LogStore<B>, user_id: i64) -> FlatTable {
    std::iter::once(HEADER.map(String::from).to_vec())
        .chain(store.query_all(user_id).iter().map(codec::encode))
        .collect()
}

/// Write the user's export as CSV. Returns the number of data rows.
pub fn export_csv<B: Backend, W: Write>(store: &LogStore<B>, user_id: i64, writer: W) -> Result<usize> {
    let table = export(store, user_id);
    let mut wtr = csv::Writer::from_writer(writer);
    for row in &table {
        wtr.write_record(row).context("Failed to write CSV row")?;
    }
    wtr.flush().context("Failed to flush CSV output")?;
    Ok(table.len() - 1)
}

/// Read an uploaded CSV document into a flat table.
///
/// Rows may have any number of fields; validation happens in [`import`].
pub fn parse_table<R: Read>(reader: R) -> Result<FlatTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut table = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV row {}", idx + 1))?;
        table.push(record.iter().map(str::to_string).collect());
    }
    Ok(table)
}

/// Replace `user_id`'s log with the valid rows of `table`.
///
/// Rows that fail to decode, belong to another user, or carry nothing are
/// skipped with a diagnostic. When no row survives the store is not touched.
pub fn import<B: Backend>(
    store: &mut LogStore<B>,
    user_id: i64,
    table: &[Vec<String>],
    policy: CaloriesPolicy,
) -> Result<ImportReport, ImportError> {
    let (header, rows) = table.split_first().ok_or(ImportError::EmptyTable)?;
    if !codec::is_header(header) {
        return Err(ImportError::BadHeader {
            found: header.join(","),
        });
    }

    let mut report = ImportReport::default();
    let mut accepted = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        let line = codec::data_line(idx);
        let reason = match codec::decode(row, policy) {
            Err(e) => SkipReason::Row(e),
            Ok(entry) if entry.user_id != user_id => SkipReason::ForeignUser(entry.user_id),
            Ok(entry) => {
                let entry = entry.normalized();
                if validate_entry(&entry).is_ok() {
                    accepted.push(entry);
                    continue;
                }
                SkipReason::EmptyEntry
            }
        };
        warn!(user_id, line, %reason, "skipping import row");
        report.skipped.push(SkipDiagnostic { line, reason });
    }

    report.accepted = accepted.len();
    if report.nothing_imported() {
        info!(user_id, skipped = report.skipped.len(), "nothing to import");
        return Ok(report);
    }

    store
        .replace_user(user_id, accepted)
        .map_err(|source| ImportError::Persist {
            accepted: report.accepted,
            source,
        })?;
    info!(
        user_id,
        accepted = report.accepted,
        skipped = report.skipped.len(),
        "imported log"
    );
    Ok(report)
}
