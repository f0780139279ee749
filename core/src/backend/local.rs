use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{Backend, BackendError, ReadOutcome};
use crate::codec::{self, CaloriesPolicy, HEADER, SkipDiagnostic, SkipReason};
use crate::models::LogEntry;

/// A CSV file with a `user_id,time,food,calories,photo_path` header.
#[derive(Debug, Clone)]
pub struct LocalCsvBackend {
    path: PathBuf,
    policy: CaloriesPolicy,
}

impl LocalCsvBackend {
    pub fn new(path: impl Into<PathBuf>, policy: CaloriesPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn push_record(
        &self,
        outcome: &mut ReadOutcome,
        line: usize,
        result: Result<csv::StringRecord, csv::Error>,
    ) {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                outcome.skipped.push(SkipDiagnostic {
                    line,
                    reason: SkipReason::Unreadable(e.to_string()),
                });
                return;
            }
        };
        let fields: Vec<&str> = record.iter().collect();
        match codec::decode(&fields, self.policy) {
            Ok(entry) => outcome.push(line, entry),
            Err(e) => outcome.skipped.push(SkipDiagnostic {
                line,
                reason: SkipReason::Row(e),
            }),
        }
    }

    pub(super) fn ensure_parent_dir(&self) -> io::Result<()> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
            _ => Ok(()),
        }
    }
}

impl Backend for LocalCsvBackend {
    fn read_all(&mut self) -> Result<ReadOutcome, BackendError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "log file missing, needs init");
                return Ok(ReadOutcome::uninitialized());
            }
            Err(e) => return Err(e.into()),
        };

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut outcome = ReadOutcome::default();
        let mut records = rdr.records();

        match records.next() {
            None => return Ok(outcome),
            Some(Ok(first)) if codec::is_header(&first.iter().collect::<Vec<_>>()) => {}
            Some(first) => {
                warn!(
                    path = %self.path.display(),
                    "log file has no {} header, reading line 1 as data",
                    HEADER.join(",")
                );
                self.push_record(&mut outcome, 1, first);
            }
        }

        for (idx, result) in records.enumerate() {
            self.push_record(&mut outcome, codec::data_line(idx), result);
        }

        debug!(
            path = %self.path.display(),
            entries = outcome.entries.len(),
            skipped = outcome.skipped.len(),
            "read log file"
        );
        Ok(outcome)
    }

    fn write_all(&mut self, entries: &[LogEntry]) -> Result<(), BackendError> {
        self.ensure_parent_dir()?;
        let mut wtr = csv::Writer::from_writer(File::create(&self.path)?);
        wtr.write_record(HEADER)?;
        for entry in entries {
            wtr.write_record(codec::encode(entry))?;
        }
        wtr.flush()?;
        debug!(path = %self.path.display(), rows = entries.len(), "rewrote log file");
        Ok(())
    }

    fn append(&mut self, entry: &LogEntry) -> Result<(), BackendError> {
        self.ensure_parent_dir()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if file.metadata()?.len() == 0 {
            let mut wtr = csv::Writer::from_writer(&mut file);
            wtr.write_record(HEADER)?;
            wtr.flush()?;
        }
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut file);
        wtr.write_record(codec::encode(entry))?;
        wtr.flush()?;
        drop(wtr);
        file.flush()?;
        Ok(())
    }
}
