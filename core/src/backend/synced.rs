use std::fs;

use tracing::{debug, info, warn};

use super::{Backend, BackendError, LocalCsvBackend, ReadOutcome};
use crate::models::LogEntry;

/// A cloud file store holding a copy of the local log file.
pub trait FileStore {
    fn upload(&self, name: &str, contents: &[u8]) -> Result<(), BackendError>;
    /// Returns `Ok(None)` when the remote file does not exist.
    fn download(&self, name: &str) -> Result<Option<Vec<u8>>, BackendError>;
}

/// Local CSV mirrored to a [`FileStore`].
///
/// Writes land locally first and are then uploaded best-effort; reads pull
/// the remote copy over the local file when one is available. Between a
/// failed upload and the next successful one the two copies differ.
#[derive(Debug)]
pub struct SyncedCsvBackend<F> {
    local: LocalCsvBackend,
    store: F,
    remote_name: String,
}

impl<F: FileStore> SyncedCsvBackend<F> {
    pub fn new(local: LocalCsvBackend, store: F, remote_name: impl Into<String>) -> Self {
        Self {
            local,
            store,
            remote_name: remote_name.into(),
        }
    }

    pub fn local(&self) -> &LocalCsvBackend {
        &self.local
    }

    pub fn store(&self) -> &F {
        &self.store
    }

    /// Upload the whole local file. Failures are logged, never returned.
    fn push(&self) {
        let contents = match fs::read(self.local.path()) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "could not read local log for upload");
                return;
            }
        };
        match self.store.upload(&self.remote_name, &contents) {
            Ok(()) => debug!(name = %self.remote_name, bytes = contents.len(), "uploaded log file"),
            Err(e) => warn!(name = %self.remote_name, error = %e, "upload failed, local copy kept"),
        }
    }

    fn pull(&self) -> Result<(), BackendError> {
        match self.store.download(&self.remote_name)? {
            Some(bytes) => {
                self.local.ensure_parent_dir()?;
                fs::write(self.local.path(), &bytes)?;
                info!(name = %self.remote_name, bytes = bytes.len(), "refreshed log from remote");
            }
            None => debug!(name = %self.remote_name, "no remote copy yet"),
        }
        Ok(())
    }
}

impl<F: FileStore> Backend for SyncedCsvBackend<F> {
    /// A failed download falls back to the local copy. With no local copy
    /// the failure is returned: initializing here would upload an empty log
    /// over the remote one.
    fn read_all(&mut self) -> Result<ReadOutcome, BackendError> {
        let pulled = self.pull();
        let outcome = self.local.read_all()?;
        match pulled {
            Ok(()) => Ok(outcome),
            Err(e) if outcome.needs_init => Err(e),
            Err(e) => {
                warn!(name = %self.remote_name, error = %e, "download failed, reading local copy");
                Ok(outcome)
            }
        }
    }

    fn write_all(&mut self, entries: &[LogEntry]) -> Result<(), BackendError> {
        self.local.write_all(entries)?;
        self.push();
        Ok(())
    }

    fn append(&mut self, entry: &LogEntry) -> Result<(), BackendError> {
        self.local.append(entry)?;
        self.push();
        Ok(())
    }
}
