use std::path::Path;

use anyhow::{Context, Result};
use tokio::runtime::Handle;

use oink_core::backend::{Backend, LocalCsvBackend, RemoteTableBackend, SyncedCsvBackend};

use crate::config::{BackendConfig, Config, LOG_FILE_NAME};
use crate::remote::{Credentials, HttpFileStore, HttpRemoteTable};

/// Build the configured backend. The choice is fixed for the process.
pub fn open_backend(config: &Config, rt: &Handle) -> Result<Box<dyn Backend>> {
    let policy = config.calories_policy;
    let credentials = |token_file: Option<&Path>| {
        Credentials::new(config.remote_token.clone(), token_file.map(|p| config.resolve(p)))
    };

    let backend: Box<dyn Backend> = match &config.backend {
        BackendConfig::Local { .. } => Box::new(LocalCsvBackend::new(config.log_path(), policy)),
        BackendConfig::Remote { url, token_file } => {
            let table = HttpRemoteTable::new(url, credentials(token_file.as_deref()), rt.clone())
                .with_context(|| format!("Failed to connect to remote table at {url}"))?;
            Box::new(RemoteTableBackend::new(table, policy))
        }
        BackendConfig::Synced {
            url,
            remote_name,
            token_file,
            ..
        } => {
            let store = HttpFileStore::new(url, &credentials(token_file.as_deref()), rt.clone())
                .with_context(|| format!("Failed to connect to file store at {url}"))?;
            let local = LocalCsvBackend::new(config.log_path(), policy);
            let name = remote_name.as_deref().unwrap_or(LOG_FILE_NAME);
            Box::new(SyncedCsvBackend::new(local, store, name))
        }
    };
    Ok(backend)
}
