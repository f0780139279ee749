mod helpers;
mod log;
mod summary;
mod sync;
mod transfer;

use anyhow::{Context, Result};

use oink_core::LogStore;
use oink_core::backend::Backend;
use oink_core::store::ReconcileReport;

use helpers::print_skipped;

pub(crate) use log::{cmd_log, cmd_photo};
pub(crate) use summary::{cmd_history, cmd_today};
pub(crate) use sync::cmd_sync;
pub(crate) use transfer::{cmd_export, cmd_import};

/// Read the durable log into memory. Skipped rows go to stderr when `report` is set.
pub(crate) fn load<B: Backend>(store: &mut LogStore<B>, report: bool) -> Result<ReconcileReport> {
    let outcome = store.reconcile().context("Failed to read the food log")?;
    if report {
        print_skipped(&outcome.skipped);
    }
    Ok(outcome)
}
