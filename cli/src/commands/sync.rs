use anyhow::Result;
use serde::Serialize;

use oink_core::LogStore;
use oink_core::backend::Backend;

use super::helpers::{SkippedRow, skipped_rows};
use super::load;

pub(crate) fn cmd_sync<B: Backend>(store: &mut LogStore<B>, json: bool) -> Result<()> {
    #[derive(Serialize)]
    struct SyncSummary {
        users: usize,
        entries: usize,
        initialized: bool,
        skipped: Vec<SkippedRow>,
    }

    let report = load(store, !json)?;

    if json {
        let summary = SyncSummary {
            users: report.users,
            entries: report.entries,
            initialized: report.initialized,
            skipped: skipped_rows(&report.skipped),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if report.initialized {
        println!("Created a new, empty log.");
    }
    let entries = report.entries;
    let users = report.users;
    println!("Synced {entries} entries for {users} users.");
    Ok(())
}
