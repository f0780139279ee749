use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::fs::File;
use std::io;
use std::path::Path;
use std::process;

use oink_core::backend::Backend;
use oink_core::gateway::{self, ImportError};
use oink_core::{CaloriesPolicy, LogStore};

use super::helpers::{SkippedRow, print_skipped, skipped_rows};

pub(crate) fn cmd_export<B: Backend>(
    store: &LogStore<B>,
    user_id: i64,
    out: Option<&Path>,
) -> Result<()> {
    match out {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let count = gateway::export_csv(store, user_id, file)?;
            eprintln!("Exported {count} entries to {}", path.display());
        }
        None => {
            gateway::export_csv(store, user_id, io::stdout().lock())?;
        }
    }
    Ok(())
}

pub(crate) fn cmd_import<B: Backend>(
    store: &mut LogStore<B>,
    user_id: i64,
    path: &Path,
    policy: CaloriesPolicy,
    json: bool,
) -> Result<()> {
    #[derive(Serialize)]
    struct ImportSummary {
        accepted: usize,
        skipped: Vec<SkippedRow>,
    }

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let table = gateway::parse_table(file)
        .with_context(|| format!("Failed to read CSV from {}", path.display()))?;

    let report = match gateway::import(store, user_id, &table, policy) {
        Ok(report) => report,
        Err(ImportError::Persist { accepted, source }) => {
            bail!("Accepted {accepted} entries but could not save them: {source}")
        }
        Err(e) => {
            return Err(anyhow::Error::new(e).context("Import rejected, your log was left unchanged"));
        }
    };

    if json {
        let summary = ImportSummary {
            accepted: report.accepted,
            skipped: skipped_rows(&report.skipped),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_skipped(&report.skipped);
    if report.nothing_imported() {
        eprintln!("Nothing imported, your log was left unchanged.");
        process::exit(2);
    }

    let accepted = report.accepted;
    let skipped = report.skipped.len();
    println!("Imported {accepted} entries ({skipped} skipped).");
    Ok(())
}
