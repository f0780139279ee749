use anyhow::Result;
use std::process;

use oink_core::backend::Backend;
use oink_core::message::{format_day_reply, format_history_reply};
use oink_core::models::DATE_FORMAT;
use oink_core::LogStore;

use super::helpers::{parse_date, print_entry_table};

pub(crate) fn cmd_today<B: Backend>(
    store: &LogStore<B>,
    user_id: i64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?.format(DATE_FORMAT).to_string();
    let summary = store.day_summary(user_id, &date);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.entries.is_empty() {
        eprintln!("{}", format_day_reply(&summary));
        process::exit(2);
    }

    println!("{}", format_day_reply(&summary));
    Ok(())
}

pub(crate) fn cmd_history<B: Backend>(store: &LogStore<B>, user_id: i64, json: bool) -> Result<()> {
    let summary = store.history_summary(user_id);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.entries.is_empty() {
        eprintln!("{}", format_history_reply(&summary));
        process::exit(2);
    }

    print_entry_table(&summary.entries);
    let total = summary.total_calories;
    let count = summary.entries.len();
    println!("\n  TOTAL: {total} kcal over {count} entries");
    Ok(())
}
