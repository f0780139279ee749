use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use oink_core::LogEntry;
use oink_core::codec::SkipDiagnostic;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD, today or yesterday")
            }),
        },
    }
}

pub(crate) fn print_entry_table(entries: &[LogEntry]) {
    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Food")]
        food: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Photo")]
        photo: String,
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| EntryRow {
            time: e.timestamp.clone(),
            food: e.food.as_deref().map(|f| truncate(f, 35)).unwrap_or_default(),
            calories: e.calories.map_or("-".into(), |c| c.to_string()),
            photo: e
                .media_reference
                .as_deref()
                .map(|m| truncate(m, 30))
                .unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

/// Report rows that were left out of a read or import, one per line on stderr.
pub(crate) fn print_skipped(skipped: &[SkipDiagnostic]) {
    for diag in skipped {
        eprintln!("Skipped {diag}");
    }
}

#[derive(Serialize)]
pub(crate) struct SkippedRow {
    line: usize,
    reason: String,
}

pub(crate) fn skipped_rows(skipped: &[SkipDiagnostic]) -> Vec<SkippedRow> {
    skipped
        .iter()
        .map(|d| SkippedRow {
            line: d.line,
            reason: d.reason.to_string(),
        })
        .collect()
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
