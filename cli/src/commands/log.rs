use anyhow::{Context, Result, bail};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::process;

use oink_core::backend::Backend;
use oink_core::message::{ParseError, format_logged_reply, parse_food_message, photo_entry};
use oink_core::models::timestamp_now;
use oink_core::{LogEntry, LogStore};

use super::helpers::json_error;

pub(crate) fn cmd_log<B: Backend>(
    store: &mut LogStore<B>,
    user_id: i64,
    text: &str,
    json: bool,
) -> Result<()> {
    let msg = parse_food_message(text).unwrap_or_else(|e| reject(&e, json));
    let entry = LogEntry::food(user_id, timestamp_now(), msg.food, msg.calories);
    save(store, entry, json)
}

pub(crate) fn cmd_photo<B: Backend>(
    store: &mut LogStore<B>,
    user_id: i64,
    photo: &Path,
    caption: Option<&str>,
    photos_dir: &Path,
    json: bool,
) -> Result<()> {
    // Validate the caption before copying anything.
    if let Some(text) = caption.map(str::trim).filter(|c| !c.is_empty()) {
        if let Err(e) = parse_food_message(text) {
            reject(&e, json);
        }
    }

    let stored = store_photo(photos_dir, user_id, photo)?;
    let media = stored.to_string_lossy();
    let entry =
        photo_entry(user_id, &timestamp_now(), &media, caption).unwrap_or_else(|e| reject(&e, json));
    save(store, entry, json)
}

fn reject(err: &ParseError, json: bool) -> ! {
    if json {
        println!("{}", json_error(&err.to_string()));
    } else {
        eprintln!("{err}");
    }
    process::exit(2);
}

fn save<B: Backend>(store: &mut LogStore<B>, entry: LogEntry, json: bool) -> Result<()> {
    store
        .append(entry.clone())
        .context("Failed to save your log entry")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!("{}", format_logged_reply(&entry));
    }
    Ok(())
}

/// Copy the photo into the photos directory as `{user_id}_{timestamp}.{ext}`.
pub(crate) fn store_photo(photos_dir: &Path, user_id: i64, source: &Path) -> Result<PathBuf> {
    if !source.is_file() {
        bail!("Photo not found: {}", source.display());
    }
    std::fs::create_dir_all(photos_dir).with_context(|| {
        format!("Failed to create photos directory: {}", photos_dir.display())
    })?;

    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("jpg")
        .to_lowercase();
    let stamp = Local::now().format("%Y%m%d%H%M%S");
    let dest = photos_dir.join(format!("{user_id}_{stamp}.{ext}"));
    std::fs::copy(source, &dest)
        .with_context(|| format!("Failed to copy photo {}", source.display()))?;
    Ok(dest)
}
