//! Parsing "food, calories" messages and formatting replies.

use std::fmt::Write;

use thiserror::Error;

use crate::models::{DaySummary, HistorySummary, LogEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoodMessage {
    pub food: String,
    pub calories: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Please log like this: food, calories (e.g., pizza, 300)")]
    MissingSeparator,
    #[error("Food name can't be empty. Example: apple, 95")]
    EmptyFood,
    #[error("Calories must be a number. Example: apple, 95")]
    InvalidCalories(String),
}

/// Parse `"<food>, <calories>"`. The last comma separates the two, so a
/// food name may itself contain commas.
pub fn parse_food_message(text: &str) -> Result<FoodMessage, ParseError> {
    let (food, calories) = text
        .trim()
        .rsplit_once(',')
        .ok_or(ParseError::MissingSeparator)?;
    let food = food.trim();
    let calories = calories.trim();

    if food.is_empty() {
        return Err(ParseError::EmptyFood);
    }
    let calories = calories
        .parse::<i64>()
        .ok()
        .filter(|c| *c >= 0)
        .ok_or_else(|| ParseError::InvalidCalories(calories.to_string()))?;

    Ok(FoodMessage {
        food: food.to_string(),
        calories,
    })
}

/// Build the entry for a photo, optionally captioned with "food, calories".
pub fn photo_entry(
    user_id: i64,
    timestamp: &str,
    media_reference: &str,
    caption: Option<&str>,
) -> Result<LogEntry, ParseError> {
    match caption.map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(LogEntry::photo(user_id, timestamp, media_reference)),
        Some(caption) => {
            let msg = parse_food_message(caption)?;
            Ok(LogEntry::food(user_id, timestamp, msg.food, msg.calories).with_media(media_reference))
        }
    }
}

#[must_use]
pub fn format_entry_line(entry: &LogEntry) -> String {
    let time = &entry.timestamp;
    let mut line = match (&entry.food, entry.calories) {
        (Some(food), Some(cal)) => format!("{time} — {food} ({cal} kcal)"),
        (Some(food), None) => format!("{time} — {food}"),
        (None, Some(cal)) => format!("{time} — {cal} kcal"),
        (None, None) => {
            let media = entry.media_reference.as_deref().unwrap_or("?");
            return format!("{time} — 📸 Photo logged: {media}");
        }
    };
    if entry.media_reference.is_some() {
        line.push_str(" 📸");
    }
    line
}

/// Confirmation sent after a successful append.
#[must_use]
pub fn format_logged_reply(entry: &LogEntry) -> String {
    match (&entry.food, entry.calories, &entry.media_reference) {
        (Some(food), Some(cal), Some(_)) => format!("📸✅ Logged with photo: {food} ({cal} kcal)"),
        (Some(food), Some(cal), None) => format!("Logged: {food} ({cal} kcal)"),
        (None, None, Some(_)) => "Photo logged! 📸".to_string(),
        _ => format!("Logged: {}", format_entry_line(entry)),
    }
}

#[must_use]
pub fn format_day_reply(summary: &DaySummary) -> String {
    if summary.entries.is_empty() {
        return format!("Nothing logged on {}. Get munching! 🐷", summary.date);
    }
    let mut out = format!("Food log for {}:\n", summary.date);
    for entry in &summary.entries {
        let _ = writeln!(out, "{}", format_entry_line(entry));
    }
    let _ = write!(out, "\nTotal calories: {} kcal", summary.total_calories);
    out
}

#[must_use]
pub fn format_history_reply(summary: &HistorySummary) -> String {
    if summary.entries.is_empty() {
        return "Your trough is empty. Start logging.".to_string();
    }
    let mut out = String::from("Here's your oinklog:\n");
    for entry in &summary.entries {
        let _ = writeln!(out, "{}", format_entry_line(entry));
    }
    let _ = write!(out, "\nTotal calories: {} kcal", summary.total_calories);
    out
}
