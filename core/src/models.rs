use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minute-precision timestamp format stored in every log row.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Day prefix format used by "today" queries.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One recorded food or photo log for a user at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub user_id: i64,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_reference: Option<String>,
}

impl LogEntry {
    /// A text-logged entry: food label plus calorie count.
    pub fn food(
        user_id: i64,
        timestamp: impl Into<String>,
        food: impl Into<String>,
        calories: i64,
    ) -> Self {
        Self {
            user_id,
            timestamp: timestamp.into(),
            food: Some(food.into()),
            calories: Some(calories),
            media_reference: None,
        }
    }

    /// A photo-logged entry with no food label.
    pub fn photo(user_id: i64, timestamp: impl Into<String>, media: impl Into<String>) -> Self {
        Self {
            user_id,
            timestamp: timestamp.into(),
            food: None,
            calories: None,
            media_reference: Some(media.into()),
        }
    }

    #[must_use]
    pub fn with_media(mut self, media: impl Into<String>) -> Self {
        self.media_reference = Some(media.into());
        self
    }

    /// True when the entry carries no food, no calories and no media reference.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.food.is_none() && self.calories.is_none() && self.media_reference.is_none()
    }

    /// Collapse empty-string labels to absent and trim the timestamp, so the
    /// flat row round-trips.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.timestamp.trim().len() != self.timestamp.len() {
            self.timestamp = self.timestamp.trim().to_string();
        }
        self.food = self.food.filter(|f| !f.is_empty());
        self.media_reference = self.media_reference.filter(|m| !m.is_empty());
        self
    }

    /// Whether this entry falls on the given `YYYY-MM-DD` day.
    #[must_use]
    pub fn is_on(&self, date_prefix: &str) -> bool {
        self.timestamp.starts_with(date_prefix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("entry has no food, no calories and no photo")]
    EmptyEntry,
    #[error("calories must not be negative (got {0})")]
    NegativeCalories(i64),
}

pub fn validate_entry(entry: &LogEntry) -> Result<(), ValidationError> {
    if entry.is_empty() {
        return Err(ValidationError::EmptyEntry);
    }
    if let Some(cal) = entry.calories.filter(|c| *c < 0) {
        return Err(ValidationError::NegativeCalories(cal));
    }
    Ok(())
}

/// Sum of calories over a sequence of entries; absent values count as zero.
///
/// Saturates at `i64::MAX` instead of wrapping.
pub fn total_calories<'a>(entries: impl IntoIterator<Item = &'a LogEntry>) -> i64 {
    entries
        .into_iter()
        .filter_map(|e| e.calories)
        .fold(0i64, |total, c| total.saturating_add(c.max(0)))
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub user_id: i64,
    pub date: String,
    pub entries: Vec<LogEntry>,
    pub total_calories: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistorySummary {
    pub user_id: i64,
    pub entries: Vec<LogEntry>,
    pub total_calories: i64,
}

/// Current local time in the stored timestamp format.
#[must_use]
pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Today's local date as a `YYYY-MM-DD` prefix.
#[must_use]
pub fn today_prefix() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}
