//! Conversion between [`LogEntry`] and the flat 5-column backend row.
//!
//! Row layout: `user_id,time,food,calories,photo_path`. Absent optional
//! fields are written as empty strings and read back as absent.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::LogEntry;

pub const HEADER: [&str; 5] = ["user_id", "time", "food", "calories", "photo_path"];

/// Older remote sheets name the time column `timestamp`.
const TIME_ALIAS: &str = "timestamp";

/// A header-keyed record as returned by a remote table.
pub type RemoteRecord = serde_json::Map<String, Value>;

/// How to treat a calories field that is not a non-negative integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaloriesPolicy {
    /// Legacy behavior: substitute zero and keep the row.
    #[default]
    SubstituteZero,
    /// Reject the row.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("too few columns (expected 5, got {0})")]
    TooFewColumns(usize),
    #[error("malformed user id '{0}'")]
    MalformedUserId(String),
    #[error("malformed calories '{0}'")]
    MalformedCalories(String),
}

/// Why a row was left out of a read or an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Row(RowError),
    Unreadable(String),
    EmptyEntry,
    ForeignUser(i64),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Row(e) => write!(f, "{e}"),
            SkipReason::Unreadable(e) => write!(f, "unreadable row: {e}"),
            SkipReason::EmptyEntry => write!(f, "row has no food, calories or photo"),
            SkipReason::ForeignUser(id) => write!(f, "row belongs to user {id}"),
        }
    }
}

/// A skipped row, numbered by its line in the table (the header is line 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipDiagnostic {
    pub line: usize,
    pub reason: SkipReason,
}

impl fmt::Display for SkipDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

/// Line number of the `idx`-th data row (zero-based) in a table with a header.
#[must_use]
pub fn data_line(idx: usize) -> usize {
    idx + 2
}

#[must_use]
pub fn encode(entry: &LogEntry) -> Vec<String> {
    vec![
        entry.user_id.to_string(),
        entry.timestamp.clone(),
        entry.food.clone().unwrap_or_default(),
        entry.calories.map(|c| c.to_string()).unwrap_or_default(),
        entry.media_reference.clone().unwrap_or_default(),
    ]
}

/// Decode a positional row. Extra trailing columns are ignored.
///
/// The decoder is permissive about rows with no food, calories or photo;
/// callers that need the non-empty invariant must check it themselves.
pub fn decode<S: AsRef<str>>(row: &[S], policy: CaloriesPolicy) -> Result<LogEntry, RowError> {
    let [user_id, time, food, calories, media, ..] = row else {
        return Err(RowError::TooFewColumns(row.len()));
    };
    decode_fields(
        user_id.as_ref(),
        time.as_ref(),
        food.as_ref(),
        calories.as_ref(),
        media.as_ref(),
        policy,
    )
}

/// Decode a header-keyed remote record.
pub fn decode_record(record: &RemoteRecord, policy: CaloriesPolicy) -> Result<LogEntry, RowError> {
    let Some(user_id) = record.get(HEADER[0]) else {
        return Err(RowError::TooFewColumns(record.len()));
    };
    let field = |name: &str| record.get(name).map(value_to_string).unwrap_or_default();
    let time = record
        .get(HEADER[1])
        .or_else(|| record.get(TIME_ALIAS))
        .map(value_to_string)
        .unwrap_or_default();

    decode_fields(
        &value_to_string(user_id),
        &time,
        &field(HEADER[2]),
        &field(HEADER[3]),
        &field(HEADER[4]),
        policy,
    )
}

/// Build the header-keyed record for an entry, the inverse of [`decode_record`].
#[must_use]
pub fn encode_record(entry: &LogEntry) -> RemoteRecord {
    HEADER
        .iter()
        .zip(encode(entry))
        .map(|(name, value)| ((*name).to_string(), Value::String(value)))
        .collect()
}

/// True when `row` is exactly the five backend columns (case-insensitive,
/// `timestamp` accepted for `time`).
pub fn is_header<S: AsRef<str>>(row: &[S]) -> bool {
    row.len() == HEADER.len()
        && row.iter().zip(HEADER).enumerate().all(|(i, (got, want))| {
            let got = got.as_ref().trim();
            got.eq_ignore_ascii_case(want) || (i == 1 && got.eq_ignore_ascii_case(TIME_ALIAS))
        })
}

fn decode_fields(
    user_id: &str,
    time: &str,
    food: &str,
    calories: &str,
    media: &str,
    policy: CaloriesPolicy,
) -> Result<LogEntry, RowError> {
    let user_id = user_id
        .trim()
        .parse::<i64>()
        .map_err(|_| RowError::MalformedUserId(user_id.to_string()))?;

    let calories = match calories.trim() {
        "" => None,
        raw => match raw.parse::<i64>() {
            Ok(c) if c >= 0 => Some(c),
            _ if policy == CaloriesPolicy::SubstituteZero => Some(0),
            _ => return Err(RowError::MalformedCalories(raw.to_string())),
        },
    };

    Ok(LogEntry {
        user_id,
        timestamp: time.trim().to_string(),
        food: non_empty(food),
        calories,
        media_reference: non_empty(media),
    })
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_encode_absent_fields_as_empty() {
        let photo = LogEntry::photo(7, "2024-01-05 10:00", "photos/7.jpg");
        assert_eq!(
            encode(&photo),
            row(&["7", "2024-01-05 10:00", "", "", "photos/7.jpg"])
        );

        let zero = LogEntry::food(7, "2024-01-05 10:00", "water", 0);
        assert_eq!(encode(&zero)[3], "0");
    }

    #[test]
    fn test_decode_food_row() {
        let entry = decode(
            &row(&["42", "2024-03-01 08:00", "apple", "95", ""]),
            CaloriesPolicy::default(),
        )
        .unwrap();
        assert_eq!(entry, LogEntry::food(42, "2024-03-01 08:00", "apple", 95));
    }

    #[test]
    fn test_decode_too_few_columns() {
        let err = decode(&row(&["42", "2024-03-01 08:00", "apple"]), CaloriesPolicy::Strict)
            .unwrap_err();
        assert_eq!(err, RowError::TooFewColumns(3));
    }

    #[test]
    fn test_decode_malformed_user_id() {
        let err = decode(
            &row(&["abc", "2024-03-01 08:00", "apple", "95", ""]),
            CaloriesPolicy::default(),
        )
        .unwrap_err();
        assert_eq!(err, RowError::MalformedUserId("abc".to_string()));
    }

    #[test]
    fn test_decode_bad_calories_substitutes_zero() {
        let entry = decode(
            &row(&["42", "2024-03-01 08:00", "apple", "lots", ""]),
            CaloriesPolicy::SubstituteZero,
        )
        .unwrap();
        assert_eq!(entry.calories, Some(0));
        assert_eq!(entry.food.as_deref(), Some("apple"));
    }

    #[test]
    fn test_decode_bad_calories_strict_rejects() {
        let err = decode(
            &row(&["42", "2024-03-01 08:00", "apple", "95.5", ""]),
            CaloriesPolicy::Strict,
        )
        .unwrap_err();
        assert_eq!(err, RowError::MalformedCalories("95.5".to_string()));

        let err = decode(
            &row(&["42", "2024-03-01 08:00", "apple", "-3", ""]),
            CaloriesPolicy::Strict,
        )
        .unwrap_err();
        assert_eq!(err, RowError::MalformedCalories("-3".to_string()));
    }

    #[test]
    fn test_decode_empty_row_is_permissive() {
        let entry = decode(
            &row(&["42", "2024-03-01 08:00", "", "", ""]),
            CaloriesPolicy::Strict,
        )
        .unwrap();
        assert!(entry.is_empty());
    }

    #[test]
    fn test_decode_ignores_extra_columns() {
        let entry = decode(
            &row(&["1", "2024-03-01 08:00", "", "", "p.jpg", "note"]),
            CaloriesPolicy::Strict,
        )
        .unwrap();
        assert_eq!(entry.media_reference.as_deref(), Some("p.jpg"));
    }

    #[test]
    fn test_decode_record_by_header_name() {
        let record = json!({
            "photo_path": "",
            "calories": 95,
            "food": "apple",
            "timestamp": "2024-03-01 08:00",
            "user_id": 42,
        });
        let entry = decode_record(record.as_object().unwrap(), CaloriesPolicy::Strict).unwrap();
        assert_eq!(entry, LogEntry::food(42, "2024-03-01 08:00", "apple", 95));
    }

    #[test]
    fn test_decode_record_missing_user_id() {
        let record = json!({ "time": "2024-03-01 08:00", "food": "apple" });
        let err = decode_record(record.as_object().unwrap(), CaloriesPolicy::Strict).unwrap_err();
        assert!(matches!(err, RowError::TooFewColumns(_)));
    }

    #[test]
    fn test_encode_record_round_trips() {
        let entry = LogEntry::food(3, "2024-03-01 08:00", "soup, hot", 120).with_media("s.jpg");
        let back = decode_record(&encode_record(&entry), CaloriesPolicy::Strict).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_is_header() {
        assert!(is_header(&HEADER));
        assert!(is_header(&row(&["User_ID", "timestamp", "food", "calories", "photo_path"])));
        assert!(!is_header(&row(&["user_id", "time", "food"])));
        assert!(!is_header(&row(&[
            "user_id", "time", "food", "calories", "photo_path", "notes"
        ])));
        assert!(!is_header(&row(&["1", "2024-03-01 08:00", "apple", "95", ""])));
    }
}
