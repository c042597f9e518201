//! Calendar date helpers. Dates travel as `YYYY-MM-DD` strings end to end.

use chrono::{Duration, Local, NaiveDate, SecondsFormat, Utc};
use thiserror::Error;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq)]
pub enum DateError {
    #[error("{field}: '{value}' is not a valid date (expected YYYY-MM-DD)")]
    Invalid { field: String, value: String },
    #[error("{end_field} ({end}) cannot be before {start_field} ({start})")]
    OutOfOrder {
        start_field: String,
        start: NaiveDate,
        end_field: String,
        end: NaiveDate,
    },
}

/// Parse a strict `YYYY-MM-DD` date; `field` names the input in the error.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, DateError> {
    let trimmed = value.trim();
    // chrono accepts "2024-1-5"; the client always zero-pads, so anything else is a typo
    if trimmed.len() != 10 {
        return Err(DateError::Invalid {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|_| DateError::Invalid {
        field: field.to_string(),
        value: value.to_string(),
    })
}

pub fn parse_optional_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, DateError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_date(field, v).map(Some),
        None => Ok(None),
    }
}

/// Both ends are optional; the check only applies when both are present.
pub fn validate_range(
    start_field: &str,
    start: Option<NaiveDate>,
    end_field: &str,
    end: Option<NaiveDate>,
) -> Result<(), DateError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(DateError::OutOfOrder {
            start_field: start_field.to_string(),
            start,
            end_field: end_field.to_string(),
            end,
        }),
        _ => Ok(()),
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Business days are counted in the office's local time zone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date + Duration::days(days)
}

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Long form used in printed documents, e.g. "March 4, 2025".
pub fn long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}
