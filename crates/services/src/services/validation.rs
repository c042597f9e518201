//! Input checks shared by the services. Everything here is pure.

use chrono::NaiveDate;
use db::models::line_item::LineItemInput;
use thiserror::Error;
use utils::dates::{DateError, parse_date, parse_optional_date, validate_range};

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Date(#[from] DateError),
}

impl ValidationError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ValidationError::Invalid(message.into())
    }
}

/// Trimmed, non-empty text.
pub fn required_text(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::invalid(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Blank optional text is stored as NULL.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn email(value: Option<String>) -> Result<Option<String>, ValidationError> {
    match optional_text(value) {
        Some(email) if !email.contains('@') || email.starts_with('@') || email.ends_with('@') => {
            Err(ValidationError::invalid(format!("'{email}' is not a valid email address")))
        }
        other => Ok(other),
    }
}

pub fn non_negative_cents(field: &str, cents: i64) -> Result<i64, ValidationError> {
    if cents < 0 {
        return Err(ValidationError::invalid(format!("{field} cannot be negative")));
    }
    Ok(cents)
}

pub fn tax_rate(rate: f64) -> Result<f64, ValidationError> {
    if !rate.is_finite() || !(0.0..=100.0).contains(&rate) {
        return Err(ValidationError::invalid("tax_rate must be between 0 and 100"));
    }
    Ok(rate)
}

pub fn percentage(value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() || value <= 0.0 || value > 100.0 {
        return Err(ValidationError::invalid(
            "percentage must be greater than 0 and at most 100",
        ));
    }
    Ok(value)
}

pub fn line_items(items: &[LineItemInput]) -> Result<(), ValidationError> {
    for (index, item) in items.iter().enumerate() {
        let line = index + 1;
        if item.description.trim().is_empty() {
            return Err(ValidationError::invalid(format!("line {line}: description is required")));
        }
        if !item.quantity.is_finite() || item.quantity <= 0.0 {
            return Err(ValidationError::invalid(format!(
                "line {line}: quantity must be greater than 0"
            )));
        }
        if item.unit_price_cents < 0 {
            return Err(ValidationError::invalid(format!(
                "line {line}: unit price cannot be negative"
            )));
        }
    }
    Ok(())
}

/// A required date plus an optional later one, returned normalised.
pub fn date_pair(
    start_field: &str,
    start: &str,
    end_field: &str,
    end: Option<&str>,
) -> Result<(NaiveDate, Option<NaiveDate>), ValidationError> {
    let start_date = parse_date(start_field, start)?;
    let end_date = parse_optional_date(end_field, end)?;
    validate_range(start_field, Some(start_date), end_field, end_date)?;
    Ok((start_date, end_date))
}

pub fn optional_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ValidationError> {
    Ok(parse_optional_date(field, value)?)
}

/// Parse `value` when given and non-blank, otherwise use `fallback`.
pub fn date_or(field: &str, value: Option<&str>, fallback: NaiveDate) -> Result<NaiveDate, ValidationError> {
    Ok(parse_optional_date(field, value)?.unwrap_or(fallback))
}

pub fn date_order(
    start_field: &str,
    start: NaiveDate,
    end_field: &str,
    end: Option<NaiveDate>,
) -> Result<(), ValidationError> {
    Ok(validate_range(start_field, Some(start), end_field, end)?)
}

/// Two optional dates where the second may not precede the first.
pub fn optional_date_pair(
    start_field: &str,
    start: Option<&str>,
    end_field: &str,
    end: Option<&str>,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), ValidationError> {
    let start_date = parse_optional_date(start_field, start)?;
    let end_date = parse_optional_date(end_field, end)?;
    validate_range(start_field, start_date, end_field, end_date)?;
    Ok((start_date, end_date))
}
