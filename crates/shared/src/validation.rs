//! Common validation utilities for report request payloads.

use chrono::NaiveDate;
use validator::ValidationError;

/// Wire format for day-granularity dates (YYYY-MM-DD).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a date string in YYYY-MM-DD format.
pub fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
        let mut err = ValidationError::new("date_format");
        err.message = Some("Date must be in YYYY-MM-DD format".into());
        err
    })
}

/// Validates that a string is a well-formed YYYY-MM-DD date.
pub fn validate_date_str(value: &str) -> Result<(), ValidationError> {
    parse_date(value).map(|_| ())
}

/// Validates that a date range is well-formed and not inverted.
pub fn validate_date_range(start: &str, end: &str) -> Result<(), ValidationError> {
    let start_date = parse_date(start)?;
    let end_date = parse_date(end)?;
    if end_date < start_date {
        let mut err = ValidationError::new("date_range");
        err.message = Some("End date must not be before start date".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that a user list is non-empty.
pub fn validate_user_count(count: usize) -> Result<(), ValidationError> {
    if count == 0 {
        let mut err = ValidationError::new("users_empty");
        err.message = Some("At least one user is required".into());
        return Err(err);
    }
    Ok(())
}
