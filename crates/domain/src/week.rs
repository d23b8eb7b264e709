//! Calendar-week math shared by the report pipeline and the scheduler.
//!
//! Weekly reports always cover Monday through Sunday; the recurring
//! scheduler anchors to Monday 00:00 UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// Returns the Monday and Sunday of the week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let days_from_monday = date.weekday().num_days_from_monday() as i64;
    let monday = date - Duration::days(days_from_monday);
    (monday, monday + Duration::days(6))
}

/// Returns the Monday of the calendar week preceding the one containing
/// `today`. This is the period a scheduled weekly firing reports on.
pub fn previous_week_monday(today: NaiveDate) -> NaiveDate {
    week_bounds(today - Duration::days(7)).0
}

/// Computes the next Monday 00:00:00 UTC strictly after `now`.
pub fn next_weekly_anchor(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let mut monday = today + Duration::days((7 - today.weekday().num_days_from_monday()) as i64 % 7);
    let mut anchor = Utc.from_utc_datetime(&monday.and_time(NaiveTime::MIN));
    if anchor <= now {
        monday += Duration::days(7);
        anchor = Utc.from_utc_datetime(&monday.and_time(NaiveTime::MIN));
    }
    anchor
}

/// Advances `trigger` by whole weeks until it lies strictly after `now`.
///
/// Preserves the weekday and time of day of the original trigger, so a
/// caller-supplied anchor keeps its cadence even when it is in the past.
pub fn advance_weekly(trigger: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let mut next = trigger;
    while next <= now {
        next += Duration::weeks(1);
    }
    next
}

/// Returns the HH:MM bounds of an hour-of-day slot. Hour 23 ends at 00:00.
pub fn hour_slot_bounds(hour: u8) -> (String, String) {
    (
        format!("{:02}:00", hour),
        format!("{:02}:00", (hour + 1) % 24),
    )
}

/// Converts minutes to hours, rounded to two decimal places.
pub fn minutes_to_hours(minutes: f64) -> f64 {
    (minutes / 60.0 * 100.0).round() / 100.0
}

/// Converts seconds to minutes, rounded to two decimal places.
pub fn seconds_to_minutes(seconds: i64) -> f64 {
    (seconds as f64 / 60.0 * 100.0).round() / 100.0
}
