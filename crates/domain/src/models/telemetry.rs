//! Telemetry measurement kinds and typed rows.
//!
//! These mirror the four time series the telemetry source exposes. Rows
//! are read-only inputs to the report pipeline; nothing here writes back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four telemetry series consumed by the report pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    AfkStatus,
    WindowActivity,
    AppUsage,
    DailyMetrics,
}

impl MeasurementKind {
    /// All measurement kinds, in the order the pipeline queries them.
    pub const ALL: [MeasurementKind; 4] = [
        MeasurementKind::AfkStatus,
        MeasurementKind::WindowActivity,
        MeasurementKind::AppUsage,
        MeasurementKind::DailyMetrics,
    ];

    /// The measurement name used by the telemetry source.
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementKind::AfkStatus => "afk_status",
            MeasurementKind::WindowActivity => "window_activity",
            MeasurementKind::AppUsage => "app_usage",
            MeasurementKind::DailyMetrics => "daily_metrics",
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One presence/AFK sample.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AfkStatusRow {
    pub time: DateTime<Utc>,
    /// "afk" or "not-afk".
    pub status: String,
    pub duration: i64,
}

/// One focused-window sample.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WindowActivityRow {
    pub time: DateTime<Utc>,
    pub app: String,
    pub title: String,
    pub duration: i64,
}

/// One aggregated app-usage sample.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppUsageRow {
    pub time: DateTime<Utc>,
    pub app_name: String,
    pub duration_seconds: i64,
    pub event_count: i64,
}

/// One daily aggregate sample.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyMetricsRow {
    pub time: DateTime<Utc>,
    /// YYYY-MM-DD
    pub date: String,
    pub active_seconds: i64,
    pub afk_seconds: i64,
    pub idle_seconds: i64,
    pub app_switches: i64,
    pub utilization_ratio: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_names() {
        assert_eq!(MeasurementKind::AfkStatus.as_str(), "afk_status");
        assert_eq!(MeasurementKind::WindowActivity.as_str(), "window_activity");
        assert_eq!(MeasurementKind::AppUsage.as_str(), "app_usage");
        assert_eq!(MeasurementKind::DailyMetrics.as_str(), "daily_metrics");
    }

    #[test]
    fn test_all_covers_four_kinds() {
        assert_eq!(MeasurementKind::ALL.len(), 4);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&MeasurementKind::DailyMetrics).unwrap(),
            "\"daily_metrics\""
        );
    }
}
