//! Telemetry source client.
//!
//! Read-only access to the four telemetry measurement series, served by an
//! InfluxDB 2.x instance. Queries are Flux scripts POSTed to the v2 query
//! endpoint; responses arrive as annotated CSV and are parsed into rows
//! here. Nothing in this module writes to the telemetry store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use domain::models::{
    AfkStatusRow, AppUsageRow, DailyMetricsRow, MeasurementKind, WindowActivityRow,
};

use crate::config::TelemetryConfig;

/// Telemetry source errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry configuration invalid: {0}")]
    Config(String),

    #[error("telemetry request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("telemetry source returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// The identity triple and time range a telemetry query is scoped to.
#[derive(Debug, Clone, Copy)]
pub struct QueryScope {
    pub account_id: i64,
    pub org_id: i64,
    pub user_id: i64,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

/// Read contract over the telemetry source.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn query_afk_status(&self, scope: &QueryScope)
        -> Result<Vec<AfkStatusRow>, TelemetryError>;

    async fn query_window_activity(
        &self,
        scope: &QueryScope,
    ) -> Result<Vec<WindowActivityRow>, TelemetryError>;

    async fn query_app_usage(&self, scope: &QueryScope)
        -> Result<Vec<AppUsageRow>, TelemetryError>;

    async fn query_daily_metrics(
        &self,
        scope: &QueryScope,
    ) -> Result<Vec<DailyMetricsRow>, TelemetryError>;

    /// Executes an arbitrary Flux query and returns untyped rows. Callers
    /// are responsible for scoping the query; see the tool adapter's
    /// account-scope check.
    async fn query_raw(&self, flux: &str) -> Result<Vec<Map<String, Value>>, TelemetryError>;
}

/// InfluxDB 2.x HTTP client.
pub struct InfluxTelemetryClient {
    http: reqwest::Client,
    url: String,
    token: String,
    org: String,
    bucket: String,
}

impl InfluxTelemetryClient {
    pub fn new(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let url = config.url.trim().trim_end_matches('/').to_string();
        if url.is_empty() {
            return Err(TelemetryError::Config("url is required".into()));
        }
        if config.token.is_empty() {
            return Err(TelemetryError::Config("token is required".into()));
        }
        if config.org.is_empty() {
            return Err(TelemetryError::Config("org is required".into()));
        }
        if config.bucket.is_empty() {
            return Err(TelemetryError::Config("bucket is required".into()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            url,
            token: config.token.clone(),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
        })
    }

    /// Builds the Flux query for one measurement scoped to an identity
    /// triple and time range.
    fn measurement_query(&self, kind: MeasurementKind, scope: &QueryScope) -> String {
        build_measurement_query(&self.bucket, kind, scope)
    }

    async fn typed_query(
        &self,
        kind: MeasurementKind,
        scope: &QueryScope,
    ) -> Result<Vec<Map<String, Value>>, TelemetryError> {
        self.query_raw(&self.measurement_query(kind, scope)).await
    }
}

#[async_trait]
impl TelemetrySource for InfluxTelemetryClient {
    async fn query_afk_status(
        &self,
        scope: &QueryScope,
    ) -> Result<Vec<AfkStatusRow>, TelemetryError> {
        let rows = self.typed_query(MeasurementKind::AfkStatus, scope).await?;
        Ok(rows.iter().filter_map(afk_status_from_row).collect())
    }

    async fn query_window_activity(
        &self,
        scope: &QueryScope,
    ) -> Result<Vec<WindowActivityRow>, TelemetryError> {
        let rows = self
            .typed_query(MeasurementKind::WindowActivity, scope)
            .await?;
        Ok(rows.iter().filter_map(window_activity_from_row).collect())
    }

    async fn query_app_usage(
        &self,
        scope: &QueryScope,
    ) -> Result<Vec<AppUsageRow>, TelemetryError> {
        let rows = self.typed_query(MeasurementKind::AppUsage, scope).await?;
        Ok(rows.iter().filter_map(app_usage_from_row).collect())
    }

    async fn query_daily_metrics(
        &self,
        scope: &QueryScope,
    ) -> Result<Vec<DailyMetricsRow>, TelemetryError> {
        let rows = self.typed_query(MeasurementKind::DailyMetrics, scope).await?;
        Ok(rows.iter().filter_map(daily_metrics_from_row).collect())
    }

    async fn query_raw(&self, flux: &str) -> Result<Vec<Map<String, Value>>, TelemetryError> {
        let endpoint = format!("{}/api/v2/query?org={}", self.url, self.org);

        let response = self
            .http
            .post(&endpoint)
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "application/vnd.flux")
            .body(flux.to_string())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TelemetryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(parse_annotated_csv(&body))
    }
}

/// Builds the Flux query shared by all four measurement getters.
pub(crate) fn build_measurement_query(
    bucket: &str,
    kind: MeasurementKind,
    scope: &QueryScope,
) -> String {
    format!(
        r#"from(bucket: "{bucket}")
  |> range(start: {start}, stop: {stop})
  |> filter(fn: (r) => r["_measurement"] == "{measurement}")
  |> filter(fn: (r) => r["account_id"] == "{account_id}")
  |> filter(fn: (r) => r["org_id"] == "{org_id}")
  |> filter(fn: (r) => r["user_id"] == "{user_id}")
  |> pivot(rowKey: ["_time"], columnKey: ["_field"], valueColumn: "_value")
  |> sort(columns: ["_time"])"#,
        bucket = bucket,
        start = scope.start.to_rfc3339(),
        stop = scope.stop.to_rfc3339(),
        measurement = kind.as_str(),
        account_id = scope.account_id,
        org_id = scope.org_id,
        user_id = scope.user_id,
    )
}

/// Parses an InfluxDB 2.x annotated-CSV response into untyped rows.
///
/// Annotation lines (`#group`, `#datatype`, `#default`) are skipped; the
/// first remaining line is the header. Empty cells are omitted from the
/// row; numeric-looking cells are coerced to numbers.
pub(crate) fn parse_annotated_csv(body: &str) -> Vec<Map<String, Value>> {
    let mut lines = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));

    let headers: Vec<String> = match lines.next() {
        Some(header_line) => split_csv_line(header_line)
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect(),
        None => return Vec::new(),
    };

    let mut rows = Vec::new();
    for line in lines {
        let values = split_csv_line(line);
        let mut row = Map::new();
        for (header, value) in headers.iter().zip(values) {
            let value = value.trim();
            if header.is_empty() || value.is_empty() {
                continue;
            }
            row.insert(header.clone(), coerce_scalar(value));
        }
        if !row.is_empty() {
            rows.push(row);
        }
    }
    rows
}

/// Splits one CSV line, honoring double-quoted values and escaped quotes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                values.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    values.push(current);
    values
}

fn coerce_scalar(value: &str) -> Value {
    if let Ok(int) = value.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = value.parse::<f64>() {
        return Value::from(float);
    }
    Value::from(value)
}

fn row_time(row: &Map<String, Value>) -> Option<DateTime<Utc>> {
    let raw = row
        .get("_time")
        .or_else(|| row.get("time"))
        .and_then(Value::as_str)?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(time) => Some(time.with_timezone(&Utc)),
        Err(err) => {
            warn!(raw = raw, error = %err, "Unparsable timestamp in telemetry row");
            None
        }
    }
}

fn row_str(row: &Map<String, Value>, key: &str) -> String {
    row.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn row_i64(row: &Map<String, Value>, key: &str) -> i64 {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        _ => 0,
    }
}

fn row_f64(row: &Map<String, Value>, key: &str) -> f64 {
    row.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn afk_status_from_row(row: &Map<String, Value>) -> Option<AfkStatusRow> {
    Some(AfkStatusRow {
        time: row_time(row)?,
        status: row_str(row, "status"),
        duration: row_i64(row, "duration"),
    })
}

fn window_activity_from_row(row: &Map<String, Value>) -> Option<WindowActivityRow> {
    Some(WindowActivityRow {
        time: row_time(row)?,
        app: row_str(row, "app"),
        title: row_str(row, "title"),
        duration: row_i64(row, "duration"),
    })
}

fn app_usage_from_row(row: &Map<String, Value>) -> Option<AppUsageRow> {
    Some(AppUsageRow {
        time: row_time(row)?,
        app_name: row_str(row, "app_name"),
        duration_seconds: row_i64(row, "duration_seconds"),
        event_count: row_i64(row, "event_count"),
    })
}

fn daily_metrics_from_row(row: &Map<String, Value>) -> Option<DailyMetricsRow> {
    Some(DailyMetricsRow {
        time: row_time(row)?,
        date: row_str(row, "date"),
        active_seconds: row_i64(row, "active_seconds"),
        afk_seconds: row_i64(row, "afk_seconds"),
        idle_seconds: row_i64(row, "idle_seconds"),
        app_switches: row_i64(row, "app_switches"),
        utilization_ratio: row_f64(row, "utilization_ratio"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scope() -> QueryScope {
        QueryScope {
            account_id: 0,
            org_id: 3,
            user_id: 1,
            start: Utc.with_ymd_and_hms(2025, 11, 19, 0, 0, 0).unwrap(),
            stop: Utc.with_ymd_and_hms(2025, 11, 20, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_measurement_query_carries_scope_filters() {
        let flux = build_measurement_query("worktrace-metrics", MeasurementKind::AppUsage, &scope());
        assert!(flux.contains(r#"from(bucket: "worktrace-metrics")"#));
        assert!(flux.contains(r#"r["_measurement"] == "app_usage""#));
        assert!(flux.contains(r#"r["account_id"] == "0""#));
        assert!(flux.contains(r#"r["org_id"] == "3""#));
        assert!(flux.contains(r#"r["user_id"] == "1""#));
        assert!(flux.contains("range(start: 2025-11-19T00:00:00+00:00"));
    }

    #[test]
    fn test_parse_annotated_csv_skips_annotations() {
        let body = "\
#group,false,false,true\n\
#datatype,string,long,string\n\
#default,_result,,\n\
,result,_time,status\n\
,_result,2025-11-19T08:00:00Z,afk\n\
,_result,2025-11-19T09:00:00Z,not-afk\n";
        let rows = parse_annotated_csv(body);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["status"], "afk");
        assert_eq!(rows[1]["status"], "not-afk");
    }

    #[test]
    fn test_parse_annotated_csv_coerces_numbers() {
        let body = ",result,_time,duration,utilization_ratio\n\
,_result,2025-11-19T08:00:00Z,300,0.82\n";
        let rows = parse_annotated_csv(body);
        assert_eq!(rows[0]["duration"], Value::from(300));
        assert_eq!(rows[0]["utilization_ratio"], Value::from(0.82));
    }

    #[test]
    fn test_parse_annotated_csv_handles_quoted_commas() {
        let body = ",result,_time,title\n\
,_result,2025-11-19T08:00:00Z,\"report, quarterly\"\n";
        let rows = parse_annotated_csv(body);
        assert_eq!(rows[0]["title"], "report, quarterly");
    }

    #[test]
    fn test_parse_annotated_csv_empty_body() {
        assert!(parse_annotated_csv("").is_empty());
        assert!(parse_annotated_csv("#group,false\n").is_empty());
    }

    #[test]
    fn test_afk_row_conversion() {
        let body = ",result,_time,status,duration\n\
,_result,2025-11-19T08:00:00Z,afk,420\n";
        let rows = parse_annotated_csv(body);
        let afk = afk_status_from_row(&rows[0]).unwrap();
        assert_eq!(afk.status, "afk");
        assert_eq!(afk.duration, 420);
        assert_eq!(
            afk.time,
            Utc.with_ymd_and_hms(2025, 11, 19, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_row_without_time_is_dropped() {
        let body = ",result,status,duration\n,_result,afk,420\n";
        let rows = parse_annotated_csv(body);
        assert!(afk_status_from_row(&rows[0]).is_none());
    }

    #[test]
    fn test_daily_metrics_row_conversion() {
        let body = ",result,_time,date,active_seconds,afk_seconds,idle_seconds,app_switches,utilization_ratio\n\
,_result,2025-11-19T00:00:00Z,2025-11-19,21600,7200,1800,42,0.75\n";
        let rows = parse_annotated_csv(body);
        let metrics = daily_metrics_from_row(&rows[0]).unwrap();
        assert_eq!(metrics.date, "2025-11-19");
        assert_eq!(metrics.active_seconds, 21600);
        assert_eq!(metrics.app_switches, 42);
        assert_eq!(metrics.utilization_ratio, 0.75);
    }

    #[test]
    fn test_client_rejects_incomplete_config() {
        let config = TelemetryConfig {
            url: "http://localhost:8086".to_string(),
            token: String::new(),
            org: "worktrace".to_string(),
            bucket: "metrics".to_string(),
            timeout_secs: 30,
        };
        assert!(matches!(
            InfluxTelemetryClient::new(&config),
            Err(TelemetryError::Config(_))
        ));
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let config = TelemetryConfig {
            url: "http://localhost:8086/".to_string(),
            token: "token".to_string(),
            org: "worktrace".to_string(),
            bucket: "metrics".to_string(),
            timeout_secs: 30,
        };
        let client = InfluxTelemetryClient::new(&config).unwrap();
        assert_eq!(client.url, "http://localhost:8086");
    }
}
