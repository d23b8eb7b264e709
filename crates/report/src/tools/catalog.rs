//! The fixed tool catalog exposed to the reasoning agent.
//!
//! Four read-only telemetry getters, one raw-query escape hatch guarded
//! by a lexical account-scope check, and one synchronous report
//! generation tool. All telemetry access runs under a fixed identity
//! triple; only the caller-supplied date range varies.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use validator::Validate;

use domain::models::{MeasurementKind, ReportRequest, UserRef};

use crate::services::report_service::ReportService;
use crate::services::telemetry::{QueryScope, TelemetrySource};
use crate::tools::{ParamKind, Tool, ToolError, ToolExecutor, ToolParam, ToolRegistry};

/// Fixed identity triple all agent-facing queries are scoped to.
pub const DEFAULT_ACCOUNT_ID: i64 = 0;
pub const DEFAULT_ORG_ID: i64 = 0;
pub const DEFAULT_USER_ID: i64 = 0;

/// Builds the full tool catalog.
pub fn build_registry(
    telemetry: Arc<dyn TelemetrySource>,
    reports: Arc<ReportService>,
) -> ToolRegistry {
    let date_range_params = || {
        vec![
            ToolParam::required(
                "date_start",
                "Start timestamp, RFC 3339 (e.g. '2025-11-17T00:00:00Z') or YYYY-MM-DD",
                ParamKind::String,
            ),
            ToolParam::required(
                "date_end",
                "End timestamp, RFC 3339 (e.g. '2025-11-18T23:59:59Z') or YYYY-MM-DD",
                ParamKind::String,
            ),
        ]
    };

    let getter = |name: &'static str, description: String, kind: MeasurementKind| {
        Tool::new(
            name,
            description,
            date_range_params(),
            Arc::new(TelemetryGetterTool {
                kind,
                telemetry: Arc::clone(&telemetry),
            }),
        )
    };

    let identity_note = format!(
        "(account_id={}, org_id={}, user_id={})",
        DEFAULT_ACCOUNT_ID, DEFAULT_ORG_ID, DEFAULT_USER_ID
    );

    ToolRegistry::new(vec![
        getter(
            "get_afk_status",
            format!(
                "Get AFK status data for a date range. Returns when the user was away from \
                 keyboard {}.",
                identity_note
            ),
            MeasurementKind::AfkStatus,
        ),
        getter(
            "get_app_usage",
            format!(
                "Get app usage data for a date range. Returns which applications were used and \
                 for how long {}.",
                identity_note
            ),
            MeasurementKind::AppUsage,
        ),
        getter(
            "get_daily_metrics",
            format!(
                "Get daily metrics for a date range. Returns aggregated daily activity including \
                 active time, AFK time, and app switches {}.",
                identity_note
            ),
            MeasurementKind::DailyMetrics,
        ),
        getter(
            "get_window_activity",
            format!(
                "Get window activity data for a date range. Returns active windows, applications, \
                 and their titles {}.",
                identity_note
            ),
            MeasurementKind::WindowActivity,
        ),
        Tool::new(
            "execute_raw_query",
            format!(
                "Execute an arbitrary Flux query against the telemetry source. Only for requests \
                 the other tools cannot satisfy. The query MUST include the filter: \
                 |> filter(fn: (r) => r[\"account_id\"] == \"{}\")",
                DEFAULT_ACCOUNT_ID
            ),
            vec![ToolParam::required(
                "query",
                "Complete Flux query string, including the account_id filter",
                ParamKind::String,
            )],
            Arc::new(RawQueryTool {
                telemetry: Arc::clone(&telemetry),
            }),
        ),
        Tool::new(
            "generate_report",
            "Generates a comprehensive productivity report for a period and returns it as JSON, \
             including hourly breakdowns and discrepancy detection."
                .to_string(),
            vec![
                ToolParam::required("orgId", "Id of the organization", ParamKind::Number),
                ToolParam::required("orgName", "Name of the organization", ParamKind::String),
                ToolParam::required(
                    "users",
                    "Users to cover, as [{\"id\": number, \"name\": string}]",
                    ParamKind::Array {
                        items: Box::new(ParamKind::Object {
                            properties: vec![
                                ToolParam::required("id", "User id", ParamKind::Number),
                                ToolParam::required("name", "User name", ParamKind::String),
                            ],
                        }),
                    },
                ),
                ToolParam::required("startDate", "Start date, YYYY-MM-DD", ParamKind::String),
                ToolParam::required("endDate", "End date, YYYY-MM-DD", ParamKind::String),
            ],
            Arc::new(GenerateReportTool { reports }),
        ),
    ])
}

/// Checks that a raw Flux query carries the account-scoping filter in one
/// of its accepted syntactic forms.
///
/// This is a lexical check over the query text, not a parser: a query can
/// trivially satisfy it without actually being scoped (e.g. inside a
/// comment or an or-clause). It is a guard-rail against forgetting the
/// filter, not a security boundary.
pub fn has_account_scope_filter(query: &str, account_id: i64) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        // account_id, optionally closing a bracketed tag reference
        // (`account_id"]`, escaped or not), compared to the id bare or in
        // single/double/escaped quotes.
        Regex::new(r#"account_id(?:\\?"\])?\s*==\s*(?:\\?"|')?(?P<id>\d+)(?:\\?"|')?"#)
            .expect("account scope pattern is valid")
    });

    pattern
        .captures_iter(query)
        .any(|captures| captures["id"].parse::<i64>() == Ok(account_id))
}

struct TelemetryGetterTool {
    kind: MeasurementKind,
    telemetry: Arc<dyn TelemetrySource>,
}

#[async_trait]
impl ToolExecutor for TelemetryGetterTool {
    async fn execute(&self, params: Value) -> Result<String, ToolError> {
        let (start, stop) = parse_date_range(&params)?;
        let scope = QueryScope {
            account_id: DEFAULT_ACCOUNT_ID,
            org_id: DEFAULT_ORG_ID,
            user_id: DEFAULT_USER_ID,
            start,
            stop,
        };

        let json = match self.kind {
            MeasurementKind::AfkStatus => {
                let rows = self
                    .telemetry
                    .query_afk_status(&scope)
                    .await
                    .map_err(|e| ToolError::Execution(e.to_string()))?;
                serde_json::to_string(&rows)
            }
            MeasurementKind::WindowActivity => {
                let rows = self
                    .telemetry
                    .query_window_activity(&scope)
                    .await
                    .map_err(|e| ToolError::Execution(e.to_string()))?;
                serde_json::to_string(&rows)
            }
            MeasurementKind::AppUsage => {
                let rows = self
                    .telemetry
                    .query_app_usage(&scope)
                    .await
                    .map_err(|e| ToolError::Execution(e.to_string()))?;
                serde_json::to_string(&rows)
            }
            MeasurementKind::DailyMetrics => {
                let rows = self
                    .telemetry
                    .query_daily_metrics(&scope)
                    .await
                    .map_err(|e| ToolError::Execution(e.to_string()))?;
                serde_json::to_string(&rows)
            }
        };

        json.map_err(|e| ToolError::Execution(e.to_string()))
    }
}

struct RawQueryTool {
    telemetry: Arc<dyn TelemetrySource>,
}

#[async_trait]
impl ToolExecutor for RawQueryTool {
    async fn execute(&self, params: Value) -> Result<String, ToolError> {
        let query = params["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("'query' must be a string".into()))?;

        // Rejected before the query ever reaches the telemetry source.
        if !has_account_scope_filter(query, DEFAULT_ACCOUNT_ID) {
            return Err(ToolError::MissingAccountScope(DEFAULT_ACCOUNT_ID));
        }

        let rows = self
            .telemetry
            .query_raw(query)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        serde_json::to_string(&rows).map_err(|e| ToolError::Execution(e.to_string()))
    }
}

struct GenerateReportTool {
    reports: Arc<ReportService>,
}

#[async_trait]
impl ToolExecutor for GenerateReportTool {
    async fn execute(&self, params: Value) -> Result<String, ToolError> {
        let users: Vec<UserRef> = serde_json::from_value(params["users"].clone())
            .map_err(|e| ToolError::InvalidParams(format!("users: {}", e)))?;

        let request = ReportRequest {
            account_id: DEFAULT_ACCOUNT_ID,
            org_id: params["orgId"].as_i64().unwrap_or(DEFAULT_ORG_ID),
            org: params["orgName"].as_str().unwrap_or_default().to_string(),
            users,
            start_date: params["startDate"].as_str().unwrap_or_default().to_string(),
            end_date: params["endDate"].as_str().unwrap_or_default().to_string(),
        };
        request
            .validate()
            .map_err(|e| ToolError::InvalidParams(e.to_string()))?;

        let report = self
            .reports
            .generate(&request)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        serde_json::to_string(&report).map_err(|e| ToolError::Execution(e.to_string()))
    }
}

/// Parses the `date_start`/`date_end` parameters.
///
/// Accepts RFC 3339 timestamps or bare YYYY-MM-DD dates; a bare start
/// date means start of day, a bare end date means end of day.
fn parse_date_range(params: &Value) -> Result<(DateTime<Utc>, DateTime<Utc>), ToolError> {
    let start = parse_bound(params, "date_start", NaiveTime::MIN)?;
    let end_of_day = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
        .unwrap_or(NaiveTime::MIN);
    let stop = parse_bound(params, "date_end", end_of_day)?;
    Ok((start, stop))
}

fn parse_bound(
    params: &Value,
    name: &str,
    day_fallback_time: NaiveTime,
) -> Result<DateTime<Utc>, ToolError> {
    let raw = params[name]
        .as_str()
        .ok_or_else(|| ToolError::InvalidParams(format!("'{}' must be a string", name)))?;

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(day_fallback_time)));
    }

    Err(ToolError::InvalidParams(format!(
        "invalid {} format (expected RFC 3339 like '2025-11-17T00:00:00Z' or a date like \
         '2025-11-17')",
        name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_filter_accepted_forms() {
        let forms = [
            r#"|> filter(fn: (r) => r["account_id"] == "0")"#,
            r#"|> filter(fn: (r) => r["account_id"] == '0')"#,
            r#"|> filter(fn: (r) => r["account_id"] == 0)"#,
            r#"|> filter(fn: (r) => r[\"account_id\"] == \"0\")"#,
            r#"account_id == "0""#,
            r#"account_id == 0"#,
            r#"account_id==0"#,
        ];
        for form in forms {
            assert!(
                has_account_scope_filter(form, 0),
                "form not accepted: {}",
                form
            );
        }
    }

    #[test]
    fn test_scope_filter_rejects_absent_or_wrong_account() {
        assert!(!has_account_scope_filter(
            r#"from(bucket: "metrics") |> range(start: -7d)"#,
            0
        ));
        assert!(!has_account_scope_filter(r#"account_id == "1""#, 0));
        assert!(!has_account_scope_filter(r#"org_id == "0""#, 0));
        assert!(!has_account_scope_filter(r#"account_identifier == 0"#, 0));
    }

    #[test]
    fn test_parse_date_range_rfc3339() {
        let params = json!({
            "date_start": "2025-11-17T08:00:00Z",
            "date_end": "2025-11-18T17:30:00Z",
        });
        let (start, stop) = parse_date_range(&params).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 11, 17, 8, 0, 0).unwrap());
        assert_eq!(stop, Utc.with_ymd_and_hms(2025, 11, 18, 17, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_date_range_date_only_expands_to_day_bounds() {
        let params = json!({
            "date_start": "2025-11-17",
            "date_end": "2025-11-17",
        });
        let (start, stop) = parse_date_range(&params).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 11, 17, 0, 0, 0).unwrap());
        assert!(stop > Utc.with_ymd_and_hms(2025, 11, 17, 23, 59, 58).unwrap());
        assert!(stop < Utc.with_ymd_and_hms(2025, 11, 18, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_date_range_rejects_garbage() {
        let params = json!({
            "date_start": "last tuesday",
            "date_end": "2025-11-18",
        });
        assert!(matches!(
            parse_date_range(&params),
            Err(ToolError::InvalidParams(_))
        ));
    }
}
