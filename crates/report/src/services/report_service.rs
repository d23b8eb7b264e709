//! Report generation pipeline.
//!
//! All three entry paths (async submission, sync call, scheduler firing)
//! funnel through [`ReportService::run`]: derive the cache key, try the
//! cache, on a miss pull all four telemetry series, hand one serialized
//! context to the generation engine, validate the result, and upsert the
//! cache. Cache read failures degrade to misses; cache write failures are
//! logged and never discard a freshly computed report.

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use domain::models::{
    compute_user_rankings, AfkStatusRow, AppUsageRow, DailyMetricsRow, Period, Report,
    ReportRequest, UserRef, WeeklyReportRequest, WindowActivityRow,
};
use domain::week::week_bounds;
use persistence::repositories::{cache_key, CacheEntry, ReportCacheStore};
use shared::validation::{parse_date, DATE_FORMAT};

use crate::error::ReportError;
use crate::services::generation::{report_output_schema, GenerationEngine};
use crate::services::telemetry::{QueryScope, TelemetrySource};

/// Which cache namespace a pipeline run reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Namespace {
    AdHoc,
    Weekly,
}

/// All telemetry gathered for one user over the report period.
struct UserTelemetry {
    user: UserRef,
    afk_status: Vec<AfkStatusRow>,
    window_activity: Vec<WindowActivityRow>,
    app_usage: Vec<AppUsageRow>,
    daily_metrics: Vec<DailyMetricsRow>,
}

/// The report generation pipeline.
pub struct ReportService {
    telemetry: Arc<dyn TelemetrySource>,
    engine: Arc<dyn GenerationEngine>,
    ad_hoc_cache: Option<Arc<dyn ReportCacheStore>>,
    weekly_cache: Option<Arc<dyn ReportCacheStore>>,
}

impl ReportService {
    pub fn new(
        telemetry: Arc<dyn TelemetrySource>,
        engine: Arc<dyn GenerationEngine>,
        ad_hoc_cache: Option<Arc<dyn ReportCacheStore>>,
        weekly_cache: Option<Arc<dyn ReportCacheStore>>,
    ) -> Self {
        Self {
            telemetry,
            engine,
            ad_hoc_cache,
            weekly_cache,
        }
    }

    /// Generates an ad hoc report over the request's exact date range.
    pub async fn generate(&self, request: &ReportRequest) -> Result<Report, ReportError> {
        let start = parse_date(&request.start_date)
            .map_err(|_| ReportError::Validation("invalid start date".into()))?;
        let end = parse_date(&request.end_date)
            .map_err(|_| ReportError::Validation("invalid end date".into()))?;

        self.run(
            Namespace::AdHoc,
            request.account_id,
            request.org_id,
            &request.org,
            &request.users,
            start,
            end,
        )
        .await
    }

    /// Generates a weekly report, snapping the supplied week-start date to
    /// its Monday-Sunday bounds and using the weekly cache namespace.
    pub async fn generate_weekly(
        &self,
        request: &WeeklyReportRequest,
    ) -> Result<Report, ReportError> {
        let week_start = parse_date(&request.week_start_date)
            .map_err(|_| ReportError::Validation("invalid week start date".into()))?;
        let (monday, sunday) = week_bounds(week_start);

        self.run(
            Namespace::Weekly,
            request.account_id,
            request.org_id,
            &request.org,
            &request.users,
            monday,
            sunday,
        )
        .await
    }

    fn cache_for(&self, namespace: Namespace) -> Option<&Arc<dyn ReportCacheStore>> {
        match namespace {
            Namespace::AdHoc => self.ad_hoc_cache.as_ref(),
            Namespace::Weekly => self.weekly_cache.as_ref(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        namespace: Namespace,
        account_id: i64,
        org_id: i64,
        org: &str,
        users: &[UserRef],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Report, ReportError> {
        if users.is_empty() {
            return Err(ReportError::Validation(
                "At least one user is required".into(),
            ));
        }

        let start_str = start.format(DATE_FORMAT).to_string();
        let end_str = end.format(DATE_FORMAT).to_string();
        let key = cache_key(org, org_id, users, &start_str, &end_str);

        if let Some(cache) = self.cache_for(namespace) {
            match cache.get(&key).await {
                Ok(Some(entry)) => {
                    debug!(cache_key = %key, "Report cache hit");
                    let cache = Arc::clone(cache);
                    let touch_key = key.clone();
                    tokio::spawn(async move {
                        if let Err(err) = cache.touch_last_accessed(&touch_key).await {
                            warn!(cache_key = %touch_key, error = %err, "Failed to update lastAccessed");
                        }
                    });
                    return Ok(entry.report);
                }
                Ok(None) => {
                    debug!(cache_key = %key, "Report cache miss, generating");
                }
                Err(err) => {
                    // A broken cache must not fail the request
                    warn!(cache_key = %key, error = %err, "Cache read failed, treating as miss");
                }
            }
        }

        // Cover the whole final day: query up to the next midnight.
        let range_start = Utc.from_utc_datetime(&start.and_time(NaiveTime::MIN));
        let range_stop =
            Utc.from_utc_datetime(&(end + Duration::days(1)).and_time(NaiveTime::MIN));

        let mut gathered = Vec::with_capacity(users.len());
        for user in users {
            let scope = QueryScope {
                account_id,
                org_id,
                user_id: user.id,
                start: range_start,
                stop: range_stop,
            };
            let telemetry = self
                .query_user(user, &scope)
                .await
                .map_err(|err| ReportError::UpstreamQuery(err))?;
            gathered.push(telemetry);
        }

        let context = build_context(org, org_id, &start_str, &end_str, &gathered);
        let schema = report_output_schema();
        let mut report = self.engine.generate(&context, &schema).await?;

        // The engine's period and timestamp are advisory; ours are not.
        report.generated_at = Utc::now().to_rfc3339();
        report.period_analyzed = Period {
            start_date: start_str.clone(),
            end_date: end_str.clone(),
        };
        for organization in &mut report.organizations {
            if organization.user_ranking.is_none() {
                organization.user_ranking = compute_user_rankings(&organization.users);
            }
        }

        if let Some(cache) = self.cache_for(namespace) {
            let entry = CacheEntry::new(
                org,
                org_id,
                users.to_vec(),
                &start_str,
                &end_str,
                report.clone(),
            );
            if let Err(err) = cache.put(entry).await {
                warn!(cache_key = %key, error = %err, "Failed to cache report");
            } else {
                info!(cache_key = %key, "Report cached");
            }
        }

        Ok(report)
    }

    async fn query_user(
        &self,
        user: &UserRef,
        scope: &QueryScope,
    ) -> Result<UserTelemetry, String> {
        let describe = |kind: &str, err: &dyn std::fmt::Display| {
            format!(
                "failed to query {} for user {} (id {}): {}",
                kind, user.name, user.id, err
            )
        };

        let afk_status = self
            .telemetry
            .query_afk_status(scope)
            .await
            .map_err(|e| describe("afk_status", &e))?;
        let window_activity = self
            .telemetry
            .query_window_activity(scope)
            .await
            .map_err(|e| describe("window_activity", &e))?;
        let app_usage = self
            .telemetry
            .query_app_usage(scope)
            .await
            .map_err(|e| describe("app_usage", &e))?;
        let daily_metrics = self
            .telemetry
            .query_daily_metrics(scope)
            .await
            .map_err(|e| describe("daily_metrics", &e))?;

        Ok(UserTelemetry {
            user: user.clone(),
            afk_status,
            window_activity,
            app_usage,
            daily_metrics,
        })
    }
}

/// Merges the gathered telemetry into the single context payload the
/// generation engine receives.
fn build_context(
    org: &str,
    org_id: i64,
    start_date: &str,
    end_date: &str,
    gathered: &[UserTelemetry],
) -> Value {
    json!({
        "org": org,
        "orgId": org_id,
        "period": {
            "startDate": start_date,
            "endDate": end_date,
        },
        "users": gathered
            .iter()
            .map(|t| {
                json!({
                    "id": t.user.id,
                    "name": t.user.name,
                    "afkStatus": t.afk_status,
                    "windowActivity": t.window_activity,
                    "appUsage": t.app_usage,
                    "dailyMetrics": t.daily_metrics,
                })
            })
            .collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn gathered() -> Vec<UserTelemetry> {
        vec![UserTelemetry {
            user: UserRef {
                id: 1,
                name: "ben".to_string(),
            },
            afk_status: vec![AfkStatusRow {
                time: Utc.with_ymd_and_hms(2025, 11, 19, 8, 0, 0).unwrap(),
                status: "afk".to_string(),
                duration: 420,
            }],
            window_activity: vec![],
            app_usage: vec![AppUsageRow {
                time: Utc.with_ymd_and_hms(2025, 11, 19, 9, 0, 0).unwrap(),
                app_name: "firefox".to_string(),
                duration_seconds: 1800,
                event_count: 12,
            }],
            daily_metrics: vec![],
        }]
    }

    #[test]
    fn test_context_carries_all_series_per_user() {
        let context = build_context("Turbo", 3, "2025-11-19", "2025-11-19", &gathered());

        assert_eq!(context["org"], "Turbo");
        assert_eq!(context["orgId"], 3);
        assert_eq!(context["period"]["startDate"], "2025-11-19");

        let user = &context["users"][0];
        assert_eq!(user["name"], "ben");
        assert_eq!(user["afkStatus"][0]["status"], "afk");
        assert_eq!(user["afkStatus"][0]["duration"], 420);
        assert_eq!(user["appUsage"][0]["appName"], "firefox");
        assert!(user["windowActivity"].as_array().unwrap().is_empty());
        assert!(user["dailyMetrics"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_context_is_serializable() {
        let context = build_context("Turbo", 3, "2025-11-19", "2025-11-19", &gathered());
        let text = serde_json::to_string(&context).unwrap();
        assert!(text.contains("\"durationSeconds\":1800"));
    }
}
