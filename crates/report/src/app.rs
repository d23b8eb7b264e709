//! Application wiring.
//!
//! Builds the orchestrator and its collaborators from configuration. An
//! unreachable database disables report caching and the recurring weekly
//! subsystem with a startup warning; it is not fatal.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use persistence::repositories::{
    OptedAccountStore, PgOptedAccountStore, PgReportCache, ReportCacheStore,
};

use crate::config::Config;
use crate::jobs::{SystemClock, WeeklyScheduler};
use crate::orchestrator::Orchestrator;
use crate::services::email::{EmailDelivery, EmailService, ReportDelivery};
use crate::services::generation::{GeminiClient, GenerationEngine};
use crate::services::report_service::ReportService;
use crate::services::task_store::TaskStore;
use crate::services::telemetry::{InfluxTelemetryClient, TelemetrySource};
use crate::tools::{build_registry, ToolRegistry};

/// The wired application.
pub struct App {
    pub orchestrator: Arc<Orchestrator>,
    pub tools: Arc<ToolRegistry>,
    pub scheduler: Option<Arc<WeeklyScheduler>>,
}

/// Builds the orchestrator core from configuration and reconstructs the
/// recurring weekly jobs from the persisted opt-in list.
pub async fn bootstrap(config: Config) -> Result<App> {
    let pool = match persistence::db::create_pool(&db_config(&config)).await {
        Ok(pool) => match persistence::db::run_migrations(&pool).await {
            Ok(()) => Some(pool),
            Err(err) => {
                warn!(error = %err, "Database migrations failed; running without persistence");
                None
            }
        },
        Err(err) => {
            warn!(
                error = %err,
                "Database unavailable; report caching and weekly scheduling are disabled"
            );
            None
        }
    };

    let telemetry: Arc<dyn TelemetrySource> =
        Arc::new(InfluxTelemetryClient::new(&config.telemetry)?);
    let engine: Arc<dyn GenerationEngine> = Arc::new(GeminiClient::new(&config.generation)?);

    let ad_hoc_cache: Option<Arc<dyn ReportCacheStore>> = pool
        .clone()
        .map(|pool| Arc::new(PgReportCache::ad_hoc(pool)) as Arc<dyn ReportCacheStore>);
    let weekly_cache: Option<Arc<dyn ReportCacheStore>> = pool
        .clone()
        .map(|pool| Arc::new(PgReportCache::weekly(pool)) as Arc<dyn ReportCacheStore>);
    let accounts: Option<Arc<dyn OptedAccountStore>> = pool
        .clone()
        .map(|pool| Arc::new(PgOptedAccountStore::new(pool)) as Arc<dyn OptedAccountStore>);

    let reports = Arc::new(ReportService::new(
        Arc::clone(&telemetry),
        engine,
        ad_hoc_cache,
        weekly_cache,
    ));
    let tasks = Arc::new(TaskStore::new());
    let delivery: Arc<dyn ReportDelivery> = Arc::new(EmailDelivery::new(EmailService::new(
        config.email.clone(),
    )));

    let scheduler = accounts.as_ref().map(|accounts| {
        Arc::new(WeeklyScheduler::new(
            Arc::clone(accounts),
            Arc::clone(&reports),
            Arc::clone(&delivery),
            Arc::new(SystemClock),
        ))
    });

    match &scheduler {
        Some(scheduler) => match scheduler.load_and_schedule_opted_accounts().await {
            Ok(count) => info!(count, "Recurring weekly reports scheduled"),
            Err(err) => {
                warn!(error = %err, "Could not reconstruct weekly report jobs; recurring reports are disabled until restart");
            }
        },
        None => {
            warn!("Persistence unavailable; recurring weekly reports are disabled");
        }
    }

    let tools = Arc::new(build_registry(Arc::clone(&telemetry), Arc::clone(&reports)));
    let orchestrator = Arc::new(Orchestrator::new(
        tasks,
        reports,
        scheduler.clone(),
        accounts,
        delivery,
    ));

    Ok(App {
        orchestrator,
        tools,
        scheduler,
    })
}

fn db_config(config: &Config) -> persistence::db::DatabaseConfig {
    persistence::db::DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        min_connections: config.database.min_connections,
        connect_timeout_secs: config.database.connect_timeout_secs,
        idle_timeout_secs: config.database.idle_timeout_secs,
    }
}
