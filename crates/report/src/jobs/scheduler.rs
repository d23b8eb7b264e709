//! Recurring weekly report scheduler.
//!
//! One live job per opted-in (account, org) pair. The registry is keyed
//! by that pair so opt-out can deterministically cancel the running job
//! instead of waiting for the next process restart. Jobs survive their
//! own failures: a firing that errors leaves the job scheduled for its
//! next occurrence.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use domain::week::{advance_weekly, next_weekly_anchor};
use persistence::repositories::OptedAccountStore;

use crate::jobs::weekly_report::run_weekly_firing;
use crate::services::email::ReportDelivery;
use crate::services::report_service::ReportService;

/// Time source, injected so trigger computation is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Scheduler errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to load opted accounts: {0}")]
    LoadFailed(String),
}

struct ScheduledJob {
    next_trigger: DateTime<Utc>,
    handle: JoinHandle<()>,
}

/// Registry of recurring weekly report jobs.
pub struct WeeklyScheduler {
    accounts: Arc<dyn OptedAccountStore>,
    reports: Arc<ReportService>,
    delivery: Arc<dyn ReportDelivery>,
    clock: Arc<dyn Clock>,
    jobs: Mutex<HashMap<(i64, i64), ScheduledJob>>,
}

impl WeeklyScheduler {
    pub fn new(
        accounts: Arc<dyn OptedAccountStore>,
        reports: Arc<ReportService>,
        delivery: Arc<dyn ReportDelivery>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            accounts,
            reports,
            delivery,
            clock,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Registers (or overwrites) the recurring job for an (account, org)
    /// pair and returns its effective first trigger instant.
    ///
    /// Without an override the job anchors to the next Monday 00:00 UTC.
    /// An override in the past is advanced by whole weeks until it lies in
    /// the future, preserving its weekday and time-of-day cadence.
    pub async fn schedule(
        &self,
        account_id: i64,
        org_id: i64,
        next_trigger: Option<DateTime<Utc>>,
    ) -> DateTime<Utc> {
        let now = self.clock.now();
        let trigger = match next_trigger {
            None => next_weekly_anchor(now),
            Some(t) if t <= now => {
                let advanced = advance_weekly(t, now);
                warn!(
                    account_id,
                    org_id,
                    supplied = %t,
                    advanced = %advanced,
                    "Supplied trigger time is in the past, advancing to next occurrence"
                );
                advanced
            }
            Some(t) => t,
        };

        let handle = self.spawn_job(account_id, org_id, trigger);

        let mut jobs = self.jobs.lock().await;
        if let Some(previous) = jobs.insert(
            (account_id, org_id),
            ScheduledJob {
                next_trigger: trigger,
                handle,
            },
        ) {
            previous.handle.abort();
            info!(account_id, org_id, "Replaced existing weekly report job");
        }

        info!(
            account_id,
            org_id,
            next_trigger = %trigger,
            "Scheduled weekly report"
        );
        trigger
    }

    fn spawn_job(&self, account_id: i64, org_id: i64, first_trigger: DateTime<Utc>) -> JoinHandle<()> {
        let accounts = Arc::clone(&self.accounts);
        let reports = Arc::clone(&self.reports);
        let delivery = Arc::clone(&self.delivery);
        let clock = Arc::clone(&self.clock);

        tokio::spawn(async move {
            let mut next = first_trigger;
            loop {
                let wait = (next - clock.now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                run_weekly_firing(
                    Arc::clone(&accounts),
                    Arc::clone(&reports),
                    Arc::clone(&delivery),
                    Arc::clone(&clock),
                    account_id,
                    org_id,
                )
                .await;

                next += Duration::weeks(1);
            }
        })
    }

    /// Cancels the live job for a pair. Returns whether one existed.
    pub async fn cancel(&self, account_id: i64, org_id: i64) -> bool {
        let mut jobs = self.jobs.lock().await;
        match jobs.remove(&(account_id, org_id)) {
            Some(job) => {
                job.handle.abort();
                info!(account_id, org_id, "Cancelled weekly report job");
                true
            }
            None => false,
        }
    }

    /// Reconstructs every recurring job from the persisted opt-in list.
    ///
    /// A store read failure degrades the whole recurring subsystem to a
    /// no-op (the caller logs the warning); a single unusable record is
    /// logged and skipped without blocking the rest. Returns the number of
    /// jobs scheduled.
    pub async fn load_and_schedule_opted_accounts(&self) -> Result<usize, SchedulerError> {
        let accounts = self
            .accounts
            .get_all()
            .await
            .map_err(|err| SchedulerError::LoadFailed(err.to_string()))?;

        info!(count = accounts.len(), "Loading opted-in accounts for weekly reports");

        let mut scheduled = 0;
        for account in accounts {
            if account.users.is_empty() {
                warn!(
                    account_id = account.account_id,
                    org_id = account.org_id,
                    "Skipping opted account with no users"
                );
                continue;
            }
            if account.email.is_empty() {
                warn!(
                    account_id = account.account_id,
                    org_id = account.org_id,
                    "Skipping opted account with no recipient email"
                );
                continue;
            }

            self.schedule(account.account_id, account.org_id, account.next_trigger_time)
                .await;
            scheduled += 1;
        }

        info!(scheduled, "Weekly report jobs reconstructed");
        Ok(scheduled)
    }

    /// Number of live jobs.
    pub async fn job_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    /// The next trigger instant of a pair's live job, if any.
    pub async fn next_trigger(&self, account_id: i64, org_id: i64) -> Option<DateTime<Utc>> {
        let jobs = self.jobs.lock().await;
        jobs.get(&(account_id, org_id)).map(|job| job.next_trigger)
    }

    /// Aborts every live job.
    pub async fn shutdown(&self) {
        let mut jobs = self.jobs.lock().await;
        for (_, job) in jobs.drain() {
            job.handle.abort();
        }
        info!("Weekly report scheduler shut down");
    }
}
