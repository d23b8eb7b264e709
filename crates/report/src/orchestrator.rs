//! The contract exposed to the API-framing layer.
//!
//! Three submission paths funnel into the same pipeline: async (create a
//! task, run in the background, result lands on the task), sync (run
//! inline), and the scheduler (recurring weekly firings). Async failures
//! are captured on the task and never escape the background unit of work.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use domain::models::{
    OptInRequest, OptOutRequest, OptedAccount, Report, ReportRequest, Task, TaskStatus,
    WeeklyReportRequest, WeeklySendRequest,
};
use domain::week::week_bounds;
use persistence::repositories::OptedAccountStore;
use shared::validation::{parse_date, DATE_FORMAT};

use crate::error::ReportError;
use crate::jobs::WeeklyScheduler;
use crate::services::email::ReportDelivery;
use crate::services::report_service::ReportService;
use crate::services::task_store::TaskStore;

/// Answer to a task status poll.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The report orchestrator facade.
pub struct Orchestrator {
    tasks: Arc<TaskStore>,
    reports: Arc<ReportService>,
    scheduler: Option<Arc<WeeklyScheduler>>,
    accounts: Option<Arc<dyn OptedAccountStore>>,
    delivery: Arc<dyn ReportDelivery>,
}

impl Orchestrator {
    pub fn new(
        tasks: Arc<TaskStore>,
        reports: Arc<ReportService>,
        scheduler: Option<Arc<WeeklyScheduler>>,
        accounts: Option<Arc<dyn OptedAccountStore>>,
        delivery: Arc<dyn ReportDelivery>,
    ) -> Self {
        Self {
            tasks,
            reports,
            scheduler,
            accounts,
            delivery,
        }
    }

    /// Submits an ad hoc report request for background generation and
    /// returns the pending task immediately.
    pub async fn submit_async(&self, request: ReportRequest) -> Result<Task, ReportError> {
        request.validate()?;
        let task = self.tasks.create(request.clone()).await;
        info!(task_id = %task.id, org = %request.org, "Report task created");

        let tasks = Arc::clone(&self.tasks);
        let reports = Arc::clone(&self.reports);
        let task_id = task.id;
        tokio::spawn(async move {
            run_task(tasks, task_id, async move { reports.generate(&request).await }).await;
        });

        Ok(task)
    }

    /// Submits a weekly report request for background generation. The
    /// task's request snapshot carries the snapped Monday-Sunday range.
    pub async fn submit_weekly_async(
        &self,
        request: WeeklyReportRequest,
    ) -> Result<Task, ReportError> {
        request.validate()?;
        let week_start = parse_date(&request.week_start_date)
            .map_err(|_| ReportError::Validation("invalid week start date".into()))?;
        let (monday, sunday) = week_bounds(week_start);

        let snapshot = ReportRequest {
            account_id: request.account_id,
            org_id: request.org_id,
            org: request.org.clone(),
            users: request.users.clone(),
            start_date: monday.format(DATE_FORMAT).to_string(),
            end_date: sunday.format(DATE_FORMAT).to_string(),
        };
        let task = self.tasks.create(snapshot).await;
        info!(task_id = %task.id, org = %request.org, "Weekly report task created");

        let tasks = Arc::clone(&self.tasks);
        let reports = Arc::clone(&self.reports);
        let task_id = task.id;
        tokio::spawn(async move {
            run_task(tasks, task_id, async move {
                reports.generate_weekly(&request).await
            })
            .await;
        });

        Ok(task)
    }

    /// Polls a task. Always yields one of the four statuses; the report is
    /// attached only when completed, the error message only when failed.
    pub async fn task_status(&self, task_id: Uuid) -> Result<TaskStatusResponse, ReportError> {
        let task = self.tasks.get(task_id).await?;
        let mut response = TaskStatusResponse {
            task_id: task.id,
            status: task.status,
            report: None,
            error: None,
        };
        match task.status {
            TaskStatus::Completed => response.report = task.report,
            TaskStatus::Failed => response.error = task.error,
            _ => {}
        }
        Ok(response)
    }

    /// Generates an ad hoc report inline, bypassing the task store.
    pub async fn submit_sync(&self, request: ReportRequest) -> Result<Report, ReportError> {
        request.validate()?;
        self.reports.generate(&request).await
    }

    /// Generates a weekly report inline, bypassing the task store.
    pub async fn submit_weekly_sync(
        &self,
        request: WeeklyReportRequest,
    ) -> Result<Report, ReportError> {
        request.validate()?;
        self.reports.generate_weekly(&request).await
    }

    /// Opts an (account, org) pair into scheduled weekly reports and
    /// returns the effective first trigger instant.
    pub async fn opt_in(&self, request: OptInRequest) -> Result<DateTime<Utc>, ReportError> {
        request.validate()?;

        let next_trigger = match &request.next_trigger_time {
            None => None,
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|err| {
                        ReportError::Validation(format!(
                            "invalid nextTriggerTime (expected RFC 3339 like \
                             2025-01-15T14:30:00Z): {}",
                            err
                        ))
                    })?,
            ),
        };

        let (accounts, scheduler) = self.weekly_subsystem()?;

        accounts
            .upsert(OptedAccount {
                account_id: request.account_id,
                org_id: request.org_id,
                org_name: request.org_name.clone(),
                email: request.email.clone(),
                users: request.users.clone(),
                opted_in_at: Utc::now(),
                next_trigger_time: next_trigger,
            })
            .await?;

        let trigger = scheduler
            .schedule(request.account_id, request.org_id, next_trigger)
            .await;

        info!(
            account_id = request.account_id,
            org_id = request.org_id,
            next_trigger = %trigger,
            "Opted in to weekly reports"
        );
        Ok(trigger)
    }

    /// Opts a pair out: deletes the persisted record and cancels the live
    /// job.
    pub async fn opt_out(&self, request: OptOutRequest) -> Result<(), ReportError> {
        let (accounts, scheduler) = self.weekly_subsystem()?;

        accounts.delete(request.account_id, request.org_id).await?;
        let cancelled = scheduler.cancel(request.account_id, request.org_id).await;

        info!(
            account_id = request.account_id,
            org_id = request.org_id,
            cancelled_live_job = cancelled,
            "Opted out of weekly reports"
        );
        Ok(())
    }

    /// Lists the opted-in organizations of one account.
    pub async fn opted_accounts_for(
        &self,
        account_id: i64,
    ) -> Result<Vec<OptedAccount>, ReportError> {
        let (accounts, _) = self.weekly_subsystem()?;
        Ok(accounts.get_by_account(account_id).await?)
    }

    /// Generates and delivers one weekly report immediately, without
    /// touching the recurring schedule. Runs in the background; generation
    /// and delivery failures are logged, not returned.
    pub async fn send_weekly_report_now(
        &self,
        request: WeeklySendRequest,
    ) -> Result<(), ReportError> {
        request.validate()?;

        let reports = Arc::clone(&self.reports);
        let delivery = Arc::clone(&self.delivery);
        tokio::spawn(async move {
            let weekly = WeeklyReportRequest {
                account_id: request.account_id,
                org_id: request.org_id,
                org: request.org_name.clone(),
                users: request.users.clone(),
                week_start_date: request.week_start_date.clone(),
            };
            let report = match reports.generate_weekly(&weekly).await {
                Ok(report) => report,
                Err(err) => {
                    error!(
                        account_id = request.account_id,
                        org_id = request.org_id,
                        error = %err,
                        "Manual weekly report generation failed"
                    );
                    return;
                }
            };
            if let Err(err) = delivery
                .deliver(&report, &request.email, &request.org_name)
                .await
            {
                error!(
                    account_id = request.account_id,
                    org_id = request.org_id,
                    recipient = %request.email,
                    error = %err,
                    "Manual weekly report delivery failed"
                );
            }
        });

        Ok(())
    }

    fn weekly_subsystem(
        &self,
    ) -> Result<(&Arc<dyn OptedAccountStore>, &Arc<WeeklyScheduler>), ReportError> {
        match (&self.accounts, &self.scheduler) {
            (Some(accounts), Some(scheduler)) => Ok((accounts, scheduler)),
            _ => Err(ReportError::Scheduling(
                "weekly report subsystem unavailable (persistence is down)".into(),
            )),
        }
    }
}

/// Drives one background unit of work and records its outcome on the
/// task. Errors never escape: they land on the task as message strings.
async fn run_task<F>(tasks: Arc<TaskStore>, task_id: Uuid, work: F)
where
    F: std::future::Future<Output = Result<Report, ReportError>>,
{
    if let Err(err) = tasks.update_status(task_id, TaskStatus::Processing).await {
        warn!(task_id = %task_id, error = %err, "Failed to mark task processing");
        return;
    }

    match work.await {
        Ok(report) => {
            if let Err(err) = tasks.set_report(task_id, report).await {
                warn!(task_id = %task_id, error = %err, "Failed to store report on task");
            } else {
                info!(task_id = %task_id, "Report task completed");
            }
        }
        Err(err) => {
            let message = err.to_string();
            if let Err(store_err) = tasks.set_error(task_id, &message).await {
                warn!(task_id = %task_id, error = %store_err, "Failed to store task error");
            } else {
                info!(task_id = %task_id, error = %message, "Report task failed");
            }
        }
    }
}
