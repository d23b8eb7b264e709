//! One firing of a scheduled weekly report job.
//!
//! A firing re-reads the opt-in record, generates the weekly report for
//! the preceding Monday-Sunday week, and hands it to the delivery
//! collaborator. Every failure is logged and swallowed: a bad firing
//! never unschedules the job or removes the opt-in record.

use std::sync::Arc;
use tracing::{error, info, warn};

use domain::models::WeeklyReportRequest;
use domain::week::previous_week_monday;
use persistence::repositories::OptedAccountStore;
use shared::validation::DATE_FORMAT;

use crate::jobs::scheduler::Clock;
use crate::services::email::ReportDelivery;
use crate::services::report_service::ReportService;

pub(crate) async fn run_weekly_firing(
    accounts: Arc<dyn OptedAccountStore>,
    reports: Arc<ReportService>,
    delivery: Arc<dyn ReportDelivery>,
    clock: Arc<dyn Clock>,
    account_id: i64,
    org_id: i64,
) {
    info!(account_id, org_id, "Weekly report firing");

    let account = match accounts.get(account_id, org_id).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            warn!(account_id, org_id, "Opted account no longer exists, skipping firing");
            return;
        }
        Err(err) => {
            error!(account_id, org_id, error = %err, "Failed to load opted account");
            return;
        }
    };

    if account.users.is_empty() {
        warn!(account_id, org_id, "Opted account has no users, skipping firing");
        return;
    }

    let week_start = previous_week_monday(clock.now().date_naive());
    let request = WeeklyReportRequest {
        account_id,
        org_id,
        org: account.org_name.clone(),
        users: account.users.clone(),
        week_start_date: week_start.format(DATE_FORMAT).to_string(),
    };

    let report = match reports.generate_weekly(&request).await {
        Ok(report) => report,
        Err(err) => {
            error!(account_id, org_id, error = %err, "Failed to generate weekly report");
            return;
        }
    };

    match delivery
        .deliver(&report, &account.email, &account.org_name)
        .await
    {
        Ok(()) => {
            info!(
                account_id,
                org_id,
                recipient = %account.email,
                week_start = %request.week_start_date,
                "Weekly report delivered"
            );
        }
        Err(err) => {
            error!(
                account_id,
                org_id,
                recipient = %account.email,
                error = %err,
                "Failed to deliver weekly report"
            );
        }
    }
}
