//! Domain models for the Worktrace report backend.

pub mod opted_account;
pub mod report;
pub mod request;
pub mod task;
pub mod telemetry;

pub use opted_account::OptedAccount;
pub use report::{
    compute_user_rankings, AppUsage, DailyReport, Discrepancy, HourlyBreakdown, Organization,
    OverallReport, Period, Report, Severity, UserRank, UserRanking, UserReport,
};
pub use request::{
    OptInRequest, OptOutRequest, ReportRequest, UserRef, WeeklyReportRequest, WeeklySendRequest,
};
pub use task::{Task, TaskError, TaskStatus};
pub use telemetry::{
    AfkStatusRow, AppUsageRow, DailyMetricsRow, MeasurementKind, WindowActivityRow,
};
