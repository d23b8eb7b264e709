//! Async report generation task and its status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::report::Report;
use super::request::ReportRequest;

/// Status of an async report generation task.
///
/// Transitions are monotonic: Pending -> Processing -> Completed | Failed.
/// Completed and Failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Task state machine errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    /// The requested transition would move a task backwards or out of a
    /// terminal state.
    #[error("invalid task transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

/// An async report generation task.
///
/// Created when a report request is submitted asynchronously; the
/// background unit of work records its outcome here. Tasks are never
/// deleted by the default flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub status: TaskStatus,
    /// Snapshot of the request this task was created for.
    pub request: ReportRequest,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
}

impl Task {
    /// Creates a new pending task for the given request.
    pub fn new(request: ReportRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: TaskStatus::Pending,
            request,
            created_at: now,
            updated_at: now,
            error: None,
            report: None,
        }
    }

    /// Moves the task to the given status.
    ///
    /// Only forward transitions are allowed; terminal tasks reject every
    /// further change.
    pub fn transition(&mut self, to: TaskStatus) -> Result<(), TaskError> {
        let allowed = match (self.status, to) {
            (TaskStatus::Pending, TaskStatus::Processing) => true,
            (TaskStatus::Pending | TaskStatus::Processing, TaskStatus::Completed) => true,
            (TaskStatus::Pending | TaskStatus::Processing, TaskStatus::Failed) => true,
            _ => false,
        };

        if !allowed {
            return Err(TaskError::InvalidTransition {
                from: self.status,
                to,
            });
        }

        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Marks the task failed with a human-readable message.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TaskError> {
        self.transition(TaskStatus::Failed)?;
        self.error = Some(message.into());
        Ok(())
    }

    /// Marks the task completed with its report.
    pub fn complete(&mut self, report: Report) -> Result<(), TaskError> {
        self.transition(TaskStatus::Completed)?;
        self.report = Some(report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::request::{ReportRequest, UserRef};

    fn request() -> ReportRequest {
        ReportRequest {
            account_id: 0,
            org_id: 3,
            org: "Turbo".to_string(),
            users: vec![UserRef {
                id: 1,
                name: "ben".to_string(),
            }],
            start_date: "2025-11-19".to_string(),
            end_date: "2025-11-19".to_string(),
        }
    }

    #[test]
    fn test_new_task_is_pending() {
        let task = Task::new(request());
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.error.is_none());
        assert!(task.report.is_none());
    }

    #[test]
    fn test_two_tasks_from_identical_requests_get_distinct_ids() {
        let a = Task::new(request());
        let b = Task::new(request());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_forward_transitions() {
        let mut task = Task::new(request());
        assert!(task.transition(TaskStatus::Processing).is_ok());
        assert!(task.transition(TaskStatus::Completed).is_ok());
    }

    #[test]
    fn test_terminal_task_rejects_mutation() {
        let mut task = Task::new(request());
        task.transition(TaskStatus::Processing).unwrap();
        task.fail("engine unavailable").unwrap();

        let err = task.transition(TaskStatus::Processing).unwrap_err();
        assert_eq!(
            err,
            TaskError::InvalidTransition {
                from: TaskStatus::Failed,
                to: TaskStatus::Processing,
            }
        );
        assert!(task.transition(TaskStatus::Completed).is_err());
    }

    #[test]
    fn test_no_backwards_transition() {
        let mut task = Task::new(request());
        task.transition(TaskStatus::Processing).unwrap();
        assert!(task.transition(TaskStatus::Pending).is_err());
    }

    #[test]
    fn test_fail_records_message() {
        let mut task = Task::new(request());
        task.transition(TaskStatus::Processing).unwrap();
        task.fail("telemetry source unreachable").unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(
            task.error.as_deref(),
            Some("telemetry source unreachable")
        );
    }

    #[test]
    fn test_status_is_terminal() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Processing).unwrap(),
            "\"processing\""
        );
    }
}
