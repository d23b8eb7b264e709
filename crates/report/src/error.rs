//! Orchestrator error taxonomy.
//!
//! Every failure a caller can observe maps onto one of these variants.
//! Async submissions capture the message string on the task instead of
//! propagating; sync calls return the error directly.

use thiserror::Error;

use crate::services::generation::GenerationError;
use crate::services::task_store::TaskStoreError;
use crate::services::telemetry::TelemetryError;
use persistence::PersistenceError;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Telemetry query failed: {0}")]
    UpstreamQuery(String),

    #[error("Report generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Scheduling error: {0}")]
    Scheduling(String),
}

impl From<validator::ValidationErrors> for ReportError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    let message = e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    format!("{}: {}", field, message)
                })
            })
            .collect();
        ReportError::Validation(details.join("; "))
    }
}

impl From<TelemetryError> for ReportError {
    fn from(err: TelemetryError) -> Self {
        ReportError::UpstreamQuery(err.to_string())
    }
}

impl From<TaskStoreError> for ReportError {
    fn from(err: TaskStoreError) -> Self {
        match err {
            TaskStoreError::NotFound(id) => ReportError::NotFound(format!("task {}", id)),
            TaskStoreError::Transition(e) => ReportError::Validation(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{ReportRequest, UserRef};
    use validator::Validate;

    #[test]
    fn test_validation_errors_flatten_to_messages() {
        let request = ReportRequest {
            account_id: 0,
            org_id: 0,
            org: "Turbo".to_string(),
            users: vec![UserRef {
                id: 1,
                name: "ben".to_string(),
            }],
            start_date: "bad".to_string(),
            end_date: "2025-11-19".to_string(),
        };
        let err: ReportError = request.validate().unwrap_err().into();
        let message = err.to_string();
        assert!(message.starts_with("Validation error"));
        assert!(message.contains("start_date"));
    }

    #[test]
    fn test_task_not_found_maps_to_not_found() {
        let id = uuid::Uuid::new_v4();
        let err: ReportError = TaskStoreError::NotFound(id).into();
        assert!(matches!(err, ReportError::NotFound(_)));
        assert!(err.to_string().contains(&id.to_string()));
    }
}
