//! Concurrency-safe registry of async report generation tasks.
//!
//! All mutations go through the exclusive side of one read/write lock;
//! reads share the lock with each other but never with a write. The store
//! never deduplicates: byte-identical requests submitted concurrently get
//! distinct tasks (only the cache layer deduplicates work).

use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use domain::models::{Report, ReportRequest, Task, TaskError, TaskStatus};

/// Task store errors.
#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("task not found: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Transition(#[from] TaskError),
}

/// In-memory task registry.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new pending task for the request and returns a snapshot.
    pub async fn create(&self, request: ReportRequest) -> Task {
        let task = Task::new(request);
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id, task.clone());
        task
    }

    /// Returns a snapshot of the task, or a distinct not-found error.
    pub async fn get(&self, id: Uuid) -> Result<Task, TaskStoreError> {
        let tasks = self.tasks.read().await;
        tasks.get(&id).cloned().ok_or(TaskStoreError::NotFound(id))
    }

    /// Moves a task to the given status.
    pub async fn update_status(&self, id: Uuid, status: TaskStatus) -> Result<(), TaskStoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).ok_or(TaskStoreError::NotFound(id))?;
        task.transition(status)?;
        Ok(())
    }

    /// Marks a task failed with a human-readable message.
    pub async fn set_error(&self, id: Uuid, message: &str) -> Result<(), TaskStoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).ok_or(TaskStoreError::NotFound(id))?;
        task.fail(message)?;
        Ok(())
    }

    /// Marks a task completed and attaches its report.
    pub async fn set_report(&self, id: Uuid, report: Report) -> Result<(), TaskStoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).ok_or(TaskStoreError::NotFound(id))?;
        task.complete(report)?;
        Ok(())
    }

    /// Removes a task. Not used by the default flows.
    pub async fn delete(&self, id: Uuid) -> bool {
        let mut tasks = self.tasks.write().await;
        tasks.remove(&id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::UserRef;
    use std::sync::Arc;

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

    fn report() -> Report {
        Report {
            organizations: vec![],
            generated_at: "2025-11-20T00:00:00Z".to_string(),
            period_analyzed: domain::models::Period {
                start_date: "2025-11-19".to_string(),
                end_date: "2025-11-19".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = TaskStore::new();
        let task = store.create(request()).await;
        let fetched = store.get(task.id).await.unwrap();
        assert_eq!(fetched.id, task.id);
        assert_eq!(fetched.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_not_found() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        match store.get(id).await {
            Err(TaskStoreError::NotFound(missing)) => assert_eq!(missing, id),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lifecycle_to_completed() {
        let store = TaskStore::new();
        let task = store.create(request()).await;

        store
            .update_status(task.id, TaskStatus::Processing)
            .await
            .unwrap();
        store.set_report(task.id, report()).await.unwrap();

        let done = store.get(task.id).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.report.is_some());
        assert!(done.error.is_none());
    }

    #[tokio::test]
    async fn test_lifecycle_to_failed() {
        let store = TaskStore::new();
        let task = store.create(request()).await;

        store
            .update_status(task.id, TaskStatus::Processing)
            .await
            .unwrap();
        store
            .set_error(task.id, "telemetry source unreachable")
            .await
            .unwrap();

        let failed = store.get(task.id).await.unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(
            failed.error.as_deref(),
            Some("telemetry source unreachable")
        );
    }

    #[tokio::test]
    async fn test_terminal_task_is_immutable() {
        let store = TaskStore::new();
        let task = store.create(request()).await;
        store
            .update_status(task.id, TaskStatus::Processing)
            .await
            .unwrap();
        store.set_report(task.id, report()).await.unwrap();

        assert!(store
            .update_status(task.id, TaskStatus::Processing)
            .await
            .is_err());
        assert!(store.set_error(task.id, "late failure").await.is_err());

        let unchanged = store.get(task.id).await.unwrap();
        assert_eq!(unchanged.status, TaskStatus::Completed);
        assert!(unchanged.error.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_get_distinct_ids() {
        let store = Arc::new(TaskStore::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.create(request()).await.id })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 16);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = TaskStore::new();
        let task = store.create(request()).await;
        assert!(store.delete(task.id).await);
        assert!(!store.delete(task.id).await);
        assert!(store.get(task.id).await.is_err());
    }
}
