//! Task operations

use futures_util::future::try_join_all;
use uuid::Uuid;

use super::{contains_query, require_title, Loaded, Workspace, WorkspaceError, WorkspaceResult};
use crate::ledger::{Task, TaskStatus, TxReceipt};
use crate::session::Route;

/// User input for a new or edited task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            status: TaskStatus::Todo,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn validate(&self) -> WorkspaceResult<()> {
        require_title(&self.title)
    }
}

/// Whether `task` matches a search on its title or description
pub fn task_matches(task: &Task, query: &str) -> bool {
    contains_query(&[task.title.as_str(), task.description.as_str()], query)
}

impl Workspace {
    pub async fn create_task(&self, draft: &TaskDraft) -> WorkspaceResult<Task> {
        draft.validate()?;

        let id = Uuid::new_v4().to_string();
        let receipt = self
            .gateway
            .create_task(&id, &draft.title, &draft.description, draft.status)
            .await?;
        tracing::info!(task_id = %id, status = %draft.status, tx_hash = %receipt.tx_hash, "Task created");

        Ok(self.gateway.get_task(&id).await?)
    }

    /// Replace title, description and status, keeping the completion flag
    pub async fn update_task(&self, id: &str, draft: &TaskDraft) -> WorkspaceResult<Task> {
        draft.validate()?;

        let current = self.gateway.get_task(id).await?;
        let updated = Task {
            title: draft.title.clone(),
            description: draft.description.clone(),
            status: draft.status,
            ..current
        };
        self.write_task(&updated).await
    }

    /// Flip the completion flag
    pub async fn toggle_task(&self, id: &str) -> WorkspaceResult<Task> {
        let mut task = self.gateway.get_task(id).await?;
        task.completed = !task.completed;
        self.write_task(&task).await
    }

    /// Put a task in another column, keeping everything else
    pub async fn move_task(&self, id: &str, status: TaskStatus) -> WorkspaceResult<Task> {
        let mut task = self.gateway.get_task(id).await?;
        task.status = status;
        self.write_task(&task).await
    }

    pub async fn delete_task(&self, id: &str) -> WorkspaceResult<TxReceipt> {
        let receipt = self.gateway.delete_task(id).await?;
        tracing::info!(task_id = %id, "Task deleted");
        Ok(receipt)
    }

    /// Every task, in ledger order. One failed read fails the listing.
    pub async fn list_tasks(&self) -> WorkspaceResult<Vec<Task>> {
        let ids = self.gateway.get_task_ids().await?;
        tracing::debug!(count = ids.len(), "Fetching tasks");

        let tasks = try_join_all(ids.iter().map(|id| self.gateway.get_task(id))).await?;
        Ok(tasks)
    }

    pub async fn search_tasks(&self, query: &str) -> WorkspaceResult<Vec<Task>> {
        let mut tasks = self.list_tasks().await?;
        tasks.retain(|task| task_matches(task, query));
        Ok(tasks)
    }

    pub async fn load_task(&self, id: &str) -> WorkspaceResult<Loaded<Task>> {
        match self.gateway.get_task(id).await {
            Ok(task) => Ok(Loaded::Found(task)),
            Err(e) => {
                let e = WorkspaceError::from(e);
                if e.is_not_found() {
                    Ok(Loaded::Redirect(Route::Tasks))
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn write_task(&self, task: &Task) -> WorkspaceResult<Task> {
        self.gateway
            .update_task(
                &task.id,
                &task.title,
                &task.description,
                task.completed,
                task.status,
            )
            .await?;
        tracing::info!(
            task_id = %task.id,
            status = %task.status,
            completed = task.completed,
            "Task updated"
        );

        Ok(self.gateway.get_task(&task.id).await?)
    }
}
