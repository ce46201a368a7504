//! Kanban board and dashboard summary

use serde::Serialize;

use super::{Workspace, WorkspaceError, WorkspaceResult};
use crate::ledger::{Task, TaskStatus};

/// Tasks grouped into status columns, each in ledger order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KanbanBoard {
    pub todo: Vec<Task>,
    pub in_progress: Vec<Task>,
    pub done: Vec<Task>,
}

impl KanbanBoard {
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut board = Self::default();
        for task in tasks {
            board.column_mut(task.status).push(task);
        }
        board
    }

    pub fn column(&self, status: TaskStatus) -> &[Task] {
        match status {
            TaskStatus::Todo => &self.todo,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Done => &self.done,
        }
    }

    fn column_mut(&mut self, status: TaskStatus) -> &mut Vec<Task> {
        match status {
            TaskStatus::Todo => &mut self.todo,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Done => &mut self.done,
        }
    }

    /// Columns in board order
    pub fn columns(&self) -> impl Iterator<Item = (TaskStatus, &[Task])> + '_ {
        TaskStatus::all()
            .iter()
            .map(move |status| (*status, self.column(*status)))
    }

    /// Columns a card in `from` can be moved to
    pub fn moves(from: TaskStatus) -> &'static [TaskStatus] {
        match from {
            TaskStatus::Todo => &[TaskStatus::InProgress],
            TaskStatus::InProgress => &[TaskStatus::Todo, TaskStatus::Done],
            TaskStatus::Done => &[TaskStatus::InProgress],
        }
    }

    pub fn can_move(from: TaskStatus, to: TaskStatus) -> bool {
        Self::moves(from).contains(&to)
    }

    pub fn len(&self) -> usize {
        self.todo.len() + self.in_progress.len() + self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move a card one step along the board, writing through to the ledger
    pub async fn move_task(
        &mut self,
        workspace: &Workspace,
        id: &str,
        to: TaskStatus,
    ) -> WorkspaceResult<Task> {
        let from = TaskStatus::all()
            .iter()
            .copied()
            .find(|status| self.column(*status).iter().any(|t| t.id == id))
            .ok_or_else(|| WorkspaceError::Validation(format!("Task {} is not on the board", id)))?;

        if !Self::can_move(from, to) {
            return Err(WorkspaceError::Validation(format!(
                "Cannot move task from {} to {}",
                from, to
            )));
        }

        let task = workspace.move_task(id, to).await?;
        self.column_mut(from).retain(|t| t.id != id);
        self.column_mut(to).push(task.clone());
        Ok(task)
    }

    /// Drop a card after it was deleted
    pub fn remove(&mut self, id: &str) {
        for status in TaskStatus::all() {
            self.column_mut(*status).retain(|t| t.id != id);
        }
    }
}

/// Counts shown on the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub note_count: usize,
    pub task_count: usize,
}

impl Workspace {
    pub async fn board(&self) -> WorkspaceResult<KanbanBoard> {
        Ok(KanbanBoard::from_tasks(self.list_tasks().await?))
    }

    pub async fn dashboard(&self) -> WorkspaceResult<DashboardSummary> {
        let (notes, tasks) =
            tokio::try_join!(self.gateway.get_note_ids(), self.gateway.get_task_ids())?;
        Ok(DashboardSummary {
            note_count: notes.len(),
            task_count: tasks.len(),
        })
    }
}
