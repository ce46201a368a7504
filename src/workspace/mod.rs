//! Workspace
//!
//! The note and task operations behind each page: validation, id
//! generation, fan-out listing, search and the kanban board.
//!
//! ## Architecture
//!
//! - **Workspace**: page-level operations over a shared [`LedgerGateway`]
//! - **NoteDraft / TaskDraft**: validated user input
//! - **KanbanBoard**: tasks grouped by status with the allowed moves
//! - **DashboardSummary**: entity counts for the landing page

mod board;
mod notes;
mod tasks;

use std::sync::Arc;
use thiserror::Error;

use crate::ledger::{GatewayError, LedgerGateway};
use crate::session::Route;

pub use board::{DashboardSummary, KanbanBoard};
pub use notes::{note_matches, NoteDraft};
pub use tasks::{task_matches, TaskDraft};

#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// User input rejected before reaching the ledger
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl WorkspaceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, WorkspaceError::Gateway(GatewayError::NotFound { .. }))
    }
}

/// Result type alias for workspace operations
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// A detail page's entity, or where to send the user instead
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loaded<T> {
    Found(T),
    Redirect(Route),
}

/// Note and task operations for the connected account
#[derive(Clone)]
pub struct Workspace {
    gateway: Arc<LedgerGateway>,
}

impl Workspace {
    pub fn new(gateway: Arc<LedgerGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<LedgerGateway> {
        &self.gateway
    }
}

fn require_title(title: &str) -> WorkspaceResult<()> {
    if title.trim().is_empty() {
        return Err(WorkspaceError::Validation("Title required".to_string()));
    }
    Ok(())
}

/// Case-insensitive substring match; a blank query matches everything
fn contains_query(fields: &[&str], query: &str) -> bool {
    let query = query.trim().to_lowercase();
    query.is_empty() || fields.iter().any(|f| f.to_lowercase().contains(&query))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_required() {
        assert!(require_title("Hello").is_ok());
        let err = require_title("   ").unwrap_err();
        assert_eq!(err.to_string(), "Title required");
    }

    #[test]
    fn test_contains_query() {
        assert!(contains_query(&["Hello", "World"], "wORLD"));
        assert!(contains_query(&["Hello"], "  "));
        assert!(!contains_query(&["Hello", "World"], "xyz"));
    }
}
