//! Note operations

use futures_util::future::try_join_all;
use uuid::Uuid;

use super::{contains_query, require_title, Loaded, Workspace, WorkspaceError, WorkspaceResult};
use crate::ledger::{Note, TxReceipt};
use crate::session::Route;

/// User input for a new or edited note
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn validate(&self) -> WorkspaceResult<()> {
        require_title(&self.title)
    }
}

/// Whether `note` matches a search on its title or content
pub fn note_matches(note: &Note, query: &str) -> bool {
    contains_query(&[note.title.as_str(), note.content.as_str()], query)
}

impl Workspace {
    /// Store a new note under a fresh id and return it as recorded
    pub async fn create_note(&self, draft: &NoteDraft) -> WorkspaceResult<Note> {
        draft.validate()?;

        let id = Uuid::new_v4().to_string();
        let receipt = self
            .gateway
            .create_note(&id, &draft.title, &draft.content)
            .await?;
        tracing::info!(note_id = %id, tx_hash = %receipt.tx_hash, "Note created");

        Ok(self.gateway.get_note(&id).await?)
    }

    pub async fn update_note(&self, id: &str, draft: &NoteDraft) -> WorkspaceResult<Note> {
        draft.validate()?;

        self.gateway
            .update_note(id, &draft.title, &draft.content)
            .await?;
        tracing::info!(note_id = %id, "Note updated");

        Ok(self.gateway.get_note(id).await?)
    }

    /// Attach a content identifier to a note
    pub async fn attach_to_note(&self, id: &str, cid: &str) -> WorkspaceResult<Note> {
        if cid.trim().is_empty() {
            return Err(WorkspaceError::Validation(
                "Attachment identifier required".to_string(),
            ));
        }

        self.gateway.add_attachment_to_note(id, cid.trim()).await?;
        Ok(self.gateway.get_note(id).await?)
    }

    pub async fn delete_note(&self, id: &str) -> WorkspaceResult<TxReceipt> {
        let receipt = self.gateway.delete_note(id).await?;
        tracing::info!(note_id = %id, "Note deleted");
        Ok(receipt)
    }

    /// Every note, in ledger order. One failed read fails the listing.
    pub async fn list_notes(&self) -> WorkspaceResult<Vec<Note>> {
        let ids = self.gateway.get_note_ids().await?;
        tracing::debug!(count = ids.len(), "Fetching notes");

        let notes = try_join_all(ids.iter().map(|id| self.gateway.get_note(id))).await?;
        Ok(notes)
    }

    pub async fn search_notes(&self, query: &str) -> WorkspaceResult<Vec<Note>> {
        let mut notes = self.list_notes().await?;
        notes.retain(|note| note_matches(note, query));
        Ok(notes)
    }

    /// Note for a detail page; a missing note sends the user back to the list
    pub async fn load_note(&self, id: &str) -> WorkspaceResult<Loaded<Note>> {
        match self.gateway.get_note(id).await {
            Ok(note) => Ok(Loaded::Found(note)),
            Err(e) => {
                let e = WorkspaceError::from(e);
                if e.is_not_found() {
                    tracing::debug!(note_id = %id, "Note missing, redirecting");
                    Ok(Loaded::Redirect(Route::NoteView(id.to_string()).fallback()))
                } else {
                    Err(e)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::GatewayError;
    use crate::workspace::test_support::workspace;

    #[tokio::test]
    async fn test_create_generates_id() {
        let (workspace, _) = workspace().await;

        let note = workspace
            .create_note(&NoteDraft::new("Hello", "World"))
            .await
            .unwrap();
        assert!(Uuid::parse_str(&note.id).is_ok());
        assert_eq!(note.title, "Hello");
        assert_eq!(note.content, "World");
        assert_eq!(note.created_at, note.updated_at);

        let other = workspace.create_note(&NoteDraft::new("Again", "")).await.unwrap();
        assert_ne!(note.id, other.id);
    }

    #[tokio::test]
    async fn test_blank_title_never_reaches_ledger() {
        let (workspace, ledger) = workspace().await;
        let blocks = ledger.block_number().await;

        let err = workspace
            .create_note(&NoteDraft::new(" ", "body"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::Validation(_)));
        assert_eq!(ledger.block_number().await, blocks);
    }

    #[tokio::test]
    async fn test_list_and_search() {
        let (workspace, _) = workspace().await;
        workspace.create_note(&NoteDraft::new("Groceries", "milk, eggs")).await.unwrap();
        workspace.create_note(&NoteDraft::new("Ideas", "Buy MILK shares")).await.unwrap();
        workspace.create_note(&NoteDraft::new("Travel", "Lisbon")).await.unwrap();

        let all = workspace.list_notes().await.unwrap();
        let titles: Vec<_> = all.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Groceries", "Ideas", "Travel"]);

        let hits = workspace.search_notes("Milk").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(workspace.search_notes("").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_list_fails_when_any_read_fails() {
        let (workspace, ledger) = workspace().await;
        workspace.create_note(&NoteDraft::new("One", "")).await.unwrap();

        ledger.set_offline(true);
        assert!(matches!(
            workspace.list_notes().await,
            Err(WorkspaceError::Gateway(GatewayError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_attach_and_update() {
        let (workspace, _) = workspace().await;
        let note = workspace.create_note(&NoteDraft::new("Doc", "")).await.unwrap();

        let note = workspace.attach_to_note(&note.id, "bafybeigdyr").await.unwrap();
        assert_eq!(note.attachments, vec!["bafybeigdyr"]);

        let note = workspace
            .update_note(&note.id, &NoteDraft::new("Doc v2", "body"))
            .await
            .unwrap();
        assert_eq!(note.title, "Doc v2");
        assert_eq!(note.attachments.len(), 1);

        assert!(matches!(
            workspace.attach_to_note(&note.id, " ").await,
            Err(WorkspaceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_note_redirects_to_list() {
        let (workspace, _) = workspace().await;
        let note = workspace.create_note(&NoteDraft::new("Gone", "")).await.unwrap();
        workspace.delete_note(&note.id).await.unwrap();

        assert_eq!(
            workspace.load_note(&note.id).await.unwrap(),
            Loaded::Redirect(Route::Notes)
        );
    }
}
