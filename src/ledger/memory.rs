//! In-Process Ledger
//!
//! A contract that lives in memory and behaves like the deployed one: the
//! same reverts, per-account scoping and insertion-ordered id lists. Every
//! write is "mined" immediately into a fresh block.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::contract::{ContractConnector, LedgerContract};
use super::error::ContractError;
use super::types::{Note, Task, TaskStatus, TxReceipt};
use crate::wallet::{ProviderError, WalletProvider};

/// Shared in-memory ledger; clones see the same state
#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    offline: Arc<AtomicBool>,
}

#[derive(Default)]
struct LedgerState {
    /// Keyed by lowercased account address
    books: HashMap<String, AccountBook>,
    block_number: u64,
}

#[derive(Default)]
struct AccountBook {
    registered: bool,
    note_ids: Vec<String>,
    notes: HashMap<String, Note>,
    task_ids: Vec<String>,
    tasks: HashMap<String, Task>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing the connection to the ledger
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of blocks mined so far
    pub async fn block_number(&self) -> u64 {
        self.state.read().await.block_number
    }

    /// Bind a handle for `signer` directly, skipping the wallet
    pub fn contract_for(&self, signer: impl Into<String>) -> MemoryContract {
        MemoryContract {
            ledger: self.clone(),
            signer: signer.into(),
            address: "memory".to_string(),
        }
    }
}

#[async_trait]
impl ContractConnector for MemoryLedger {
    async fn connect(
        &self,
        provider: Arc<dyn WalletProvider>,
        address: &str,
    ) -> Result<Arc<dyn LedgerContract>, ContractError> {
        let signer = provider.signing_accounts().await?.into_iter().next().ok_or_else(|| {
            ContractError::Provider(ProviderError::Unauthorized(
                "no account available for signing".to_string(),
            ))
        })?;

        Ok(Arc::new(MemoryContract {
            ledger: self.clone(),
            signer,
            address: address.to_string(),
        }))
    }
}

/// Handle on a [`MemoryLedger`] bound to one signer
pub struct MemoryContract {
    ledger: MemoryLedger,
    signer: String,
    address: String,
}

fn revert(reason: &str) -> ContractError {
    ContractError::Reverted(reason.to_string())
}

impl MemoryContract {
    fn key(&self) -> String {
        self.signer.to_lowercase()
    }

    fn check_online(&self) -> Result<(), ContractError> {
        if self.ledger.offline.load(Ordering::SeqCst) {
            return Err(ContractError::Provider(ProviderError::Unavailable));
        }
        Ok(())
    }

    /// Run `f` against the caller's book and mine a block if it succeeds
    async fn write<F>(&self, f: F) -> Result<TxReceipt, ContractError>
    where
        F: FnOnce(&mut AccountBook, i64) -> Result<(), ContractError> + Send,
    {
        self.check_online()?;

        let mut state = self.ledger.state.write().await;
        let book = state.books.entry(self.key()).or_default();
        f(book, Utc::now().timestamp())?;

        state.block_number += 1;
        let block = state.block_number;
        Ok(TxReceipt {
            tx_hash: format!("0x{:064x}", block),
            block_number: Some(block),
        })
    }

    /// Write that requires a registered caller
    async fn registered_write<F>(&self, f: F) -> Result<TxReceipt, ContractError>
    where
        F: FnOnce(&mut AccountBook, i64) -> Result<(), ContractError> + Send,
    {
        self.write(|book, now| {
            if !book.registered {
                return Err(revert("User not registered"));
            }
            f(book, now)
        })
        .await
    }

    async fn read<T, F>(&self, f: F) -> Result<T, ContractError>
    where
        F: FnOnce(&AccountBook) -> Result<T, ContractError> + Send,
    {
        self.check_online()?;

        let state = self.ledger.state.read().await;
        match state.books.get(&self.key()) {
            Some(book) if book.registered => f(book),
            _ => Err(revert("User not registered")),
        }
    }
}

#[async_trait]
impl LedgerContract for MemoryContract {
    fn signer(&self) -> &str {
        &self.signer
    }

    fn address(&self) -> &str {
        &self.address
    }

    async fn register(&self) -> Result<TxReceipt, ContractError> {
        self.write(|book, _| {
            if book.registered {
                return Err(revert("User already registered"));
            }
            book.registered = true;
            Ok(())
        })
        .await
    }

    async fn is_registered(&self) -> Result<Option<bool>, ContractError> {
        self.check_online()?;
        let state = self.ledger.state.read().await;
        Ok(Some(
            state
                .books
                .get(&self.key())
                .map(|book| book.registered)
                .unwrap_or(false),
        ))
    }

    async fn create_note(
        &self,
        id: &str,
        title: &str,
        content: &str,
    ) -> Result<TxReceipt, ContractError> {
        self.registered_write(|book, now| {
            if book.notes.contains_key(id) {
                return Err(revert("Note already exists"));
            }
            book.note_ids.push(id.to_string());
            book.notes.insert(
                id.to_string(),
                Note {
                    id: id.to_string(),
                    title: title.to_string(),
                    content: content.to_string(),
                    attachments: Vec::new(),
                    created_at: now,
                    updated_at: now,
                },
            );
            Ok(())
        })
        .await
    }

    async fn update_note(
        &self,
        id: &str,
        title: &str,
        content: &str,
    ) -> Result<TxReceipt, ContractError> {
        self.registered_write(|book, now| {
            let note = book.notes.get_mut(id).ok_or_else(|| revert("Note not found"))?;
            note.title = title.to_string();
            note.content = content.to_string();
            note.updated_at = now;
            Ok(())
        })
        .await
    }

    async fn add_attachment_to_note(
        &self,
        note_id: &str,
        cid: &str,
    ) -> Result<TxReceipt, ContractError> {
        self.registered_write(|book, now| {
            let note = book
                .notes
                .get_mut(note_id)
                .ok_or_else(|| revert("Note not found"))?;
            note.attachments.push(cid.to_string());
            note.updated_at = now;
            Ok(())
        })
        .await
    }

    async fn delete_note(&self, id: &str) -> Result<TxReceipt, ContractError> {
        self.registered_write(|book, _| {
            book.notes.remove(id).ok_or_else(|| revert("Note not found"))?;
            book.note_ids.retain(|n| n != id);
            Ok(())
        })
        .await
    }

    async fn get_note_ids(&self) -> Result<Vec<String>, ContractError> {
        self.read(|book| Ok(book.note_ids.clone())).await
    }

    async fn get_note(&self, id: &str) -> Result<Note, ContractError> {
        self.read(|book| book.notes.get(id).cloned().ok_or_else(|| revert("Note not found")))
            .await
    }

    async fn create_task(
        &self,
        id: &str,
        title: &str,
        description: &str,
        status: TaskStatus,
    ) -> Result<TxReceipt, ContractError> {
        self.registered_write(|book, now| {
            if book.tasks.contains_key(id) {
                return Err(revert("Task already exists"));
            }
            book.task_ids.push(id.to_string());
            book.tasks.insert(
                id.to_string(),
                Task {
                    id: id.to_string(),
                    title: title.to_string(),
                    description: description.to_string(),
                    completed: false,
                    status,
                    created_at: now,
                    updated_at: now,
                },
            );
            Ok(())
        })
        .await
    }

    async fn update_task(
        &self,
        id: &str,
        title: &str,
        description: &str,
        completed: bool,
        status: TaskStatus,
    ) -> Result<TxReceipt, ContractError> {
        self.registered_write(|book, now| {
            let task = book.tasks.get_mut(id).ok_or_else(|| revert("Task not found"))?;
            task.title = title.to_string();
            task.description = description.to_string();
            task.completed = completed;
            task.status = status;
            task.updated_at = now;
            Ok(())
        })
        .await
    }

    async fn delete_task(&self, id: &str) -> Result<TxReceipt, ContractError> {
        self.registered_write(|book, _| {
            book.tasks.remove(id).ok_or_else(|| revert("Task not found"))?;
            book.task_ids.retain(|t| t != id);
            Ok(())
        })
        .await
    }

    async fn get_task_ids(&self) -> Result<Vec<String>, ContractError> {
        self.read(|book| Ok(book.task_ids.clone())).await
    }

    async fn get_task(&self, id: &str) -> Result<Task, ContractError> {
        self.read(|book| book.tasks.get(id).cloned().ok_or_else(|| revert("Task not found")))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "0xA1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1";
    const BOB: &str = "0xb2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2";

    async fn registered(ledger: &MemoryLedger, signer: &str) -> MemoryContract {
        let contract = ledger.contract_for(signer);
        contract.register().await.unwrap();
        contract
    }

    #[tokio::test]
    async fn test_register_once() {
        let ledger = MemoryLedger::new();
        let contract = ledger.contract_for(ALICE);

        assert_eq!(contract.is_registered().await.unwrap(), Some(false));
        let receipt = contract.register().await.unwrap();
        assert_eq!(receipt.block_number, Some(1));

        let err = contract.register().await.unwrap_err();
        assert_eq!(err.revert_reason(), Some("User already registered"));
        assert_eq!(contract.is_registered().await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_unregistered_reads_revert() {
        let ledger = MemoryLedger::new();
        let contract = ledger.contract_for(ALICE);

        let err = contract.get_note_ids().await.unwrap_err();
        assert_eq!(err.revert_reason(), Some("User not registered"));
        let err = contract.create_note("n1", "a", "b").await.unwrap_err();
        assert_eq!(err.revert_reason(), Some("User not registered"));
    }

    #[tokio::test]
    async fn test_note_lifecycle() {
        let ledger = MemoryLedger::new();
        let contract = registered(&ledger, ALICE).await;

        contract.create_note("n1", "Hello", "World").await.unwrap();
        let note = contract.get_note("n1").await.unwrap();
        assert_eq!(note.title, "Hello");
        assert_eq!(note.created_at, note.updated_at);
        assert!(note.attachments.is_empty());

        contract.add_attachment_to_note("n1", "bafy1").await.unwrap();
        contract.update_note("n1", "Hi", "There").await.unwrap();
        let note = contract.get_note("n1").await.unwrap();
        assert_eq!(note.attachments, vec!["bafy1"]);
        assert_eq!(note.content, "There");
        assert!(note.updated_at >= note.created_at);

        contract.delete_note("n1").await.unwrap();
        let err = contract.get_note("n1").await.unwrap_err();
        assert_eq!(err.revert_reason(), Some("Note not found"));
    }

    #[tokio::test]
    async fn test_ids_keep_insertion_order() {
        let ledger = MemoryLedger::new();
        let contract = registered(&ledger, ALICE).await;

        for id in ["c", "a", "b"] {
            contract.create_task(id, id, "", TaskStatus::Todo).await.unwrap();
        }
        contract.delete_task("a").await.unwrap();

        assert_eq!(contract.get_task_ids().await.unwrap(), vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_id_collision_rejected() {
        let ledger = MemoryLedger::new();
        let contract = registered(&ledger, ALICE).await;

        contract.create_note("n1", "a", "").await.unwrap();
        let err = contract.create_note("n1", "b", "").await.unwrap_err();
        assert_eq!(err.revert_reason(), Some("Note already exists"));
    }

    #[tokio::test]
    async fn test_accounts_are_isolated() {
        let ledger = MemoryLedger::new();
        let alice = registered(&ledger, ALICE).await;
        let bob = registered(&ledger, BOB).await;

        alice.create_note("n1", "mine", "").await.unwrap();
        assert!(bob.get_note_ids().await.unwrap().is_empty());
        assert!(bob.get_note("n1").await.is_err());

        // Address case does not split an account
        let shouted = ledger.contract_for(ALICE.to_uppercase().replacen("0X", "0x", 1));
        assert_eq!(shouted.get_note_ids().await.unwrap(), vec!["n1"]);
    }

    #[tokio::test]
    async fn test_offline() {
        let ledger = MemoryLedger::new();
        let contract = registered(&ledger, ALICE).await;

        ledger.set_offline(true);
        assert!(matches!(
            contract.get_note_ids().await,
            Err(ContractError::Provider(ProviderError::Unavailable))
        ));
        ledger.set_offline(false);
        assert!(contract.get_note_ids().await.is_ok());
    }
}
