//! Contract handle traits
//!
//! A [`LedgerContract`] is bound to one signer and one deployed contract.
//! Writes return only once the ledger has confirmed them.

use async_trait::async_trait;
use std::sync::Arc;

use super::error::ContractError;
use super::types::{Note, Task, TaskStatus, TxReceipt};
use crate::wallet::WalletProvider;

/// Signer-bound handle on the notes/tasks contract
#[async_trait]
pub trait LedgerContract: Send + Sync {
    /// Account that signs writes and scopes reads
    fn signer(&self) -> &str;

    /// Contract address this handle targets
    fn address(&self) -> &str;

    async fn register(&self) -> Result<TxReceipt, ContractError>;

    /// Explicit registration query; `None` when the contract has none
    async fn is_registered(&self) -> Result<Option<bool>, ContractError> {
        Ok(None)
    }

    async fn create_note(
        &self,
        id: &str,
        title: &str,
        content: &str,
    ) -> Result<TxReceipt, ContractError>;

    async fn update_note(
        &self,
        id: &str,
        title: &str,
        content: &str,
    ) -> Result<TxReceipt, ContractError>;

    async fn add_attachment_to_note(
        &self,
        note_id: &str,
        cid: &str,
    ) -> Result<TxReceipt, ContractError>;

    async fn delete_note(&self, id: &str) -> Result<TxReceipt, ContractError>;

    async fn get_note_ids(&self) -> Result<Vec<String>, ContractError>;

    async fn get_note(&self, id: &str) -> Result<Note, ContractError>;

    async fn create_task(
        &self,
        id: &str,
        title: &str,
        description: &str,
        status: TaskStatus,
    ) -> Result<TxReceipt, ContractError>;

    async fn update_task(
        &self,
        id: &str,
        title: &str,
        description: &str,
        completed: bool,
        status: TaskStatus,
    ) -> Result<TxReceipt, ContractError>;

    async fn delete_task(&self, id: &str) -> Result<TxReceipt, ContractError>;

    async fn get_task_ids(&self) -> Result<Vec<String>, ContractError>;

    async fn get_task(&self, id: &str) -> Result<Task, ContractError>;
}

/// Builds contract handles from a wallet provider
#[async_trait]
pub trait ContractConnector: Send + Sync {
    /// Resolve the signer through `provider` and bind to `address`
    async fn connect(
        &self,
        provider: Arc<dyn WalletProvider>,
        address: &str,
    ) -> Result<Arc<dyn LedgerContract>, ContractError>;
}
