//! Ledger Gateway
//!
//! The shared read/write surface over one deployed contract. The signer-bound
//! handle is established lazily on first use and can be dropped with
//! [`LedgerGateway::reset`] when the wallet switches account or chain.

use std::sync::Arc;
use tokio::sync::Mutex;

use super::contract::{ContractConnector, LedgerContract};
use super::error::{ContractError, GatewayError, GatewayResult};
use super::types::{
    EntityKind, Note, RegisterOutcome, RegistrationStatus, Task, TaskStatus, TxReceipt,
};
use crate::wallet::WalletProvider;

/// Gateway over a single contract address
pub struct LedgerGateway {
    contract_address: String,
    provider: Option<Arc<dyn WalletProvider>>,
    connector: Arc<dyn ContractConnector>,
    handle: Mutex<Option<Arc<dyn LedgerContract>>>,
}

impl LedgerGateway {
    pub fn new(
        contract_address: impl Into<String>,
        provider: Option<Arc<dyn WalletProvider>>,
        connector: Arc<dyn ContractConnector>,
    ) -> Self {
        Self {
            contract_address: contract_address.into(),
            provider,
            connector,
            handle: Mutex::new(None),
        }
    }

    pub fn contract_address(&self) -> &str {
        &self.contract_address
    }

    /// Establish the signer-bound handle.
    ///
    /// Concurrent callers wait on the same lock, so only the first
    /// successful call talks to the wallet.
    pub async fn init(&self) -> GatewayResult<()> {
        self.contract().await.map(|_| ())
    }

    pub async fn is_initialized(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    /// Drop the binding; the next call re-initializes
    pub async fn reset(&self) {
        if self.handle.lock().await.take().is_some() {
            tracing::debug!(contract = %self.contract_address, "Ledger binding reset");
        }
    }

    /// Account the current binding signs with
    pub async fn signer(&self) -> GatewayResult<String> {
        Ok(self.contract().await?.signer().to_string())
    }

    async fn contract(&self) -> GatewayResult<Arc<dyn LedgerContract>> {
        let mut handle = self.handle.lock().await;
        if let Some(contract) = handle.as_ref() {
            return Ok(contract.clone());
        }

        let provider = self.provider.clone().ok_or(GatewayError::NotInstalled)?;
        let contract = self
            .connector
            .connect(provider, &self.contract_address)
            .await
            .map_err(|e| GatewayError::InitFailed(e.to_string()))?;

        tracing::info!(
            contract = %self.contract_address,
            signer = %contract.signer(),
            "Ledger gateway initialized"
        );

        *handle = Some(contract.clone());
        Ok(contract)
    }

    /// Register the signer; a second registration is a no-op
    pub async fn register(&self) -> GatewayResult<RegisterOutcome> {
        let contract = self.contract().await?;
        match contract.register().await {
            Ok(receipt) => {
                tracing::info!(signer = %contract.signer(), tx_hash = %receipt.tx_hash, "Account registered");
                Ok(RegisterOutcome::Registered(receipt))
            }
            Err(e) if is_already_registered(&e) => {
                tracing::debug!(signer = %contract.signer(), "Account already registered");
                Ok(RegisterOutcome::AlreadyRegistered)
            }
            Err(e) => Err(GatewayError::classify(e, None)),
        }
    }

    /// Whether the signer may use entity operations.
    ///
    /// Prefers the contract's explicit query and falls back to probing
    /// `get_note_ids`. Only a contract revert counts as unregistered;
    /// anything else is reported as unknown.
    pub async fn registration_status(&self) -> RegistrationStatus {
        let contract = match self.contract().await {
            Ok(contract) => contract,
            Err(e) => {
                return RegistrationStatus::Unknown {
                    reason: e.to_string(),
                }
            }
        };

        match contract.is_registered().await {
            Ok(Some(true)) => return RegistrationStatus::Registered,
            Ok(Some(false)) => return RegistrationStatus::Unregistered,
            Ok(None) => {}
            Err(e) => {
                return RegistrationStatus::Unknown {
                    reason: e.to_string(),
                }
            }
        }

        match contract.get_note_ids().await {
            Ok(_) => RegistrationStatus::Registered,
            Err(ContractError::Reverted(reason)) => {
                tracing::debug!(signer = %contract.signer(), reason = %reason, "Registration probe reverted");
                RegistrationStatus::Unregistered
            }
            Err(e) => {
                tracing::warn!(signer = %contract.signer(), error = %e, "Registration probe failed");
                RegistrationStatus::Unknown {
                    reason: e.to_string(),
                }
            }
        }
    }

    // ========================================================================
    // Notes
    // ========================================================================

    pub async fn create_note(&self, id: &str, title: &str, content: &str) -> GatewayResult<TxReceipt> {
        let contract = self.contract().await?;
        contract
            .create_note(id, title, content)
            .await
            .map_err(|e| GatewayError::classify(e, None))
    }

    pub async fn update_note(&self, id: &str, title: &str, content: &str) -> GatewayResult<TxReceipt> {
        let contract = self.contract().await?;
        contract
            .update_note(id, title, content)
            .await
            .map_err(|e| GatewayError::classify(e, Some((EntityKind::Note, id))))
    }

    pub async fn add_attachment_to_note(&self, note_id: &str, cid: &str) -> GatewayResult<TxReceipt> {
        let contract = self.contract().await?;
        contract
            .add_attachment_to_note(note_id, cid)
            .await
            .map_err(|e| GatewayError::classify(e, Some((EntityKind::Note, note_id))))
    }

    pub async fn delete_note(&self, id: &str) -> GatewayResult<TxReceipt> {
        let contract = self.contract().await?;
        contract
            .delete_note(id)
            .await
            .map_err(|e| GatewayError::classify(e, Some((EntityKind::Note, id))))
    }

    pub async fn get_note_ids(&self) -> GatewayResult<Vec<String>> {
        let contract = self.contract().await?;
        contract
            .get_note_ids()
            .await
            .map_err(|e| GatewayError::classify(e, None))
    }

    pub async fn get_note(&self, id: &str) -> GatewayResult<Note> {
        let contract = self.contract().await?;
        contract
            .get_note(id)
            .await
            .map_err(|e| GatewayError::classify(e, Some((EntityKind::Note, id))))
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    pub async fn create_task(
        &self,
        id: &str,
        title: &str,
        description: &str,
        status: TaskStatus,
    ) -> GatewayResult<TxReceipt> {
        let contract = self.contract().await?;
        contract
            .create_task(id, title, description, status)
            .await
            .map_err(|e| GatewayError::classify(e, None))
    }

    pub async fn update_task(
        &self,
        id: &str,
        title: &str,
        description: &str,
        completed: bool,
        status: TaskStatus,
    ) -> GatewayResult<TxReceipt> {
        let contract = self.contract().await?;
        contract
            .update_task(id, title, description, completed, status)
            .await
            .map_err(|e| GatewayError::classify(e, Some((EntityKind::Task, id))))
    }

    pub async fn delete_task(&self, id: &str) -> GatewayResult<TxReceipt> {
        let contract = self.contract().await?;
        contract
            .delete_task(id)
            .await
            .map_err(|e| GatewayError::classify(e, Some((EntityKind::Task, id))))
    }

    pub async fn get_task_ids(&self) -> GatewayResult<Vec<String>> {
        let contract = self.contract().await?;
        contract
            .get_task_ids()
            .await
            .map_err(|e| GatewayError::classify(e, None))
    }

    pub async fn get_task(&self, id: &str) -> GatewayResult<Task> {
        let contract = self.contract().await?;
        contract
            .get_task(id)
            .await
            .map_err(|e| GatewayError::classify(e, Some((EntityKind::Task, id))))
    }
}

fn is_already_registered(error: &ContractError) -> bool {
    error
        .revert_reason()
        .map(|reason| reason.to_lowercase().contains("already registered"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::ledger::MemoryLedger;
    use crate::wallet::MemoryWallet;

    const ALICE: &str = "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1";
    const CONTRACT: &str = "0x8507bFBB94499baA164df9f283188F4dd7Ac39aF";

    fn gateway() -> (LedgerGateway, Arc<MemoryWallet>, MemoryLedger) {
        let wallet = Arc::new(MemoryWallet::with_account(ALICE, 1));
        let ledger = MemoryLedger::new();
        let gateway = LedgerGateway::new(CONTRACT, Some(wallet.clone()), Arc::new(ledger.clone()));
        (gateway, wallet, ledger)
    }

    /// Counts connects, delegating to a memory ledger
    struct CountingConnector {
        ledger: MemoryLedger,
        connects: AtomicUsize,
    }

    #[async_trait]
    impl ContractConnector for CountingConnector {
        async fn connect(
            &self,
            provider: Arc<dyn WalletProvider>,
            address: &str,
        ) -> Result<Arc<dyn LedgerContract>, ContractError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.ledger.connect(provider, address).await
        }
    }

    /// Contract without an explicit registration query
    struct ProbeOnly(crate::ledger::MemoryContract);

    #[async_trait]
    impl LedgerContract for ProbeOnly {
        fn signer(&self) -> &str {
            self.0.signer()
        }
        fn address(&self) -> &str {
            self.0.address()
        }
        async fn register(&self) -> Result<TxReceipt, ContractError> {
            self.0.register().await
        }
        async fn create_note(&self, id: &str, t: &str, c: &str) -> Result<TxReceipt, ContractError> {
            self.0.create_note(id, t, c).await
        }
        async fn update_note(&self, id: &str, t: &str, c: &str) -> Result<TxReceipt, ContractError> {
            self.0.update_note(id, t, c).await
        }
        async fn add_attachment_to_note(&self, id: &str, cid: &str) -> Result<TxReceipt, ContractError> {
            self.0.add_attachment_to_note(id, cid).await
        }
        async fn delete_note(&self, id: &str) -> Result<TxReceipt, ContractError> {
            self.0.delete_note(id).await
        }
        async fn get_note_ids(&self) -> Result<Vec<String>, ContractError> {
            self.0.get_note_ids().await
        }
        async fn get_note(&self, id: &str) -> Result<Note, ContractError> {
            self.0.get_note(id).await
        }
        async fn create_task(&self, id: &str, t: &str, d: &str, s: TaskStatus) -> Result<TxReceipt, ContractError> {
            self.0.create_task(id, t, d, s).await
        }
        async fn update_task(
            &self,
            id: &str,
            t: &str,
            d: &str,
            c: bool,
            s: TaskStatus,
        ) -> Result<TxReceipt, ContractError> {
            self.0.update_task(id, t, d, c, s).await
        }
        async fn delete_task(&self, id: &str) -> Result<TxReceipt, ContractError> {
            self.0.delete_task(id).await
        }
        async fn get_task_ids(&self) -> Result<Vec<String>, ContractError> {
            self.0.get_task_ids().await
        }
        async fn get_task(&self, id: &str) -> Result<Task, ContractError> {
            self.0.get_task(id).await
        }
    }

    struct ProbeOnlyConnector(MemoryLedger);

    #[async_trait]
    impl ContractConnector for ProbeOnlyConnector {
        async fn connect(
            &self,
            _provider: Arc<dyn WalletProvider>,
            _address: &str,
        ) -> Result<Arc<dyn LedgerContract>, ContractError> {
            Ok(Arc::new(ProbeOnly(self.0.contract_for(ALICE))))
        }
    }

    #[tokio::test]
    async fn test_init_without_provider() {
        let gateway = LedgerGateway::new(CONTRACT, None, Arc::new(MemoryLedger::new()));
        assert!(matches!(gateway.init().await, Err(GatewayError::NotInstalled)));
        assert!(matches!(
            gateway.get_note_ids().await,
            Err(GatewayError::NotInstalled)
        ));
    }

    #[tokio::test]
    async fn test_init_rejected_is_init_failed() {
        let (gateway, wallet, _) = gateway();
        wallet.set_reject_requests(true).await;
        assert!(matches!(gateway.init().await, Err(GatewayError::InitFailed(_))));
        assert!(!gateway.is_initialized().await);
    }

    #[tokio::test]
    async fn test_init_only_once() {
        let wallet = Arc::new(MemoryWallet::with_account(ALICE, 1));
        let connector = Arc::new(CountingConnector {
            ledger: MemoryLedger::new(),
            connects: AtomicUsize::new(0),
        });
        let gateway = Arc::new(LedgerGateway::new(CONTRACT, Some(wallet), connector.clone()));

        let inits: Vec<_> = (0..8)
            .map(|_| {
                let gateway = gateway.clone();
                tokio::spawn(async move { gateway.init().await })
            })
            .collect();
        for init in inits {
            init.await.unwrap().unwrap();
        }
        gateway.init().await.unwrap();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

        gateway.reset().await;
        assert!(!gateway.is_initialized().await);
        gateway.init().await.unwrap();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let (gateway, _, _) = gateway();
        assert!(matches!(
            gateway.register().await.unwrap(),
            RegisterOutcome::Registered(_)
        ));
        assert_eq!(
            gateway.register().await.unwrap(),
            RegisterOutcome::AlreadyRegistered
        );
    }

    #[tokio::test]
    async fn test_registration_status_explicit() {
        let (gateway, _, ledger) = gateway();
        assert_eq!(gateway.registration_status().await, RegistrationStatus::Unregistered);

        gateway.register().await.unwrap();
        assert_eq!(gateway.registration_status().await, RegistrationStatus::Registered);

        ledger.set_offline(true);
        assert!(matches!(
            gateway.registration_status().await,
            RegistrationStatus::Unknown { .. }
        ));
    }

    #[tokio::test]
    async fn test_registration_status_probe() {
        let wallet = Arc::new(MemoryWallet::with_account(ALICE, 1));
        let ledger = MemoryLedger::new();
        let gateway = LedgerGateway::new(
            CONTRACT,
            Some(wallet),
            Arc::new(ProbeOnlyConnector(ledger.clone())),
        );

        assert_eq!(gateway.registration_status().await, RegistrationStatus::Unregistered);
        gateway.register().await.unwrap();
        assert_eq!(gateway.registration_status().await, RegistrationStatus::Registered);

        // Connectivity loss is not mistaken for "unregistered"
        ledger.set_offline(true);
        assert!(matches!(
            gateway.registration_status().await,
            RegistrationStatus::Unknown { .. }
        ));
    }

    #[tokio::test]
    async fn test_not_found_and_not_registered() {
        let (gateway, _, _) = gateway();
        assert!(matches!(
            gateway.get_note_ids().await,
            Err(GatewayError::NotRegistered)
        ));

        gateway.register().await.unwrap();
        let err = gateway.get_task("missing").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { kind: EntityKind::Task, .. }));
        let err = gateway.delete_note("missing").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { kind: EntityKind::Note, .. }));
    }

    #[tokio::test]
    async fn test_rejected_write() {
        let (gateway, wallet, _) = gateway();
        gateway.init().await.unwrap();
        gateway.register().await.unwrap();

        // Collision surfaces as a failed transaction, not a missing entity
        gateway.create_note("n1", "a", "").await.unwrap();
        let err = gateway.create_note("n1", "b", "").await.unwrap_err();
        assert!(matches!(err, GatewayError::TransactionFailed(_)));

        // Binding survives a later wallet rejection setting
        wallet.set_reject_requests(true).await;
        assert_eq!(gateway.get_note_ids().await.unwrap(), vec!["n1"]);
    }
}
