//! In-Process Wallet
//!
//! A wallet that lives inside the process. Used by tests and the demo
//! command in place of a browser or node wallet.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{broadcast, RwLock};

use super::provider::{
    to_quantity, ProviderError, ProviderEvent, WalletProvider, METHOD_NOT_FOUND_CODE,
};

/// In-memory wallet with scriptable user behaviour
pub struct MemoryWallet {
    state: RwLock<WalletState>,
    events: broadcast::Sender<ProviderEvent>,
}

#[derive(Debug, Clone)]
struct WalletState {
    accounts: Vec<String>,
    chain_id: u64,
    authorized: bool,
    reject_requests: bool,
}

impl MemoryWallet {
    /// Create a wallet holding `accounts` on chain `chain_id`
    pub fn new(accounts: Vec<String>, chain_id: u64) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            state: RwLock::new(WalletState {
                accounts,
                chain_id,
                authorized: false,
                reject_requests: false,
            }),
            events,
        }
    }

    /// Wallet with a single account
    pub fn with_account(account: impl Into<String>, chain_id: u64) -> Self {
        Self::new(vec![account.into()], chain_id)
    }

    /// Make the user decline (or accept) future authorization prompts
    pub async fn set_reject_requests(&self, reject: bool) {
        self.state.write().await.reject_requests = reject;
    }

    /// Whether the application has been granted access
    pub async fn is_authorized(&self) -> bool {
        self.state.read().await.authorized
    }

    /// Grant access without a prompt (as if approved in an earlier visit)
    pub async fn authorize(&self) {
        self.state.write().await.authorized = true;
    }

    /// Revoke access from the wallet side
    pub async fn revoke(&self) {
        let mut state = self.state.write().await;
        state.authorized = false;
        drop(state);
        let _ = self.events.send(ProviderEvent::AccountsChanged(Vec::new()));
    }

    /// Make `account` the active account and notify subscribers
    pub async fn switch_account(&self, account: impl Into<String>) {
        let account = account.into();
        let mut state = self.state.write().await;
        state.accounts.retain(|a| !a.eq_ignore_ascii_case(&account));
        state.accounts.insert(0, account);
        let visible = if state.authorized {
            state.accounts.clone()
        } else {
            Vec::new()
        };
        drop(state);
        let _ = self.events.send(ProviderEvent::AccountsChanged(visible));
    }

    /// Move to another chain and notify subscribers
    pub async fn switch_chain(&self, chain_id: u64) {
        self.state.write().await.chain_id = chain_id;
        let _ = self.events.send(ProviderEvent::ChainChanged(chain_id.to_string()));
    }

    /// Number of live event receivers
    pub fn listener_count(&self) -> usize {
        self.events.receiver_count()
    }
}

#[async_trait]
impl WalletProvider for MemoryWallet {
    async fn request(&self, method: &str, _params: Value) -> Result<Value, ProviderError> {
        match method {
            "eth_requestAccounts" => {
                let mut state = self.state.write().await;
                if state.reject_requests {
                    return Err(ProviderError::UserRejected);
                }
                state.authorized = true;
                Ok(json!(state.accounts))
            }
            "eth_accounts" => {
                let state = self.state.read().await;
                if state.authorized {
                    Ok(json!(state.accounts))
                } else {
                    Ok(json!([]))
                }
            }
            "eth_chainId" => Ok(json!(to_quantity(self.state.read().await.chain_id))),
            other => Err(ProviderError::from_rpc(
                METHOD_NOT_FOUND_CODE,
                format!("the method {} does not exist/is not available", other),
                None,
            )),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: &str = "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1";

    #[tokio::test]
    async fn test_accounts_hidden_until_authorized() {
        let wallet = MemoryWallet::with_account(ACCOUNT, 1);
        assert!(wallet.accounts().await.unwrap().is_empty());

        let granted = wallet.request_accounts().await.unwrap();
        assert_eq!(granted, vec![ACCOUNT]);
        assert_eq!(wallet.accounts().await.unwrap(), vec![ACCOUNT]);
    }

    #[tokio::test]
    async fn test_rejection() {
        let wallet = MemoryWallet::with_account(ACCOUNT, 1);
        wallet.set_reject_requests(true).await;
        assert!(matches!(
            wallet.request_accounts().await,
            Err(ProviderError::UserRejected)
        ));
        assert!(!wallet.is_authorized().await);
    }

    #[tokio::test]
    async fn test_chain_id_is_decimal() {
        let wallet = MemoryWallet::with_account(ACCOUNT, 11155111);
        assert_eq!(wallet.chain_id().await.unwrap(), "11155111");
    }

    #[tokio::test]
    async fn test_switch_events() {
        let wallet = MemoryWallet::with_account(ACCOUNT, 1);
        wallet.authorize().await;
        let mut events = wallet.subscribe();

        wallet.switch_account("0xb2").await;
        wallet.switch_chain(5).await;

        assert_eq!(
            events.recv().await.unwrap(),
            ProviderEvent::AccountsChanged(vec!["0xb2".to_string(), ACCOUNT.to_string()])
        );
        assert_eq!(
            events.recv().await.unwrap(),
            ProviderEvent::ChainChanged("5".to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let wallet = MemoryWallet::with_account(ACCOUNT, 1);
        let err = wallet.request("eth_sign", json!([])).await.unwrap_err();
        assert!(err.is_method_not_found());
    }
}
