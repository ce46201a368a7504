//! Wallet Connector
//!
//! Turns provider calls into [`Session`] values. Failures never escape this
//! boundary: they become an error-carrying default session.

use std::sync::Arc;
use thiserror::Error;

use super::provider::{ProviderError, WalletProvider};
use super::session::Session;

/// Why a connection attempt failed
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("No wallet provider is installed")]
    NotInstalled,

    #[error("Wallet returned no accounts")]
    NoAccounts,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Connects the application to a wallet provider
#[derive(Clone)]
pub struct WalletConnector {
    provider: Option<Arc<dyn WalletProvider>>,
}

impl WalletConnector {
    /// Create a connector; `None` models a missing wallet
    pub fn new(provider: Option<Arc<dyn WalletProvider>>) -> Self {
        Self { provider }
    }

    /// Connector for an installed wallet
    pub fn with_provider(provider: Arc<dyn WalletProvider>) -> Self {
        Self::new(Some(provider))
    }

    /// The underlying provider, if any
    pub fn provider(&self) -> Option<&Arc<dyn WalletProvider>> {
        self.provider.as_ref()
    }

    /// Whether a wallet is present at all
    pub fn is_installed(&self) -> bool {
        self.provider.is_some()
    }

    /// Request account access, possibly prompting the user
    pub async fn connect(&self) -> Session {
        match self.try_connect().await {
            Ok(session) => {
                tracing::info!(
                    address = session.address.as_deref().unwrap_or_default(),
                    chain_id = session.chain_id.as_deref().unwrap_or_default(),
                    "Wallet connected"
                );
                session
            }
            Err(e) => {
                tracing::warn!(error = %e, "Error connecting to wallet");
                Session::failed(e.to_string())
            }
        }
    }

    async fn try_connect(&self) -> Result<Session, ConnectError> {
        let provider = self.provider.as_ref().ok_or(ConnectError::NotInstalled)?;

        let accounts = provider.request_accounts().await?;
        let address = accounts.into_iter().next().ok_or(ConnectError::NoAccounts)?;
        let chain_id = provider.chain_id().await?;

        Ok(Session::connected(address, chain_id))
    }

    /// Probe for an existing authorization without prompting
    pub async fn check_connection(&self) -> Session {
        let provider = match self.provider.as_ref() {
            Some(provider) => provider,
            None => return Session::default(),
        };

        let probe = async {
            let accounts = provider.accounts().await?;
            let address = match accounts.into_iter().next() {
                Some(address) => address,
                None => return Ok::<_, ProviderError>(Session::default()),
            };
            let chain_id = provider.chain_id().await?;
            Ok(Session::connected(address, chain_id))
        };

        match probe.await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Error checking wallet connection");
                Session::default()
            }
        }
    }

    /// Forget the connection locally; wallets cannot revoke from here
    pub fn disconnect(&self) -> Session {
        tracing::info!("Wallet disconnected");
        Session::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::MemoryWallet;

    const ACCOUNT: &str = "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1";

    #[tokio::test]
    async fn test_connect_without_provider() {
        let connector = WalletConnector::new(None);
        let session = connector.connect().await;
        assert!(!session.is_authenticated);
        assert_eq!(
            session.error.as_deref(),
            Some("No wallet provider is installed")
        );
    }

    #[tokio::test]
    async fn test_connect_populates_session() {
        let wallet = Arc::new(MemoryWallet::with_account(ACCOUNT, 1));
        let connector = WalletConnector::with_provider(wallet);

        let session = connector.connect().await;
        assert_eq!(session, Session::connected(ACCOUNT, "1"));
    }

    #[tokio::test]
    async fn test_connect_rejected() {
        let wallet = Arc::new(MemoryWallet::with_account(ACCOUNT, 1));
        wallet.set_reject_requests(true).await;
        let connector = WalletConnector::with_provider(wallet);

        let session = connector.connect().await;
        assert!(!session.is_authenticated);
        assert_eq!(session.error.as_deref(), Some("User rejected the request"));
    }

    #[tokio::test]
    async fn test_connect_no_accounts() {
        let wallet = Arc::new(MemoryWallet::new(Vec::new(), 1));
        let connector = WalletConnector::with_provider(wallet);

        let session = connector.connect().await;
        assert_eq!(session.error.as_deref(), Some("Wallet returned no accounts"));
    }

    #[tokio::test]
    async fn test_check_connection_does_not_prompt() {
        let wallet = Arc::new(MemoryWallet::with_account(ACCOUNT, 1));
        let connector = WalletConnector::with_provider(wallet.clone());

        assert_eq!(connector.check_connection().await, Session::default());
        assert!(!wallet.is_authorized().await);
    }

    #[tokio::test]
    async fn test_check_then_connect_agree() {
        let wallet = Arc::new(MemoryWallet::with_account(ACCOUNT, 5));
        let connector = WalletConnector::with_provider(wallet);

        let first = connector.connect().await;
        let checked = connector.check_connection().await;
        let again = connector.connect().await;

        assert_eq!(checked.address, first.address);
        assert_eq!(checked.chain_id, first.chain_id);
        assert_eq!(again.address, first.address);
        assert_eq!(again.chain_id, first.chain_id);
    }

    #[test]
    fn test_disconnect_is_default() {
        let connector = WalletConnector::new(None);
        assert_eq!(connector.disconnect(), Session::default());
    }
}
