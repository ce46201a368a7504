//! Session Manager
//!
//! Owns the wallet session and registration flag, publishes every change
//! through a `watch` channel, and keeps the ledger binding in step with the
//! wallet's account and chain.

use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::error::{SessionError, SessionResult};
use super::phase::{guard, AuthPhase, Navigation, Route};
use crate::ledger::{LedgerGateway, RegisterOutcome, RegistrationStatus};
use crate::wallet::{Session, WalletConnector};

/// Everything the navigation guard and views need to know
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub session: Session,
    pub registration: RegistrationStatus,
    pub is_registering: bool,
    pub is_checking_registration: bool,
}

impl AuthSnapshot {
    pub fn is_registered(&self) -> bool {
        self.registration.is_registered()
    }

    pub fn phase(&self) -> AuthPhase {
        if !self.session.is_authenticated {
            return if self.session.is_loading {
                AuthPhase::Connecting
            } else {
                AuthPhase::Anonymous
            };
        }

        if self.is_registered() {
            AuthPhase::Active
        } else if self.is_registering {
            AuthPhase::Registering
        } else if self.is_checking_registration || self.session.is_loading {
            AuthPhase::Connecting
        } else {
            AuthPhase::ConnectedUnregistered
        }
    }
}

/// Coordinates the wallet connector and the ledger gateway
pub struct SessionManager {
    connector: WalletConnector,
    gateway: Arc<LedgerGateway>,
    state: watch::Sender<AuthSnapshot>,
}

impl SessionManager {
    pub fn new(connector: WalletConnector, gateway: Arc<LedgerGateway>) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::default());
        Self {
            connector,
            gateway,
            state,
        }
    }

    pub fn gateway(&self) -> &Arc<LedgerGateway> {
        &self.gateway
    }

    pub fn connector(&self) -> &WalletConnector {
        &self.connector
    }

    /// Current state
    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn updates(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    /// Navigation decision for `route` in the current phase
    pub fn guard(&self, route: &Route) -> Navigation {
        guard(route, self.snapshot().phase())
    }

    /// Ask the wallet for access (may prompt), then check registration
    pub async fn connect(&self) -> AuthSnapshot {
        self.mark_loading();
        let session = self.connector.connect().await;
        self.apply_session(session).await
    }

    /// Pick up an existing authorization without prompting
    pub async fn check_connection(&self) -> AuthSnapshot {
        self.mark_loading();
        let session = self.connector.check_connection().await;
        self.apply_session(session).await
    }

    /// Reset to the default session and drop the ledger binding
    pub async fn disconnect(&self) -> AuthSnapshot {
        let session = self.connector.disconnect();
        self.gateway.reset().await;

        let snapshot = AuthSnapshot {
            session,
            ..AuthSnapshot::default()
        };
        self.state.send_replace(snapshot.clone());
        snapshot
    }

    /// Re-derive the registration flag for the connected account
    pub async fn refresh_registration(&self) -> RegistrationStatus {
        if !self.state.borrow().session.is_authenticated {
            self.state.send_modify(|s| {
                s.registration = RegistrationStatus::Unregistered;
                s.is_checking_registration = false;
            });
            return RegistrationStatus::Unregistered;
        }

        self.state.send_modify(|s| s.is_checking_registration = true);
        let status = self.gateway.registration_status().await;

        if let RegistrationStatus::Unknown { reason } = &status {
            tracing::warn!(reason = %reason, "Could not determine registration");
        }

        self.state.send_modify(|s| {
            s.registration = status.clone();
            s.is_checking_registration = false;
        });
        status
    }

    /// Register the connected account.
    ///
    /// Already-registered accounts get [`RegisterOutcome::AlreadyRegistered`]
    /// without a transaction being sent.
    pub async fn register_user(&self) -> SessionResult<RegisterOutcome> {
        let snapshot = self.snapshot();
        let address = snapshot.session.address.clone().ok_or(SessionError::NotConnected)?;
        if snapshot.is_registered() {
            return Ok(RegisterOutcome::AlreadyRegistered);
        }

        self.state.send_modify(|s| s.is_registering = true);
        let result = self.gateway.register().await;

        self.state.send_modify(|s| {
            s.is_registering = false;
            if result.is_ok() {
                s.registration = RegistrationStatus::Registered;
            }
        });

        match &result {
            Ok(outcome) => tracing::info!(address = %address, outcome = ?outcome, "Registration complete"),
            Err(e) => tracing::warn!(address = %address, error = %e, "Registration failed"),
        }

        Ok(result?)
    }

    /// Follow the wallet's account and chain changes.
    ///
    /// Each event drops the ledger binding and re-runs
    /// [`check_connection`](Self::check_connection). Returns `None` when no
    /// wallet is installed. Dropping the returned guard stops listening.
    pub fn watch(self: &Arc<Self>) -> Option<ProviderSubscription> {
        let provider = self.connector.provider()?;
        let events = provider.subscribe();
        let manager = Arc::downgrade(self);

        let handle = tokio::spawn(follow_events(manager, events));
        Some(ProviderSubscription { handle })
    }

    fn mark_loading(&self) {
        self.state.send_modify(|s| {
            s.session = s.session.clone().loading();
        });
    }

    async fn apply_session(&self, session: Session) -> AuthSnapshot {
        let changed = !same_account(&self.state.borrow().session, &session);
        if changed {
            self.gateway.reset().await;
        }

        let authenticated = session.is_authenticated;
        self.state.send_modify(|s| {
            s.session = session;
            if changed {
                s.registration = RegistrationStatus::Unregistered;
            }
            s.is_checking_registration = authenticated;
        });

        if authenticated {
            self.refresh_registration().await;
        } else {
            self.state.send_modify(|s| {
                s.registration = RegistrationStatus::Unregistered;
                s.is_checking_registration = false;
            });
        }

        self.snapshot()
    }
}

fn same_account(a: &Session, b: &Session) -> bool {
    let address_eq = match (&a.address, &b.address) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        (None, None) => true,
        _ => false,
    };
    address_eq && a.chain_id == b.chain_id
}

async fn follow_events(
    manager: Weak<SessionManager>,
    mut events: broadcast::Receiver<crate::wallet::ProviderEvent>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                tracing::info!(event = event.name(), "Wallet changed");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Missed wallet events, re-checking");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }

        let Some(strong) = manager.upgrade() else {
            break;
        };
        strong.gateway.reset().await;
        strong.check_connection().await;
    }
}

/// Live subscription to wallet events; listening stops when dropped
pub struct ProviderSubscription {
    handle: JoinHandle<()>,
}

impl ProviderSubscription {
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for ProviderSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::ledger::{ContractConnector, ContractError, LedgerContract, MemoryLedger};
    use crate::wallet::{MemoryWallet, ProviderError, ProviderEvent, WalletProvider};

    const ALICE: &str = "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1";
    const BOB: &str = "0xb2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2";
    const CONTRACT: &str = "0x8507bFBB94499baA164df9f283188F4dd7Ac39aF";

    fn manager_with(wallet: Arc<MemoryWallet>, ledger: &MemoryLedger) -> Arc<SessionManager> {
        let gateway = Arc::new(LedgerGateway::new(
            CONTRACT,
            Some(wallet.clone()),
            Arc::new(ledger.clone()),
        ));
        Arc::new(SessionManager::new(
            WalletConnector::with_provider(wallet),
            gateway,
        ))
    }

    /// Wallet that counts authorization prompts
    struct PromptCounter {
        wallet: MemoryWallet,
        prompts: AtomicUsize,
    }

    #[async_trait]
    impl WalletProvider for PromptCounter {
        async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
            if method == "eth_requestAccounts" {
                self.prompts.fetch_add(1, Ordering::SeqCst);
            }
            self.wallet.request(method, params).await
        }

        fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
            self.wallet.subscribe()
        }
    }

    struct CountingConnector {
        ledger: MemoryLedger,
        binds: AtomicUsize,
    }

    #[async_trait]
    impl ContractConnector for CountingConnector {
        async fn connect(
            &self,
            provider: Arc<dyn WalletProvider>,
            address: &str,
        ) -> Result<Arc<dyn LedgerContract>, ContractError> {
            self.binds.fetch_add(1, Ordering::SeqCst);
            self.ledger.connect(provider, address).await
        }
    }

    fn manager_on(
        provider: Arc<dyn WalletProvider>,
        connector: Arc<dyn ContractConnector>,
    ) -> Arc<SessionManager> {
        let gateway = Arc::new(LedgerGateway::new(
            CONTRACT,
            Some(provider.clone()),
            connector,
        ));
        Arc::new(SessionManager::new(
            WalletConnector::with_provider(provider),
            gateway,
        ))
    }

    async fn wait_until(
        rx: &mut watch::Receiver<AuthSnapshot>,
        done: impl Fn(&AuthSnapshot) -> bool,
    ) -> AuthSnapshot {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let snapshot = rx.borrow_and_update();
                    if done(&snapshot) {
                        return snapshot.clone();
                    }
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_phase_progression() {
        let wallet = Arc::new(MemoryWallet::with_account(ALICE, 1));
        let manager = manager_with(wallet, &MemoryLedger::new());

        assert_eq!(manager.snapshot().phase(), AuthPhase::Anonymous);

        let snapshot = manager.connect().await;
        assert_eq!(snapshot.phase(), AuthPhase::ConnectedUnregistered);
        assert_eq!(snapshot.session.address.as_deref(), Some(ALICE));
        assert_eq!(manager.guard(&Route::Notes), Navigation::Redirect(Route::Home));

        let outcome = manager.register_user().await.unwrap();
        assert!(matches!(outcome, RegisterOutcome::Registered(_)));
        assert_eq!(manager.snapshot().phase(), AuthPhase::Active);
        assert_eq!(manager.guard(&Route::Notes), Navigation::Allow);
        assert_eq!(
            manager.guard(&Route::Home),
            Navigation::Redirect(Route::Dashboard)
        );
    }

    #[tokio::test]
    async fn test_loading_is_connecting() {
        let snapshot = AuthSnapshot {
            session: Session::default().loading(),
            ..AuthSnapshot::default()
        };
        assert_eq!(snapshot.phase(), AuthPhase::Connecting);

        let snapshot = AuthSnapshot {
            session: Session::connected(ALICE, "1"),
            is_checking_registration: true,
            ..AuthSnapshot::default()
        };
        assert_eq!(snapshot.phase(), AuthPhase::Connecting);

        let snapshot = AuthSnapshot {
            session: Session::connected(ALICE, "1"),
            is_registering: true,
            ..AuthSnapshot::default()
        };
        assert_eq!(snapshot.phase(), AuthPhase::Registering);
    }

    #[tokio::test]
    async fn test_register_requires_connection() {
        let wallet = Arc::new(MemoryWallet::with_account(ALICE, 1));
        let manager = manager_with(wallet, &MemoryLedger::new());
        assert!(matches!(
            manager.register_user().await,
            Err(SessionError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_register_twice_is_noop() {
        let wallet = Arc::new(MemoryWallet::with_account(ALICE, 1));
        let ledger = MemoryLedger::new();
        let manager = manager_with(wallet, &ledger);

        manager.connect().await;
        manager.register_user().await.unwrap();
        let blocks = ledger.block_number().await;

        assert_eq!(
            manager.register_user().await.unwrap(),
            RegisterOutcome::AlreadyRegistered
        );
        assert_eq!(ledger.block_number().await, blocks);
    }

    #[tokio::test]
    async fn test_rejected_connect_keeps_error() {
        let wallet = Arc::new(MemoryWallet::with_account(ALICE, 1));
        wallet.set_reject_requests(true).await;
        let manager = manager_with(wallet, &MemoryLedger::new());

        let snapshot = manager.connect().await;
        assert!(!snapshot.session.is_authenticated);
        assert!(snapshot.session.error.is_some());
        assert_eq!(snapshot.phase(), AuthPhase::Anonymous);
    }

    #[tokio::test]
    async fn test_disconnect_resets() {
        let wallet = Arc::new(MemoryWallet::with_account(ALICE, 1));
        let manager = manager_with(wallet, &MemoryLedger::new());

        manager.connect().await;
        manager.register_user().await.unwrap();
        assert!(manager.gateway().is_initialized().await);

        let snapshot = manager.disconnect().await;
        assert_eq!(snapshot, AuthSnapshot::default());
        assert!(!snapshot.is_registered());
        assert!(!manager.gateway().is_initialized().await);
    }

    #[tokio::test]
    async fn test_unknown_registration_is_not_unregistered() {
        let wallet = Arc::new(MemoryWallet::with_account(ALICE, 1));
        let ledger = MemoryLedger::new();
        let manager = manager_with(wallet, &ledger);

        ledger.set_offline(true);
        let snapshot = manager.connect().await;
        assert!(matches!(
            snapshot.registration,
            RegistrationStatus::Unknown { .. }
        ));
        assert_eq!(snapshot.phase(), AuthPhase::ConnectedUnregistered);
    }

    #[tokio::test]
    async fn test_watch_follows_account_switch() {
        let wallet = Arc::new(MemoryWallet::new(vec![ALICE.to_string(), BOB.to_string()], 1));
        let ledger = MemoryLedger::new();
        let manager = manager_with(wallet.clone(), &ledger);

        manager.connect().await;
        manager.register_user().await.unwrap();
        assert_eq!(manager.gateway().signer().await.unwrap(), ALICE);

        let subscription = manager.watch().unwrap();
        assert!(subscription.is_active());
        let mut rx = manager.updates();

        wallet.switch_account(BOB).await;
        let snapshot = wait_until(&mut rx, |s| {
            s.session.address.as_deref() == Some(BOB) && !s.is_checking_registration
        })
        .await;

        // Bob never registered on this ledger
        assert_eq!(snapshot.registration, RegistrationStatus::Unregistered);
        assert_eq!(manager.gateway().signer().await.unwrap(), BOB);

        wallet.revoke().await;
        let snapshot = wait_until(&mut rx, |s| !s.session.is_authenticated).await;
        assert_eq!(snapshot.phase(), AuthPhase::Anonymous);
    }

    #[tokio::test]
    async fn test_check_connection_never_prompts() {
        let ledger = MemoryLedger::new();
        ledger.contract_for(ALICE).register().await.unwrap();

        let wallet = Arc::new(PromptCounter {
            wallet: MemoryWallet::with_account(ALICE, 1),
            prompts: AtomicUsize::new(0),
        });
        wallet.wallet.authorize().await;
        let manager = manager_on(wallet.clone(), Arc::new(ledger));

        let snapshot = manager.check_connection().await;
        assert!(snapshot.session.is_authenticated);
        assert_eq!(snapshot.registration, RegistrationStatus::Registered);
        assert_eq!(wallet.prompts.load(Ordering::SeqCst), 0);

        // A wallet that would decline prompts still reports the real status
        wallet.wallet.set_reject_requests(true).await;
        manager.gateway().reset().await;
        let snapshot = manager.check_connection().await;
        assert_eq!(snapshot.registration, RegistrationStatus::Registered);
        assert_eq!(wallet.prompts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_watch_follows_chain_switch() {
        let wallet = Arc::new(MemoryWallet::with_account(ALICE, 1));
        let connector = Arc::new(CountingConnector {
            ledger: MemoryLedger::new(),
            binds: AtomicUsize::new(0),
        });
        let manager = manager_on(wallet.clone(), connector.clone());

        manager.connect().await;
        manager.register_user().await.unwrap();
        assert_eq!(connector.binds.load(Ordering::SeqCst), 1);

        let _subscription = manager.watch().unwrap();
        let mut rx = manager.updates();

        wallet.switch_chain(5).await;
        let snapshot = wait_until(&mut rx, |s| {
            s.session.chain_id.as_deref() == Some("5") && !s.is_checking_registration
        })
        .await;

        assert_eq!(snapshot.session.address.as_deref(), Some(ALICE));
        assert_eq!(snapshot.registration, RegistrationStatus::Registered);
        assert!(manager.gateway().is_initialized().await);
        assert_eq!(connector.binds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dropping_subscription_releases_listener() {
        let wallet = Arc::new(MemoryWallet::with_account(ALICE, 1));
        let manager = manager_with(wallet.clone(), &MemoryLedger::new());

        let subscription = manager.watch().unwrap();
        assert_eq!(wallet.listener_count(), 1);
        drop(subscription);

        tokio::time::timeout(Duration::from_secs(5), async {
            while wallet.listener_count() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_watch_without_wallet() {
        let gateway = Arc::new(LedgerGateway::new(
            CONTRACT,
            None,
            Arc::new(MemoryLedger::new()),
        ));
        let manager = Arc::new(SessionManager::new(WalletConnector::new(None), gateway));
        assert!(manager.watch().is_none());
    }
}
