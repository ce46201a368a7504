//! JSON-RPC Wallet Provider
//!
//! Talks to a wallet or node over JSON-RPC 2.0 on HTTP. Account and chain
//! change notifications are derived by polling, since plain HTTP has no push.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use super::provider::{parse_accounts, parse_quantity, ProviderError, ProviderEvent, WalletProvider};

/// Configuration for the JSON-RPC provider
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Endpoint URL (e.g., "http://localhost:8545")
    pub url: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// How often to poll accounts/chain while someone is subscribed
    pub poll_interval_ms: u64,
    /// Capacity of the event channel
    pub event_capacity: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8545".to_string(),
            request_timeout_ms: 10_000,
            poll_interval_ms: 2_000,
            event_capacity: 64,
        }
    }
}

/// Wallet provider backed by a JSON-RPC endpoint
pub struct JsonRpcProvider {
    transport: Arc<RpcTransport>,
    events: broadcast::Sender<ProviderEvent>,
    watching: Arc<AtomicBool>,
    config: RpcConfig,
}

struct RpcTransport {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcProvider {
    /// Create a provider for the configured endpoint
    pub fn new(config: RpcConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Ok(Self {
            transport: Arc::new(RpcTransport {
                client,
                url: config.url.clone(),
                next_id: AtomicU64::new(1),
            }),
            events,
            watching: Arc::new(AtomicBool::new(false)),
            config,
        })
    }

    /// Get the current configuration
    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Whether the account/chain poller is running
    pub fn is_watching(&self) -> bool {
        self.watching.load(Ordering::SeqCst)
    }

    /// Start the poller unless it is already running.
    ///
    /// The poller exits once the last event receiver has been dropped.
    fn ensure_watching(&self) {
        if self.watching.swap(true, Ordering::SeqCst) {
            return;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("No async runtime, provider events will not be polled");
                self.watching.store(false, Ordering::SeqCst);
                return;
            }
        };

        let transport = Arc::clone(&self.transport);
        let events = self.events.clone();
        let watching = Arc::clone(&self.watching);
        let interval = Duration::from_millis(self.config.poll_interval_ms.max(1));

        handle.spawn(async move {
            tracing::debug!(url = %transport.url, "Starting wallet event poller");

            let mut last_accounts = transport.snapshot_accounts().await;
            let mut last_chain = transport.snapshot_chain().await;
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                if events.receiver_count() == 0 {
                    watching.store(false, Ordering::SeqCst);
                    // A subscriber may have arrived between the check and the store
                    if events.receiver_count() > 0 && !watching.swap(true, Ordering::SeqCst) {
                        continue;
                    }
                    break;
                }

                if let Some(accounts) = transport.snapshot_accounts().await {
                    if last_accounts.as_ref() != Some(&accounts) {
                        tracing::info!(accounts = ?accounts, "Wallet accounts changed");
                        let _ = events.send(ProviderEvent::AccountsChanged(accounts.clone()));
                        last_accounts = Some(accounts);
                    }
                }

                if let Some(chain) = transport.snapshot_chain().await {
                    if last_chain.as_ref() != Some(&chain) {
                        tracing::info!(chain_id = %chain, "Wallet chain changed");
                        let _ = events.send(ProviderEvent::ChainChanged(chain.clone()));
                        last_chain = Some(chain);
                    }
                }
            }

            tracing::debug!("Wallet event poller stopped");
        });
    }
}

impl RpcTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        tracing::trace!(method, id = body.id, "JSON-RPC request");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else if e.is_connect() {
                    ProviderError::Unavailable
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Transport(format!("HTTP {}: {}", status, text)));
        }

        let payload: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        payload.into_result()
    }

    async fn snapshot_accounts(&self) -> Option<Vec<String>> {
        match self.call("eth_accounts", json!([])).await.and_then(parse_accounts) {
            Ok(accounts) => Some(accounts),
            Err(e) => {
                tracing::debug!(error = %e, "Account poll failed");
                None
            }
        }
    }

    async fn snapshot_chain(&self) -> Option<String> {
        let value = match self.call("eth_chainId", json!([])).await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "Chain poll failed");
                return None;
            }
        };
        value
            .as_str()
            .and_then(|hex| parse_quantity(hex).ok())
            .map(|id| id.to_string())
    }
}

#[async_trait]
impl WalletProvider for JsonRpcProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        match self.transport.call(method, params.clone()).await {
            // Plain nodes have no authorization prompt; their unlocked accounts are the grant
            Err(e) if method == "eth_requestAccounts" && e.is_method_not_found() => {
                tracing::debug!("eth_requestAccounts unsupported, falling back to eth_accounts");
                self.transport.call("eth_accounts", params).await
            }
            other => other,
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        let receiver = self.events.subscribe();
        self.ensure_watching();
        receiver
    }
}

// ============================================
// Request/Response DTOs
// ============================================

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl JsonRpcResponse {
    fn into_result(self) -> Result<Value, ProviderError> {
        if let Some(error) = self.error {
            return Err(ProviderError::from_rpc(error.code, error.message, error.data));
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}
