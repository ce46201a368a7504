//! JSON-RPC Contract Handle
//!
//! Reads go through `eth_call`, writes through `eth_sendTransaction` signed
//! by the wallet, followed by `eth_getTransactionReceipt` polling until the
//! transaction is mined.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::abi::{self, methods, Token};
use super::contract::{ContractConnector, LedgerContract};
use super::error::ContractError;
use super::types::{Note, Task, TaskStatus, TxReceipt};
use crate::wallet::{is_address, parse_quantity, ProviderError, WalletProvider};

/// How long to wait for transactions to be mined
#[derive(Debug, Clone)]
pub struct ConfirmationConfig {
    /// Delay between receipt polls in milliseconds
    pub poll_interval_ms: u64,
    /// Give up after this many seconds
    pub timeout_secs: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            timeout_secs: 120,
        }
    }
}

/// Builds [`RpcContract`] handles
#[derive(Debug, Clone, Default)]
pub struct RpcConnector {
    confirmation: ConfirmationConfig,
}

impl RpcConnector {
    pub fn new(confirmation: ConfirmationConfig) -> Self {
        Self { confirmation }
    }
}

#[async_trait]
impl ContractConnector for RpcConnector {
    async fn connect(
        &self,
        provider: Arc<dyn WalletProvider>,
        address: &str,
    ) -> Result<Arc<dyn LedgerContract>, ContractError> {
        if !is_address(address) {
            return Err(ContractError::InvalidAddress(address.to_string()));
        }

        let signer = provider
            .signing_accounts()
            .await
            .map_err(map_provider_error)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ContractError::Provider(ProviderError::Unauthorized(
                    "no account available for signing".to_string(),
                ))
            })?;

        Ok(Arc::new(RpcContract {
            provider,
            address: address.to_string(),
            signer,
            confirmation: self.confirmation.clone(),
        }))
    }
}

/// Contract handle speaking Ethereum JSON-RPC through a wallet provider
pub struct RpcContract {
    provider: Arc<dyn WalletProvider>,
    address: String,
    signer: String,
    confirmation: ConfirmationConfig,
}

impl RpcContract {
    /// Run a read-only call and return the raw reply
    async fn call(&self, signature: &str, args: &[Token]) -> Result<Vec<u8>, ContractError> {
        let data = abi::encode_call(signature, args);
        let params = json!([
            { "from": self.signer, "to": self.address, "data": abi::to_hex(&data) },
            "latest"
        ]);

        tracing::debug!(method = signature, "eth_call");

        let result = self
            .provider
            .request("eth_call", params)
            .await
            .map_err(map_provider_error)?;
        let hex = result
            .as_str()
            .ok_or_else(|| ContractError::Decode(format!("eth_call returned {}", result)))?;
        let bytes = abi::from_hex(hex)?;

        // Some nodes hand revert payloads back as a normal result
        if let Some(reason) = abi::decode_revert_reason(&bytes) {
            return Err(ContractError::Reverted(reason));
        }
        if bytes.is_empty() {
            return Err(ContractError::Decode(format!(
                "empty reply, is a contract deployed at {}?",
                self.address
            )));
        }

        Ok(bytes)
    }

    /// Submit a transaction and wait until it is mined
    async fn transact(&self, signature: &str, args: &[Token]) -> Result<TxReceipt, ContractError> {
        let data = abi::encode_call(signature, args);
        let params = json!([{ "from": self.signer, "to": self.address, "data": abi::to_hex(&data) }]);

        let value = self
            .provider
            .request("eth_sendTransaction", params)
            .await
            .map_err(map_provider_error)?;
        let hash = value
            .as_str()
            .ok_or_else(|| ContractError::Decode(format!("transaction hash {}", value)))?
            .to_string();

        tracing::info!(method = signature, tx_hash = %hash, "Transaction submitted");

        let receipt = self.wait_for_receipt(&hash).await?;

        tracing::info!(
            method = signature,
            tx_hash = %hash,
            block = receipt.block_number.unwrap_or_default(),
            "Transaction confirmed"
        );

        Ok(receipt)
    }

    async fn wait_for_receipt(&self, hash: &str) -> Result<TxReceipt, ContractError> {
        let deadline = Instant::now() + Duration::from_secs(self.confirmation.timeout_secs);
        let interval = Duration::from_millis(self.confirmation.poll_interval_ms.max(1));

        loop {
            let value = self
                .provider
                .request("eth_getTransactionReceipt", json!([hash]))
                .await
                .map_err(map_provider_error)?;

            if !value.is_null() {
                let receipt: RpcReceipt = serde_json::from_value(value)
                    .map_err(|e| ContractError::Decode(format!("receipt: {}", e)))?;
                return receipt.into_receipt(hash);
            }

            if Instant::now() >= deadline {
                return Err(ContractError::ConfirmationTimeout(hash.to_string()));
            }

            tokio::time::sleep(interval).await;
        }
    }
}

#[async_trait]
impl LedgerContract for RpcContract {
    fn signer(&self) -> &str {
        &self.signer
    }

    fn address(&self) -> &str {
        &self.address
    }

    async fn register(&self) -> Result<TxReceipt, ContractError> {
        self.transact(methods::REGISTER, &[]).await
    }

    async fn create_note(
        &self,
        id: &str,
        title: &str,
        content: &str,
    ) -> Result<TxReceipt, ContractError> {
        self.transact(
            methods::CREATE_NOTE,
            &[Token::string(id), Token::string(title), Token::string(content)],
        )
        .await
    }

    async fn update_note(
        &self,
        id: &str,
        title: &str,
        content: &str,
    ) -> Result<TxReceipt, ContractError> {
        self.transact(
            methods::UPDATE_NOTE,
            &[Token::string(id), Token::string(title), Token::string(content)],
        )
        .await
    }

    async fn add_attachment_to_note(
        &self,
        note_id: &str,
        cid: &str,
    ) -> Result<TxReceipt, ContractError> {
        self.transact(
            methods::ADD_ATTACHMENT_TO_NOTE,
            &[Token::string(note_id), Token::string(cid)],
        )
        .await
    }

    async fn delete_note(&self, id: &str) -> Result<TxReceipt, ContractError> {
        self.transact(methods::DELETE_NOTE, &[Token::string(id)]).await
    }

    async fn get_note_ids(&self) -> Result<Vec<String>, ContractError> {
        let reply = self.call(methods::GET_NOTE_IDS, &[]).await?;
        abi::decode_string_array(&reply)
    }

    async fn get_note(&self, id: &str) -> Result<Note, ContractError> {
        let reply = self.call(methods::GET_NOTE, &[Token::string(id)]).await?;
        abi::decode_note(&reply)
    }

    async fn create_task(
        &self,
        id: &str,
        title: &str,
        description: &str,
        status: TaskStatus,
    ) -> Result<TxReceipt, ContractError> {
        self.transact(
            methods::CREATE_TASK,
            &[
                Token::string(id),
                Token::string(title),
                Token::string(description),
                Token::string(status.as_str()),
            ],
        )
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
        self.transact(
            methods::UPDATE_TASK,
            &[
                Token::string(id),
                Token::string(title),
                Token::string(description),
                Token::Bool(completed),
                Token::string(status.as_str()),
            ],
        )
        .await
    }

    async fn delete_task(&self, id: &str) -> Result<TxReceipt, ContractError> {
        self.transact(methods::DELETE_TASK, &[Token::string(id)]).await
    }

    async fn get_task_ids(&self) -> Result<Vec<String>, ContractError> {
        let reply = self.call(methods::GET_TASK_IDS, &[]).await?;
        abi::decode_string_array(&reply)
    }

    async fn get_task(&self, id: &str) -> Result<Task, ContractError> {
        let reply = self.call(methods::GET_TASK, &[Token::string(id)]).await?;
        abi::decode_task(&reply)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
}

impl RpcReceipt {
    fn into_receipt(self, hash: &str) -> Result<TxReceipt, ContractError> {
        let block_number = self
            .block_number
            .as_deref()
            .map(parse_quantity)
            .transpose()?;

        match self.status.as_deref() {
            Some("0x0") => Err(ContractError::Reverted(format!(
                "transaction {} reverted",
                hash
            ))),
            _ => Ok(TxReceipt {
                tx_hash: hash.to_string(),
                block_number,
            }),
        }
    }
}

/// Translate wallet errors into contract terms, extracting revert reasons
pub fn map_provider_error(error: ProviderError) -> ContractError {
    match error {
        ProviderError::UserRejected => {
            ContractError::Rejected("user denied transaction signature".to_string())
        }
        ProviderError::Rpc {
            code,
            message,
            data,
        } => {
            if let Some(reason) = data
                .as_ref()
                .and_then(revert_payload)
                .and_then(|bytes| abi::decode_revert_reason(&bytes))
            {
                return ContractError::Reverted(reason);
            }

            if code == 3 || message.to_lowercase().contains("revert") {
                let reason = match message.split_once("reverted:") {
                    Some((_, reason)) => reason.trim().to_string(),
                    None => message.clone(),
                };
                return ContractError::Reverted(reason);
            }

            ContractError::Provider(ProviderError::Rpc {
                code,
                message,
                data,
            })
        }
        other => ContractError::Provider(other),
    }
}

fn revert_payload(data: &Value) -> Option<Vec<u8>> {
    let hex = match data {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("data")?.as_str()?,
        _ => return None,
    };
    abi::from_hex(hex).ok()
}
