//! Wallet Provider Boundary
//!
//! The request/event surface a wallet exposes to the application, modelled
//! on EIP-1193: `request(method, params)` plus account/chain notifications.

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::broadcast;

/// EIP-1193 code for a request the user declined
pub const USER_REJECTED_CODE: i64 = 4001;

/// EIP-1193 code for a method the user has not authorized
pub const UNAUTHORIZED_CODE: i64 = 4100;

/// JSON-RPC code for an unknown method
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;

/// Notification emitted by a wallet provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The set of authorized accounts changed (first entry is active)
    AccountsChanged(Vec<String>),
    /// The active chain changed (decimal chain id)
    ChainChanged(String),
}

impl ProviderEvent {
    /// Event name as wallets publish it
    pub fn name(&self) -> &'static str {
        match self {
            ProviderEvent::AccountsChanged(_) => "accountsChanged",
            ProviderEvent::ChainChanged(_) => "chainChanged",
        }
    }
}

/// Errors raised at the wallet boundary
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("User rejected the request")]
    UserRejected,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("Wallet unavailable")]
    Unavailable,

    #[error("Request timeout")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Build an error from a JSON-RPC error object
    pub fn from_rpc(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        let message = message.into();
        match code {
            USER_REJECTED_CODE => ProviderError::UserRejected,
            UNAUTHORIZED_CODE => ProviderError::Unauthorized(message),
            _ => ProviderError::Rpc {
                code,
                message,
                data,
            },
        }
    }

    /// Whether the provider reported an unsupported method
    pub fn is_method_not_found(&self) -> bool {
        matches!(self, ProviderError::Rpc { code, .. } if *code == METHOD_NOT_FOUND_CODE)
    }
}

/// A wallet the application can talk to
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Send a raw request to the wallet
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Receive `accountsChanged` / `chainChanged` notifications.
    ///
    /// Dropping the receiver releases the subscription.
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;

    /// Ask the user to authorize accounts (may prompt)
    async fn request_accounts(&self) -> Result<Vec<String>, ProviderError> {
        let value = self.request("eth_requestAccounts", json!([])).await?;
        parse_accounts(value)
    }

    /// Accounts already authorized for this application (never prompts)
    async fn accounts(&self) -> Result<Vec<String>, ProviderError> {
        let value = self.request("eth_accounts", json!([])).await?;
        parse_accounts(value)
    }

    /// Accounts to sign with: the authorized ones, prompting only when
    /// none have been granted yet
    async fn signing_accounts(&self) -> Result<Vec<String>, ProviderError> {
        let accounts = self.accounts().await?;
        if !accounts.is_empty() {
            return Ok(accounts);
        }
        self.request_accounts().await
    }

    /// Active chain id as a decimal string
    async fn chain_id(&self) -> Result<String, ProviderError> {
        let value = self.request("eth_chainId", json!([])).await?;
        let hex = value
            .as_str()
            .ok_or_else(|| ProviderError::InvalidResponse(format!("chain id {}", value)))?;
        parse_quantity(hex).map(|id| id.to_string())
    }
}

/// Decode an account list response
pub fn parse_accounts(value: Value) -> Result<Vec<String>, ProviderError> {
    serde_json::from_value(value).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// Parse a hex quantity such as `0x2a`
pub fn parse_quantity(hex: &str) -> Result<u64, ProviderError> {
    let digits = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .ok_or_else(|| ProviderError::InvalidResponse(format!("not a hex quantity: {}", hex)))?;
    if digits.is_empty() {
        return Err(ProviderError::InvalidResponse("empty quantity".to_string()));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| ProviderError::InvalidResponse(format!("{}: {}", hex, e)))
}

/// Format a number as a hex quantity
pub fn to_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

/// Check the `0x` + 40 hex digits shape of an address
pub fn is_address(value: &str) -> bool {
    value.len() == 42
        && value.starts_with("0x")
        && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x1").unwrap(), 1);
        assert_eq!(parse_quantity("0xaa36a7").unwrap(), 11155111);
        assert!(parse_quantity("12").is_err());
        assert!(parse_quantity("0x").is_err());
        assert_eq!(to_quantity(255), "0xff");
    }

    #[test]
    fn test_error_codes() {
        assert!(matches!(
            ProviderError::from_rpc(4001, "User denied", None),
            ProviderError::UserRejected
        ));
        assert!(matches!(
            ProviderError::from_rpc(4100, "nope", None),
            ProviderError::Unauthorized(_)
        ));
        assert!(ProviderError::from_rpc(-32601, "method not found", None).is_method_not_found());
    }

    #[test]
    fn test_is_address() {
        assert!(is_address("0x8507bFBB94499baA164df9f283188F4dd7Ac39aF"));
        assert!(!is_address("0x1234"));
        assert!(!is_address("8507bFBB94499baA164df9f283188F4dd7Ac39aF00"));
    }

    #[test]
    fn test_parse_accounts() {
        let accounts = parse_accounts(json!(["0xabc"])).unwrap();
        assert_eq!(accounts, vec!["0xabc"]);
        assert!(parse_accounts(json!("oops")).is_err());
    }
}
