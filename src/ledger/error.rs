//! Ledger error types
//!
//! `ContractError` is what a contract handle reports; `GatewayError` is the
//! application-facing taxonomy the gateway classifies it into.

use thiserror::Error;

use super::types::EntityKind;
use crate::wallet::ProviderError;

/// Errors reported by a contract handle
#[derive(Error, Debug, Clone)]
pub enum ContractError {
    /// The signer declined the transaction
    #[error("Transaction rejected: {0}")]
    Rejected(String),

    /// The contract reverted, with its reason string
    #[error("Execution reverted: {0}")]
    Reverted(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Transaction {0} was not confirmed in time")]
    ConfirmationTimeout(String),
}

impl ContractError {
    /// Revert reason, if the contract reverted
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            ContractError::Reverted(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Errors surfaced to gateway callers
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No wallet provider is present
    #[error("No wallet provider is installed")]
    NotInstalled,

    /// Provider present but the contract handle could not be built
    #[error("Failed to initialize contract: {0}")]
    InitFailed(String),

    /// The user declined to sign
    #[error("Transaction rejected: {0}")]
    TransactionRejected(String),

    /// The ledger reverted or never confirmed the transaction
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Account is not registered")]
    NotRegistered,

    /// Transport-level failure talking to the ledger
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid ledger response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Classify a contract error; `target` names the entity an id-addressed call touched
    pub fn classify(error: ContractError, target: Option<(EntityKind, &str)>) -> Self {
        match error {
            ContractError::Rejected(reason) => GatewayError::TransactionRejected(reason),
            ContractError::Provider(ProviderError::UserRejected) => {
                GatewayError::TransactionRejected("user denied the request".to_string())
            }
            ContractError::Reverted(reason) => {
                let lower = reason.to_lowercase();
                if lower.contains("not registered") {
                    return GatewayError::NotRegistered;
                }
                match target {
                    Some((kind, id))
                        if lower.contains("not found") || lower.contains("does not exist") =>
                    {
                        GatewayError::NotFound {
                            kind,
                            id: id.to_string(),
                        }
                    }
                    _ => GatewayError::TransactionFailed(reason),
                }
            }
            ContractError::ConfirmationTimeout(hash) => GatewayError::TransactionFailed(format!(
                "transaction {} was not confirmed in time",
                hash
            )),
            ContractError::Provider(e) => GatewayError::Unavailable(e.to_string()),
            ContractError::Decode(msg) => GatewayError::Decode(msg),
            ContractError::InvalidAddress(address) => {
                GatewayError::InitFailed(format!("invalid address {}", address))
            }
        }
    }

    /// Whether the failure is one the user can act on and retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::TransactionRejected(_)
                | GatewayError::TransactionFailed(_)
                | GatewayError::Unavailable(_)
                | GatewayError::InitFailed(_)
        )
    }
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_needs_target() {
        let err = GatewayError::classify(
            ContractError::Reverted("Note not found".to_string()),
            Some((EntityKind::Note, "n1")),
        );
        assert!(matches!(err, GatewayError::NotFound { kind: EntityKind::Note, ref id } if id == "n1"));
        assert_eq!(err.to_string(), "Note not found: n1");

        let err = GatewayError::classify(ContractError::Reverted("Note not found".to_string()), None);
        assert!(matches!(err, GatewayError::TransactionFailed(_)));
    }

    #[test]
    fn test_not_registered() {
        let err = GatewayError::classify(
            ContractError::Reverted("User not registered".to_string()),
            Some((EntityKind::Task, "t1")),
        );
        assert!(matches!(err, GatewayError::NotRegistered));
    }

    #[test]
    fn test_rejections() {
        let err = GatewayError::classify(ContractError::Provider(ProviderError::UserRejected), None);
        assert!(matches!(err, GatewayError::TransactionRejected(_)));

        let err = GatewayError::classify(ContractError::Rejected("denied".to_string()), None);
        assert!(err.is_transient());
    }

    #[test]
    fn test_transport_is_unavailable() {
        let err = GatewayError::classify(ContractError::Provider(ProviderError::Timeout), None);
        assert!(matches!(err, GatewayError::Unavailable(_)));
        assert!(!GatewayError::NotInstalled.is_transient());
    }
}
