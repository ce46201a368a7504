//! Wallet session record

use serde::{Deserialize, Serialize};

/// Current wallet connection and chain identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub is_authenticated: bool,
    pub address: Option<String>,
    /// Decimal chain id
    pub chain_id: Option<String>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl Session {
    /// An authenticated session for `address` on `chain_id`
    pub fn connected(address: impl Into<String>, chain_id: impl Into<String>) -> Self {
        Self {
            is_authenticated: true,
            address: Some(address.into()),
            chain_id: Some(chain_id.into()),
            is_loading: false,
            error: None,
        }
    }

    /// The default session carrying an error message
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Same session, flagged as loading
    pub fn loading(self) -> Self {
        Self {
            is_loading: true,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unauthenticated() {
        let session = Session::default();
        assert!(!session.is_authenticated);
        assert!(session.address.is_none());
        assert!(session.chain_id.is_none());
        assert!(!session.is_loading);
        assert!(session.error.is_none());
    }

    #[test]
    fn test_failed_keeps_defaults() {
        let session = Session::failed("No wallet provider is installed");
        assert!(!session.is_authenticated);
        assert_eq!(session.error.as_deref(), Some("No wallet provider is installed"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_string(&Session::connected("0xa1", "1")).unwrap();
        assert!(json.contains("\"isAuthenticated\":true"));
        assert!(json.contains("\"chainId\":\"1\""));
    }
}
