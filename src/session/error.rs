//! Session errors

use thiserror::Error;

use crate::ledger::GatewayError;

#[derive(Error, Debug)]
pub enum SessionError {
    /// No wallet account is connected
    #[error("Wallet is not connected")]
    NotConnected,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
