//! Ledger Gateway
//!
//! Notes and tasks stored by a smart contract, reached through the user's
//! wallet.
//!
//! ## Architecture
//!
//! - **LedgerContract**: signer-bound handle, one method per contract entry
//! - **RpcContract**: Solidity ABI over Ethereum JSON-RPC
//! - **MemoryLedger**: in-process contract with the same reverts
//! - **LedgerGateway**: lazy shared binding plus error classification

pub mod abi;
mod contract;
mod error;
mod gateway;
mod memory;
mod rpc;
mod types;

pub use contract::{ContractConnector, LedgerContract};
pub use error::{ContractError, GatewayError, GatewayResult};
pub use gateway::LedgerGateway;
pub use memory::{MemoryContract, MemoryLedger};
pub use rpc::{map_provider_error, ConfirmationConfig, RpcConnector, RpcContract};
pub use types::{
    EntityKind, Note, RegisterOutcome, RegistrationStatus, Task, TaskStatus, TxReceipt,
};
