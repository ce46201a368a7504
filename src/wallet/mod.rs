//! Wallet Connector
//!
//! Everything between the application and the user's wallet.
//!
//! ## Architecture
//!
//! - **WalletProvider**: EIP-1193 style request/event surface
//! - **JsonRpcProvider**: provider over JSON-RPC on HTTP, with polled events
//! - **MemoryWallet**: in-process provider for tests and demos
//! - **WalletConnector**: turns provider calls into [`Session`] values

mod connector;
mod memory;
mod provider;
mod rpc;
mod session;

pub use connector::{ConnectError, WalletConnector};
pub use memory::MemoryWallet;
pub use provider::{
    is_address, parse_accounts, parse_quantity, to_quantity, ProviderError, ProviderEvent,
    WalletProvider, METHOD_NOT_FOUND_CODE, UNAUTHORIZED_CODE, USER_REJECTED_CODE,
};
pub use rpc::{JsonRpcProvider, RpcConfig};
pub use session::Session;
