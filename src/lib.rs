//! # Forge
//!
//! Notes and tasks kept in a smart contract, reached through the user's
//! wallet.
//!
//! ## Features
//!
//! - **Wallet connection**: EIP-1193 style providers over JSON-RPC, with
//!   account and chain change notifications
//! - **Ledger gateway**: lazily bound contract handle with confirmed writes
//!   and a typed error taxonomy
//! - **Session state**: connect and register phases with a single
//!   navigation guard
//! - **Workspace**: validated note/task operations, search and a kanban board
//!
//! ## Modules
//!
//! - [`wallet`]: wallet providers and the connector
//! - [`ledger`]: contract ABI, handles and the gateway
//! - [`session`]: session manager, phases and routes
//! - [`workspace`]: page-level note and task operations
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use forge::ledger::{LedgerGateway, RpcConnector};
//! use forge::session::SessionManager;
//! use forge::wallet::{JsonRpcProvider, RpcConfig, WalletConnector};
//! use forge::workspace::{NoteDraft, Workspace};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let wallet = Arc::new(JsonRpcProvider::new(RpcConfig::default())?);
//!     let gateway = Arc::new(LedgerGateway::new(
//!         forge::config::DEFAULT_CONTRACT_ADDRESS,
//!         Some(wallet.clone()),
//!         Arc::new(RpcConnector::default()),
//!     ));
//!
//!     // Connect and register once
//!     let session = SessionManager::new(WalletConnector::with_provider(wallet), gateway.clone());
//!     session.connect().await;
//!     session.register_user().await?;
//!
//!     // Write a note and read everything back
//!     let workspace = Workspace::new(gateway);
//!     workspace.create_note(&NoteDraft::new("Hello", "World")).await?;
//!     for note in workspace.list_notes().await? {
//!         println!("{}: {}", note.id, note.title);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod ledger;
pub mod logging;
pub mod session;
pub mod wallet;
pub mod workspace;

// Re-export top-level types for convenience
pub use wallet::{
    JsonRpcProvider, MemoryWallet, ProviderError, ProviderEvent, RpcConfig, Session,
    WalletConnector, WalletProvider,
};

pub use ledger::{
    ContractConnector, ContractError, GatewayError, GatewayResult, LedgerContract, LedgerGateway,
    MemoryLedger, Note, RegisterOutcome, RegistrationStatus, RpcConnector, Task, TaskStatus,
    TxReceipt,
};

pub use session::{
    AuthPhase, AuthSnapshot, Navigation, ProviderSubscription, Route, SessionError,
    SessionManager,
};

pub use workspace::{
    DashboardSummary, KanbanBoard, Loaded, NoteDraft, TaskDraft, Workspace, WorkspaceError,
    WorkspaceResult,
};

pub use config::{Config, ConfigError, LedgerConfig, LoggingConfig, WalletConfig};
