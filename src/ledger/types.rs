//! Ledger entity types
//!
//! - `Note` and `Task`: the entities the contract stores per account
//! - `TxReceipt`: proof that a write was confirmed
//! - `RegisterOutcome` and `RegistrationStatus`: registration results

use serde::{Deserialize, Serialize};

/// A note owned by the calling account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Caller-generated unique id
    pub id: String,
    pub title: String,
    pub content: String,
    /// Content identifiers of attached files
    #[serde(default)]
    pub attachments: Vec<String>,
    /// Unix timestamp in seconds
    pub created_at: i64,
    /// Unix timestamp in seconds
    pub updated_at: i64,
}

/// A task owned by the calling account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub status: TaskStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Kanban column a task sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "todo")]
    Todo,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "done")]
    Done,
}

impl TaskStatus {
    /// All statuses in board order
    pub fn all() -> &'static [TaskStatus] {
        &[TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done]
    }

    /// Wire representation stored on the ledger
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "in-progress" | "inprogress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

/// Entity type, for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Note,
    Task,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Note => write!(f, "Note"),
            EntityKind::Task => write!(f, "Task"),
        }
    }
}

/// A confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
}

/// Result of a registration request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// A registration transaction was submitted and confirmed
    Registered(TxReceipt),
    /// The account was registered before; nothing was submitted
    AlreadyRegistered,
}

impl RegisterOutcome {
    /// Receipt of the submitted transaction, `None` when nothing was sent
    pub fn receipt(&self) -> Option<&TxReceipt> {
        match self {
            RegisterOutcome::Registered(receipt) => Some(receipt),
            RegisterOutcome::AlreadyRegistered => None,
        }
    }
}

/// Whether an account may use the entity operations
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RegistrationStatus {
    Registered,
    #[default]
    Unregistered,
    /// The ledger could not be asked (connectivity, misconfiguration)
    Unknown { reason: String },
}

impl RegistrationStatus {
    pub fn is_registered(&self) -> bool {
        matches!(self, RegistrationStatus::Registered)
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationStatus::Registered => write!(f, "registered"),
            RegistrationStatus::Unregistered => write!(f, "not registered"),
            RegistrationStatus::Unknown { reason } => write!(f, "unknown ({})", reason),
        }
    }
}
