//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ledger::ConfirmationConfig;
use crate::wallet::RpcConfig;

/// Contract deployment the application talks to unless told otherwise
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x8507bFBB94499baA164df9f283188F4dd7Ac39aF";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Wallet endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// JSON-RPC endpoint of the signing node
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// How often to poll for account and chain changes
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}

fn default_request_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_poll_interval() -> u64 {
    2_000
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            request_timeout_ms: default_request_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl WalletConfig {
    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig {
            url: self.rpc_url.clone(),
            request_timeout_ms: self.request_timeout_ms,
            poll_interval_ms: self.poll_interval_ms,
            ..RpcConfig::default()
        }
    }
}

/// Contract configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_contract_address")]
    pub contract_address: String,

    /// Delay between receipt polls while a write confirms
    #[serde(default = "default_confirmation_poll")]
    pub confirmation_poll_ms: u64,

    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
}

fn default_contract_address() -> String {
    DEFAULT_CONTRACT_ADDRESS.to_string()
}

fn default_confirmation_poll() -> u64 {
    1_000
}

fn default_confirmation_timeout() -> u64 {
    120
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            contract_address: default_contract_address(),
            confirmation_poll_ms: default_confirmation_poll(),
            confirmation_timeout_secs: default_confirmation_timeout(),
        }
    }
}

impl LedgerConfig {
    pub fn confirmation(&self) -> ConfirmationConfig {
        ConfirmationConfig {
            poll_interval_ms: self.confirmation_poll_ms,
            timeout_secs: self.confirmation_timeout_secs,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_first(&Self::search_paths())
    }

    /// Load the first of `paths` that exists.
    ///
    /// A file that exists but cannot be read or parsed is an error, not a
    /// reason to move on to the next location.
    pub fn load_first(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        match paths.iter().find(|path| path.exists()) {
            Some(path) => {
                let config = Self::load_with_env(path)?;
                tracing::info!("Loaded config from {:?}", path);
                Ok(config)
            }
            None => {
                tracing::info!("Using default config with environment overrides");
                Ok(Self::from_env())
            }
        }
    }

    /// Config file locations, most specific first
    pub fn search_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("forge").join("config.toml")),
            Some(PathBuf::from("/etc/forge/config.toml")),
            Some(PathBuf::from("./forge.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("FORGE_RPC_URL") {
            self.wallet.rpc_url = url;
        }
        if let Some(address) = lookup("FORGE_CONTRACT_ADDRESS") {
            self.ledger.contract_address = address;
        }
        if let Some(level) = lookup("FORGE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("FORGE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Forge Configuration
#
# Environment variables override these settings:
# - FORGE_RPC_URL
# - FORGE_CONTRACT_ADDRESS
# - FORGE_LOG_LEVEL
# - FORGE_LOG_FORMAT

[wallet]
# JSON-RPC endpoint of a node that holds (or forwards to) your signing key
rpc_url = "http://localhost:8545"

# Per-request timeout (ms)
request_timeout_ms = 10000

# How often to check for account or chain changes (ms)
poll_interval_ms = 2000

[ledger]
# Address of the deployed notes/tasks contract
contract_address = "0x8507bFBB94499baA164df9f283188F4dd7Ac39aF"

# Delay between receipt checks while a write confirms (ms)
confirmation_poll_ms = 1000

# Give up waiting for a confirmation after this long (seconds)
confirmation_timeout_secs = 120

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/forge/forge.log"
"#
    .to_string()
}
