//! Server Configuration
//!
//! Layered configuration for the Parley server: optional file, then
//! `config/default` and `config/local`, then `PARLEY__*` environment
//! variables. CLI arguments are applied on top in `main`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use parley_crypto::AuthorityKey;
use parley_types::{AccountId, Amount, Asset, EscrowPolicy};
use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server binding configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Refund authority, custodial account and amounts
    #[serde(default)]
    pub escrow: EscrowSettings,

    /// Backend selection
    #[serde(default)]
    pub storage: StorageConfig,

    /// API configuration
    #[serde(default)]
    pub api: ApiSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Balances minted at start-up
    #[serde(default)]
    pub genesis: Vec<GenesisBalance>,
}

/// Server binding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Grace period for in-flight requests after a shutdown signal
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl ServerSettings {
    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Escrow settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowSettings {
    /// Hex-encoded Ed25519 public key of the refund authority
    #[serde(default)]
    pub authority_public_key: Option<String>,

    /// Account that holds escrowed tokens and sells them
    #[serde(default = "default_contract_account")]
    pub contract_account: String,

    #[serde(default)]
    pub policy: EscrowPolicy,
}

impl Default for EscrowSettings {
    fn default() -> Self {
        Self {
            authority_public_key: None,
            contract_account: default_contract_account(),
            policy: EscrowPolicy::default(),
        }
    }
}

impl EscrowSettings {
    /// Decode the configured authority key
    pub fn authority_key(&self) -> anyhow::Result<AuthorityKey> {
        let key_hex = self.authority_public_key.as_deref().context(
            "refund authority key is not set. Set PARLEY__ESCROW__AUTHORITY_PUBLIC_KEY or --authority-public-key",
        )?;
        AuthorityKey::from_hex(key_hex).context("refund authority key is not a valid Ed25519 public key")
    }

    pub fn contract(&self) -> AccountId {
        AccountId::from(self.contract_account.as_str())
    }
}

/// Storage backend kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sled,
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database directory, required for `sled`
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_true")]
    pub enable_tracing: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            enable_cors: true,
            cors_origins: default_cors_origins(),
            enable_tracing: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// A balance seeded into an empty account at start-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisBalance {
    pub account: AccountId,
    pub asset: Asset,
    pub amount: Amount,
}

// =============================================================================
// Default Functions
// =============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_shutdown_timeout() -> u64 {
    5
}

fn default_contract_account() -> String {
    "parley.escrow".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl ServerConfig {
    /// Load configuration from environment and optional config file
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        // Values stay strings so 128-bit amounts are not coerced to floats
        builder = builder.add_source(config::Environment::with_prefix("PARLEY").separator("__"));

        let config = builder.build()?;
        config
            .try_deserialize()
            .context("configuration does not match the expected layout")
    }

    /// Check the settings that cannot be defaulted
    pub fn validate(&self) -> anyhow::Result<()> {
        self.escrow.authority_key()?;

        if self.escrow.contract_account.is_empty() {
            anyhow::bail!("escrow.contract_account must not be empty");
        }

        if self.storage.backend == StorageBackend::Sled && self.storage.path.is_none() {
            anyhow::bail!("storage.path is required when storage.backend is \"sled\"");
        }

        match self.logging.format.as_str() {
            "json" | "pretty" => {}
            other => anyhow::bail!("unknown log format {other:?}, expected json or pretty"),
        }

        self.server.socket_addr()?;
        Ok(())
    }

    /// Configuration for local development
    pub fn development() -> Self {
        Self {
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
            ..Default::default()
        }
    }
}
