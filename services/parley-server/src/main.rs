//! Parley Server
//!
//! Runs the escrowed-conversation ledger behind the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # In-memory backend, authority key from the environment
//! PARLEY__ESCROW__AUTHORITY_PUBLIC_KEY=<hex> parley-server
//!
//! # Durable backend
//! parley-server --storage sled --storage-path ./data/parley
//!
//! # Explicit config file
//! parley-server --config /etc/parley/server.toml
//! ```

mod config;

use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::oneshot;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use parley_api::{create_router, ApiConfig, AppState};
use parley_crypto::RefundVerifier;
use parley_escrow::{
    EscrowBackend, EscrowLedger, EventBus, MemoryBackend, PurchaseGate, SledBackend,
};

use crate::config::{ServerConfig, StorageBackend};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Parley Server - escrowed conversations with signed refunds
#[derive(Parser, Debug)]
#[command(name = "parley-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "PARLEY_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(long, env = "PARLEY_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PARLEY_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PARLEY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "PARLEY_LOG_FORMAT")]
    log_format: Option<String>,

    /// Hex-encoded public key of the refund authority
    #[arg(long, env = "PARLEY_AUTHORITY_PUBLIC_KEY")]
    authority_public_key: Option<String>,

    /// Storage backend (memory, sled)
    #[arg(long, value_parser = parse_storage)]
    storage: Option<StorageBackend>,

    /// Database directory for the sled backend
    #[arg(long, env = "PARLEY_STORAGE_PATH")]
    storage_path: Option<std::path::PathBuf>,
}

fn parse_storage(value: &str) -> Result<StorageBackend, String> {
    match value {
        "memory" => Ok(StorageBackend::Memory),
        "sled" => Ok(StorageBackend::Sled),
        other => Err(format!("unknown storage backend {other:?}, expected memory or sled")),
    }
}

impl Args {
    /// Apply CLI overrides on top of the loaded configuration
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(key) = self.authority_public_key {
            config.escrow.authority_public_key = Some(key);
        }
        if let Some(storage) = self.storage {
            config.storage.backend = storage;
        }
        if let Some(path) = self.storage_path {
            config.storage.path = Some(path);
        }
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut server_config = ServerConfig::load(args.config.as_deref())?;
    args.apply(&mut server_config);

    init_logging(&server_config.logging)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Parley server");

    server_config.validate()?;

    let backend = init_backend(&server_config).await?;
    seed_genesis(&backend, &server_config).await?;

    let state = Arc::new(build_state(backend, &server_config)?);

    let api_config = ApiConfig {
        enable_cors: server_config.api.enable_cors,
        cors_origins: server_config.api.cors_origins.clone(),
        enable_tracing: server_config.api.enable_tracing,
    };
    let app = create_router(state, api_config);

    let addr = server_config.server.socket_addr()?;
    tracing::info!(
        host = %server_config.server.host,
        port = %server_config.server.port,
        contract = %server_config.escrow.contract_account,
        "Server listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let (signalled_tx, signalled_rx) = oneshot::channel();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = signalled_tx.send(());
    });
    serve_until_drained(
        server.into_future(),
        signalled_rx,
        server_config.server.shutdown_timeout(),
    )
    .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

// =============================================================================
// Initialization Functions
// =============================================================================

/// Initialize tracing/logging
fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => subscriber
            .with(fmt::layer().json().with_target(true))
            .try_init()?,
        _ => subscriber
            .with(fmt::layer().pretty().with_target(true))
            .try_init()?,
    }

    Ok(())
}

/// Open the configured storage backend
async fn init_backend(config: &ServerConfig) -> anyhow::Result<Arc<dyn EscrowBackend>> {
    let backend: Arc<dyn EscrowBackend> = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; state is lost on shutdown");
            Arc::new(MemoryBackend::new())
        }
        StorageBackend::Sled => {
            let path = config
                .storage
                .path
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("storage.path is required for sled"))?;
            Arc::new(SledBackend::open(path)?)
        }
    };

    tracing::info!(backend = backend.name(), "Storage backend ready");
    Ok(backend)
}

/// Mint configured balances, once per account and asset.
///
/// The backend remembers which pairs it has seeded, so restarting against a
/// durable store never mints again, even into an account that was drained.
async fn seed_genesis(
    backend: &Arc<dyn EscrowBackend>,
    config: &ServerConfig,
) -> anyhow::Result<()> {
    for entry in &config.genesis {
        match backend
            .mint_genesis(&entry.account, entry.asset, entry.amount)
            .await?
        {
            Some(balance) => tracing::info!(
                account = %entry.account,
                asset = %entry.asset,
                balance = %balance,
                "Genesis balance minted"
            ),
            None => tracing::debug!(
                account = %entry.account,
                asset = %entry.asset,
                "Genesis already applied"
            ),
        }
    }
    Ok(())
}

/// Wire the ledger, purchase gate and event bus over one backend
fn build_state(
    backend: Arc<dyn EscrowBackend>,
    config: &ServerConfig,
) -> anyhow::Result<AppState> {
    let verifier = RefundVerifier::new(config.escrow.authority_key()?);
    let policy = config.escrow.policy.clone();
    let events = EventBus::new();

    let ledger = EscrowLedger::new(backend.clone(), verifier, policy.clone(), events.clone());
    let gate = PurchaseGate::new(backend, policy, events);

    Ok(AppState::new(ledger, gate, config.escrow.contract()))
}

// =============================================================================
// Graceful Shutdown
// =============================================================================

/// Run `server` until it stops on its own, or until `signalled` fires and
/// in-flight requests drain. Draining is cut off after `timeout`.
async fn serve_until_drained<S>(
    server: S,
    signalled: oneshot::Receiver<()>,
    timeout: Duration,
) -> std::io::Result<()>
where
    S: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(server);

    tokio::select! {
        biased;
        result = &mut server => return result,
        _ = signalled => {}
    }

    tracing::info!(
        timeout_secs = timeout.as_secs(),
        "Waiting for in-flight requests to complete..."
    );

    match tokio::time::timeout(timeout, server).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "In-flight requests did not drain in time, shutting down"
            );
            Ok(())
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
