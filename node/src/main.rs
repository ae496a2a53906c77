// Copyright (c) 2026 Meridian Ledger Contributors. MIT License.
// See LICENSE for details.

//! # Meridian Sentinel Node
//!
//! Entry point for the `meridian-sentinel-node` binary. Parses CLI
//! arguments, initializes logging, wires the controller to its coordinator
//! and peer clients, and runs until a shutdown signal arrives.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — start the sentinel node
//! - `init`    — initialize the data directory and generate a signing key
//! - `version` — print build version information

mod cli;
mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;

use meridian_sentinel::attestation::{PeerClient, UniformSampler};
use meridian_sentinel::config::SentinelConfig;
use meridian_sentinel::controller::Controller;
use meridian_sentinel::crypto::Keypair;
use meridian_sentinel::net::{TcpCoordinatorClient, TcpPeerClient};

use cli::{Commands, SentinelNodeCli};
use logging::LogFormat;

/// Name of the signing key file inside the data directory.
const KEY_FILE: &str = "sentinel.key";

/// Name of the configuration file inside the data directory.
const CONFIG_FILE: &str = "config.json";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = SentinelNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the sentinel: connects to the coordinator and peers, begins
/// listening for requests, and runs the batch timer until shutdown.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "meridian_sentinel_node=info,meridian_sentinel=info",
        LogFormat::from_str_lossy(&args.log_format),
    );

    let config = load_config(&args)?;
    if config.coordinator_endpoint.is_empty() {
        bail!("no coordinator endpoint configured; set it in the config file or pass --coordinator");
    }

    let keypair = load_keypair(&args, &config)?;

    tracing::info!(
        sentinel_id = config.sentinel_id,
        listen = config.listen_addr.as_deref().unwrap_or("<disabled>"),
        coordinator = %config.coordinator_endpoint,
        peers = config.peer_endpoints.len(),
        public_key = %keypair.public_key_hex(),
        "starting meridian-sentinel-node"
    );

    let coordinator = Arc::new(TcpCoordinatorClient::new(config.coordinator_endpoint.clone()));
    let peers: Vec<Arc<dyn PeerClient>> = config
        .peer_endpoints
        .iter()
        .map(|endpoint| Arc::new(TcpPeerClient::new(endpoint.clone())) as Arc<dyn PeerClient>)
        .collect();

    let controller = Controller::new(
        &config,
        keypair,
        coordinator,
        peers,
        Box::new(UniformSampler),
    );

    if !Arc::clone(&controller).init().await {
        bail!("sentinel initialization failed; check coordinator and peer endpoints");
    }
    controller.batch_start_timing();

    shutdown_signal().await;
    tracing::info!("shutdown signal received, draining in-flight requests");

    controller.batch_stop_timing();
    controller.shutdown();
    tracing::info!("meridian-sentinel-node stopped");
    Ok(())
}

/// Resolves the configuration file path and loads it, then applies CLI
/// overrides on top.
fn load_config(args: &cli::RunArgs) -> Result<SentinelConfig> {
    let path = args
        .config
        .clone()
        .unwrap_or_else(|| expand_home(&args.data_dir).join(CONFIG_FILE));

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let mut config: SentinelConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;

    if let Some(listen) = &args.listen {
        config.listen_addr = Some(listen.clone());
    }
    if let Some(coordinator) = &args.coordinator {
        config.coordinator_endpoint = coordinator.clone();
    }
    if !args.peers.is_empty() {
        config.peer_endpoints = args.peers.clone();
    }

    Ok(config)
}

/// Key resolution order: CLI flag, config file, key file in the data
/// directory.
fn load_keypair(args: &cli::RunArgs, config: &SentinelConfig) -> Result<Keypair> {
    let hex_key = if let Some(key) = &args.sentinel_key {
        key.clone()
    } else if let Some(key) = &config.signing_key_hex {
        key.clone()
    } else {
        let key_path = expand_home(&args.data_dir).join(KEY_FILE);
        std::fs::read_to_string(&key_path)
            .with_context(|| format!("failed to read key file {}", key_path.display()))?
    };

    Keypair::from_hex(&hex_key).context("invalid sentinel signing key")
}

/// Initializes a new node data directory: generates a signing keypair and
/// writes a starter configuration.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("meridian_sentinel_node=info", LogFormat::Pretty);

    let data_dir = expand_home(&args.data_dir);
    tracing::info!(data_dir = %data_dir.display(), "initializing sentinel node");

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    // Generate the sentinel signing keypair.
    let keypair = Keypair::generate();
    let key_path = data_dir.join(KEY_FILE);
    std::fs::write(&key_path, keypair.secret_key_hex())
        .with_context(|| format!("failed to write signing key to {}", key_path.display()))?;

    // Restrict permissions on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
    }

    // Starter configuration; the operator fills in the endpoints.
    let config_path = data_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        let config = SentinelConfig {
            sentinel_id: args.sentinel_id,
            ..SentinelConfig::default()
        };
        std::fs::write(&config_path, serde_json::to_string_pretty(&config)?)
            .with_context(|| format!("failed to write config to {}", config_path.display()))?;
    }

    tracing::info!(
        public_key = %keypair.public_key_hex(),
        key_path = %key_path.display(),
        "sentinel keypair generated"
    );

    println!("Sentinel node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Sentinel id    : {}", args.sentinel_id);
    println!("  Signing key    : {}", key_path.display());
    println!("  Public key     : {}", keypair.public_key_hex());
    println!("  Configuration  : {}", config_path.display());

    Ok(())
}

/// Expands a leading `~` to the user's home directory.
fn expand_home(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}

/// Prints version information to stdout.
fn print_version() {
    println!("meridian-sentinel-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc                  {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
