//! # CLI Interface
//!
//! Defines the command-line argument structure for `meridian-sentinel-node`
//! using `clap` derive. Supports three subcommands: `run`, `init`, and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Meridian Ledger sentinel node.
///
/// The transaction-intake node of the Meridian two-phase-commit ledger.
/// Validates client transactions, batches spend-proof verification, submits
/// condensed transactions to the coordinator cluster, and serves attestation
/// requests from peer sentinels.
#[derive(Parser, Debug)]
#[command(
    name = "meridian-sentinel-node",
    about = "Meridian Ledger sentinel node",
    version,
    propagate_version = true
)]
pub struct SentinelNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the sentinel binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the sentinel node.
    Run(RunArgs),
    /// Initialize a new node — creates the data directory, generates a
    /// fresh signing keypair, and writes a starter configuration file.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node configuration file (JSON).
    ///
    /// When omitted, the node looks for `config.json` in the data directory.
    #[arg(long, short = 'c', env = "MERIDIAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the node data directory where keys and configuration live.
    #[arg(long, short = 'd', env = "MERIDIAN_DATA_DIR", default_value = "~/.meridian")]
    pub data_dir: PathBuf,

    /// Address for the inbound request listener, overriding the config file.
    #[arg(long, env = "MERIDIAN_LISTEN_ADDR")]
    pub listen: Option<String>,

    /// Coordinator endpoint, overriding the config file.
    #[arg(long, env = "MERIDIAN_COORDINATOR")]
    pub coordinator: Option<String>,

    /// Peer sentinel endpoint; repeat the flag for each peer. Overrides the
    /// config file's peer list when given at least once.
    #[arg(long = "peer")]
    pub peers: Vec<String>,

    /// Hex-encoded Ed25519 sentinel signing key.
    ///
    /// If not provided, the node reads the key from the config file or the
    /// data directory. **Never pass this flag in production** — use the key
    /// file instead.
    #[arg(long, env = "MERIDIAN_SENTINEL_KEY")]
    pub sentinel_key: Option<String>,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "MERIDIAN_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "MERIDIAN_DATA_DIR", default_value = "~/.meridian")]
    pub data_dir: PathBuf,

    /// This node's numeric identity within the sentinel set.
    #[arg(long, default_value_t = 0)]
    pub sentinel_id: u32,
}
