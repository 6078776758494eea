use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "chainseq")]
#[command(
    author,
    version,
    about = "Deploy interdependent smart contracts in dependency order"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "CHAINSEQ_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a Deploy.toml file, or to a directory containing one.
    ///
    /// If not provided, ./Deploy.toml is used when present.
    #[arg(short, long, global = true, alias = "conf", env = "CHAINSEQ_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve the deployment order and print it, without touching the network.
    Plan,

    /// Deploy every unit in order and write the address map.
    Deploy(DeployArgs),

    /// Write the effective configuration to a Deploy.toml file.
    Init {
        /// Where to write the configuration.
        #[arg(default_value = "Deploy.toml")]
        path: PathBuf,
    },
}

/// Overrides applied on top of the layered configuration.
#[derive(Debug, Clone, Default, Args)]
pub struct DeployArgs {
    /// JSON-RPC endpoint of the node.
    #[arg(long, alias = "rpc", env = "CHAINSEQ_RPC_URL")]
    pub rpc_url: Option<Url>,

    /// Sending account. Defaults to the node's first account.
    #[arg(long, env = "CHAINSEQ_FROM")]
    pub from: Option<Address>,

    /// Directory the address map and deployment log are written to.
    #[arg(long, alias = "out", env = "CHAINSEQ_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Hardhat artifacts directory.
    #[arg(long, env = "CHAINSEQ_ARTIFACTS_DIR")]
    pub artifacts_dir: Option<PathBuf>,

    /// Number of blocks a deployment must be buried under before it counts as confirmed.
    #[arg(long, env = "CHAINSEQ_CONFIRMATIONS")]
    pub confirmations: Option<u64>,
}
