//! `bond-node`: CLI entry point. Parses launch configuration, builds a
//! [`Node`], and starts the TCP listener and mining loop.

use bond_core::{Blockchain, Node};
use clap::Parser;
use num_bigint::BigUint;
use shared::Curve;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::info;

mod network;

/// Launch configuration, matching `shared::types::NodeConfig` but with the
/// handful of network-parameter and wallet flags a running node needs that
/// the shared config struct doesn't carry (those are policy decided once at
/// genesis, not per-launch).
#[derive(Parser, Debug)]
#[command(name = "bond-node")]
#[command(about = "A UTXO, proof-of-work ledger node")]
struct Cli {
    /// Address to bind the peer listener to.
    #[arg(long, default_value = "127.0.0.1")]
    bind_address: String,

    /// Port to listen for peer connections on.
    #[arg(long, default_value_t = 8333)]
    port: u16,

    /// Peers to dial on startup, `ip:port` pairs.
    #[arg(long)]
    bootstrap_peers: Vec<String>,

    /// Deterministic wallet seed for this node (demo/test convenience; a
    /// production launch would read this from a keyfile instead).
    #[arg(long, default_value_t = 1)]
    wallet_seed: u64,

    /// Start the mining loop immediately.
    #[arg(long)]
    mine: bool,

    /// Starting proof-of-work target, in bits (spec §4.6).
    #[arg(long, default_value_t = 20)]
    starting_target: u8,

    /// Starting block reward.
    #[arg(long, default_value_t = 50)]
    starting_reward: u32,

    /// Retarget heartbeat, in seconds.
    #[arg(long, default_value_t = 60)]
    heartbeat_seconds: u16,

    /// Total amount ever mintable through block rewards.
    #[arg(long, default_value_t = 21_000_000)]
    total_mining_amount: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&cli.log_level))
        .init();

    let curve = Curve::secp256k1();
    let blockchain = Blockchain::new(
        curve.clone(),
        cli.total_mining_amount,
        cli.starting_reward,
        cli.starting_target,
        cli.heartbeat_seconds,
    );
    info!(height = blockchain.height(), "genesis block constructed");

    let wallet = bond_core::Wallet::from_seed(&BigUint::from(cli.wallet_seed), curve);
    let node = Node::new(blockchain, wallet);

    let bind: SocketAddr = format!("{}:{}", cli.bind_address, cli.port).parse()?;
    let bootstrap: Vec<SocketAddr> = cli
        .bootstrap_peers
        .iter()
        .filter_map(|raw| SocketAddr::from_str(raw).ok())
        .collect();

    network::run(node, bind, bootstrap, cli.mine).await
}
