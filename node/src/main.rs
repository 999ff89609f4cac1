// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Thin CLI shell: parses arguments, builds the protocol/network
//! configuration, and wires a `Server` together. All protocol logic lives
//! in `neo-network`; this binary only owns process startup/shutdown and a
//! placeholder in-memory `Ledger` until a real chain store is plugged in.

mod ledger;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use neo_config::{NetworkConfig, ProtocolConfig};
use neo_network::{spawn_block_timer, Server};
use tracing::info;

use crate::ledger::InMemoryLedger;

#[derive(Parser, Debug)]
#[command(name = "neo-node", about = "A Neo-protocol full node")]
struct Args {
    /// Which well-known network to join.
    #[arg(long, value_enum, default_value_t = NetworkKind::Testnet)]
    network: NetworkKind,

    /// Path to a TOML file providing a `NetworkConfig` (overrides defaults).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the listen address from the config file/default.
    #[arg(long)]
    listen: Option<String>,

    /// Additional seed addresses, appended to the configured seed list.
    #[arg(long = "seed")]
    seeds: Vec<String>,
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
enum NetworkKind {
    Mainnet,
    Testnet,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let protocol = match args.network {
        NetworkKind::Mainnet => ProtocolConfig::mainnet(),
        NetworkKind::Testnet => ProtocolConfig::testnet(),
    };

    let mut network = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str::<NetworkConfig>(&raw)
                .with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => NetworkConfig::default(),
    };

    if let Some(listen) = args.listen {
        network.listen_address = listen;
    }
    network.seed_list.extend(args.seeds);

    info!(?protocol, listen = %network.listen_address, "starting node");

    let ledger = Arc::new(InMemoryLedger::new());
    let user_agent = format!("/neo-node:{}/", env!("CARGO_PKG_VERSION"));
    let server = Server::new(protocol, network.clone(), ledger, user_agent);

    let _connections = server.run().await.context("starting connection manager")?;
    spawn_block_timer(server.sync_tick_handle(), network.block_timer);

    info!("node running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutting down");

    Ok(())
}
