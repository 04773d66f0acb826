#![forbid(unsafe_code)]
//! Network node for powledger

use clap::Parser;
use powledger::config::load_config;
use powledger::node::Node;
use powledger::sync::NodeSynchronizer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "powledger-node", about = "Run a powledger node")]
struct Args {
    /// Port to listen on (overrides node.api_port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Additional peer to reconcile with (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(port) = args.port {
        config.node.api_port = port;
    }
    config.consensus.peers.extend(args.peers);
    let resolve_interval = config.consensus.resolve_interval;

    let node = Arc::new(Node::new(config)?);
    info!(node_id = %node.node_id(), peers = node.peers().len(), "starting powledger node");

    let _sync = resolve_interval.map(|interval| NodeSynchronizer::spawn(node.clone(), interval));

    let shutdown_node = node.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("shutdown requested");
        shutdown_node.shutdown();
    };

    powledger::api::run_api_server(node, shutdown).await?;
    info!("node stopped");
    Ok(())
}
