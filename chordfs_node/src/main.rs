use anyhow::Context;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use tokio::net::TcpListener;

use chordfs_node::maintenance::Maintenance;
use chordfs_node::server::serve;
use chordfs_node::transfer::TlsMaterial;
use chordfs_node::{shell, Config, Node};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file; flags given on the command line override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// RPC address to bind and advertise (host:port)
    #[arg(short, long)]
    addr: Option<String>,

    /// Bulk-transfer address to bind and advertise (host:port)
    #[arg(short, long)]
    transfer_addr: Option<String>,

    /// Address of a node to join
    #[arg(short, long)]
    join: Option<String>,

    /// Stabilize interval in milliseconds
    #[arg(long)]
    stabilize_ms: Option<u64>,

    /// Fix-fingers interval in milliseconds
    #[arg(long)]
    fix_fingers_ms: Option<u64>,

    /// Check-predecessor interval in milliseconds
    #[arg(long)]
    check_predecessor_ms: Option<u64>,

    /// Number of successors kept (R)
    #[arg(short = 'r', long)]
    successors: Option<usize>,

    /// Number of independent placements per stored file
    #[arg(long)]
    replicas: Option<usize>,

    /// Directory holding this node's files
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// PEM certificate for the transfer channel
    #[arg(long)]
    tls_cert: Option<PathBuf>,

    /// PEM private key for the transfer channel
    #[arg(long)]
    tls_key: Option<PathBuf>,

    /// Timeout for outbound RPCs in milliseconds
    #[arg(long)]
    rpc_timeout_ms: Option<u64>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(addr) = self.addr {
            config.address = addr;
        }
        if let Some(addr) = self.transfer_addr {
            config.transfer_address = addr;
        }
        if self.join.is_some() {
            config.join = self.join;
        }
        if let Some(ms) = self.stabilize_ms {
            config.stabilize_interval_ms = ms;
        }
        if let Some(ms) = self.fix_fingers_ms {
            config.fix_fingers_interval_ms = ms;
        }
        if let Some(ms) = self.check_predecessor_ms {
            config.check_predecessor_interval_ms = ms;
        }
        if let Some(r) = self.successors {
            config.successors = r;
        }
        if let Some(replicas) = self.replicas {
            config.replicas = replicas;
        }
        if self.storage_dir.is_some() {
            config.storage_dir = self.storage_dir;
        }
        if self.tls_cert.is_some() {
            config.tls_cert = self.tls_cert;
        }
        if self.tls_key.is_some() {
            config.tls_key = self.tls_key;
        }
        if let Some(ms) = self.rpc_timeout_ms {
            config.rpc_timeout_ms = ms;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = Args::parse().into_config()?;

    let tls = match (&config.tls_cert, &config.tls_key) {
        (Some(cert), Some(key)) => Some(TlsMaterial::load(cert, key)?),
        _ => None,
    };
    let public_key = tls.as_ref().map(|t| t.cert_pem.clone()).unwrap_or_default();

    let rpc_listener = TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("failed to bind {}", config.address))?;
    let transfer_listener = TcpListener::bind(&config.transfer_address)
        .await
        .with_context(|| format!("failed to bind {}", config.transfer_address))?;

    let join = config.join.clone();
    let node = Node::new(config, public_key)?;
    println!("Node starting at {} with ID {}", node.me.address(), node.id);

    let _server = serve(&node, rpc_listener, transfer_listener, tls.as_ref())?;

    match join {
        Some(introducer) => {
            println!("Joining ring via {}", introducer);
            node.join(&introducer).await?;
            println!("Joined successfully");
        }
        None => node.create_ring().await,
    }

    let _maintenance = Maintenance::start(&node);
    info!(
        "Node {}: storing files in {}",
        node.id.short(),
        node.local_store().dir().display()
    );

    if !shell::run(node).await? {
        info!("stdin closed, running until interrupted");
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
