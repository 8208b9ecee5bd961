//! Replica node binary

use clap::{Parser, Subcommand};
use meetsync::{common::NodeConfig, ReplicaNode};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "meetsync-node")]
#[command(about = "meetsync replica node: mirrors and serves meeting bundles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start replica node server
    Serve {
        /// Node ID (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Bind address for HTTP
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// host:port the coordinator should embed in redirect URLs
        #[arg(long)]
        advertise: Option<String>,

        /// Coordinator base URL
        #[arg(long)]
        coordinator: Option<String>,

        /// Local storage root for downloaded bundles
        #[arg(long)]
        storage: Option<PathBuf>,

        /// Meeting poll period in seconds
        #[arg(long)]
        sync_interval: Option<u64>,

        /// Heartbeat send period in seconds
        #[arg(long)]
        heartbeat_interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            id,
            bind,
            advertise,
            coordinator,
            storage,
            sync_interval,
            heartbeat_interval,
        } => {
            // File/env config first, CLI flags override
            let file_config = meetsync::common::config::Config::load();
            let mut config = file_config.node.unwrap_or_else(NodeConfig::default);

            if id.is_some() {
                config.node_id = id;
            }
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(advertise) = advertise {
                config.advertise_addr = advertise;
            }
            if let Some(coordinator) = coordinator {
                config.coordinator_url = coordinator;
            }
            if let Some(storage) = storage {
                config.storage_root = storage;
            }
            if let Some(secs) = sync_interval {
                config.sync_interval_secs = secs;
            }
            if let Some(secs) = heartbeat_interval {
                config.heartbeat_interval_secs = secs;
            }

            ReplicaNode::new(config).serve().await?;
        }
    }

    Ok(())
}
