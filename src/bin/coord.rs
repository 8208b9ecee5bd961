//! Coordinator binary

use clap::{Parser, Subcommand};
use meetsync::{common::CoordinatorConfig, Coordinator};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "meetsync-coord")]
#[command(about = "meetsync coordinator: node registry and bundle routing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start coordinator server
    Serve {
        /// Bind address for HTTP
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// URL nodes and clients should use to reach this coordinator
        #[arg(long)]
        advertise: Option<String>,

        /// Directory holding meeting bundle files
        #[arg(long)]
        bundle_root: Option<PathBuf>,

        /// Seconds of heartbeat silence before a node is evicted
        #[arg(long)]
        heartbeat_timeout: Option<u64>,

        /// Liveness sweep period in seconds
        #[arg(long)]
        check_interval: Option<u64>,
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
            bind,
            advertise,
            bundle_root,
            heartbeat_timeout,
            check_interval,
        } => {
            // File/env config first, CLI flags override
            let file_config = meetsync::common::config::Config::load();
            let mut config = file_config
                .coordinator
                .unwrap_or_else(CoordinatorConfig::default);

            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(advertise) = advertise {
                config.advertise_url = advertise;
            }
            if let Some(bundle_root) = bundle_root {
                config.bundle_root = bundle_root;
            }
            if let Some(secs) = heartbeat_timeout {
                config.heartbeat_timeout_secs = secs;
            }
            if let Some(secs) = check_interval {
                config.check_interval_secs = secs;
            }

            Coordinator::new(config).serve().await?;
        }
    }

    Ok(())
}
