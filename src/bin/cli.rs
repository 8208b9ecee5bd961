//! CLI for mirror-network operations

use clap::{Parser, Subcommand};
use meetsync::ops::AdminClient;

#[derive(Parser)]
#[command(name = "meetsync")]
#[command(about = "meetsync meeting bundle mirror network CLI")]
#[command(version)]
struct Cli {
    /// Coordinator URL
    #[arg(long, default_value = "http://localhost:5000")]
    coordinator: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List live replica nodes
    Nodes,

    /// Show per-meeting sync status
    SyncStatus,

    /// List every endpoint able to serve a meeting's bundle
    Endpoints {
        /// Meeting ID
        meeting_id: String,
    },

    /// List meetings
    Meetings,

    /// Create a scheduled meeting
    CreateMeeting {
        /// Meeting title
        title: String,

        /// Scheduled time (free-form)
        #[arg(long, default_value = "")]
        time: String,
    },

    /// Start a meeting (activates bundle distribution)
    StartMeeting {
        /// Meeting ID
        meeting_id: String,
    },

    /// End a meeting
    EndMeeting {
        /// Meeting ID
        meeting_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let client = AdminClient::new(&cli.coordinator)?;

    match cli.command {
        Commands::Nodes => {
            let nodes = client.list_nodes().await?;
            println!("Live nodes: {}", nodes.len());
            for node in nodes {
                println!(
                    "  {} at {} (seen {}s ago, up {}s){}",
                    node.node_id,
                    node.address,
                    node.last_seen_secs_ago,
                    node.uptime_secs,
                    node.active_meeting
                        .map(|m| format!(" syncing: {}", m))
                        .unwrap_or_default()
                );
            }
        }

        Commands::SyncStatus => {
            let status = client.sync_status().await?;
            if status.is_empty() {
                println!("No meetings tracked");
            }
            let mut entries: Vec<_> = status.into_iter().collect();
            entries.sort();
            for (meeting_id, synced) in entries {
                println!(
                    "  {} {}",
                    meeting_id,
                    if synced { "fully synced" } else { "pending" }
                );
            }
        }

        Commands::Endpoints { meeting_id } => {
            let info = client.download_endpoints(&meeting_id).await?;
            println!(
                "Meeting {} ({})",
                info.meeting_id,
                if info.fully_synced {
                    "fully synced"
                } else {
                    "sync pending"
                }
            );
            for ep in info.endpoints {
                println!(
                    "  [{}] {}{}{}",
                    ep.kind,
                    ep.url,
                    ep.node_id
                        .map(|id| format!(" node={}", id))
                        .unwrap_or_default(),
                    ep.synced
                        .map(|s| format!(" synced={}", s))
                        .unwrap_or_default()
                );
            }
        }

        Commands::Meetings => {
            let meetings = client.list_meetings().await?;
            println!("Meetings: {}", meetings.len());
            for m in meetings {
                println!("  {} [{}] {} ({})", m.id, m.status, m.title, m.time);
            }
        }

        Commands::CreateMeeting { title, time } => {
            let meeting = client.create_meeting(&title, &time).await?;
            println!("Created meeting {} ({})", meeting.id, meeting.title);
        }

        Commands::StartMeeting { meeting_id } => {
            let meeting = client.start_meeting(&meeting_id).await?;
            println!("Meeting {} is now {}", meeting.id, meeting.status);
        }

        Commands::EndMeeting { meeting_id } => {
            let meeting = client.end_meeting(&meeting_id).await?;
            println!("Meeting {} is now {}", meeting.id, meeting.status);
        }
    }

    Ok(())
}
