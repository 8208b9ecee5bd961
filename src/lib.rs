//! # meetsync
//!
//! A small distributed mirror network for meeting artifact bundles:
//! - Coordinator tracks replica nodes via heartbeats with timeout-based eviction
//! - Replica nodes poll for active meetings and pull their bundles
//! - Downloads are redirected to a live replica, or served locally as fallback
//! - Registry state is in-memory only; nodes self-heal by re-registering
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Coordinator                  │
//! │  - Node registry (in-memory)            │
//! │  - Liveness monitor (eviction sweep)    │
//! │  - Sync-status tracker                  │
//! │  - Download router (302 or local)       │
//! └───────────┬─────────────────────────────┘
//!             │ HTTP/JSON
//!   ┌─────────┴──────────┬──────────────┐
//!   │                    │              │
//! ┌─▼─────────┐   ┌─────▼──────┐   ┌──▼───────────┐
//! │ Node 1     │   │ Node 2     │   │ Node 3       │
//! │ heartbeat  │   │ heartbeat  │   │ heartbeat    │
//! │ poll+sync  │   │ poll+sync  │   │ poll+sync    │
//! └────────────┘   └────────────┘   └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start the coordinator
//! ```bash
//! meetsync-coord serve \
//!   --bind 0.0.0.0:5000 \
//!   --bundle-root ./bundles
//! ```
//!
//! ### Start a replica node
//! ```bash
//! meetsync-node serve \
//!   --id node-1 \
//!   --bind 0.0.0.0:8001 \
//!   --coordinator http://localhost:5000 \
//!   --storage ./node-data
//! ```
//!
//! ### Use the CLI
//! ```bash
//! # Live nodes
//! meetsync nodes --coordinator http://localhost:5000
//!
//! # Per-meeting sync state
//! meetsync sync-status
//!
//! # Where can a bundle be fetched from right now?
//! meetsync endpoints <meeting-id>
//! ```

pub mod common;
pub mod coordinator;
pub mod node;
pub mod ops;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use coordinator::Coordinator;
pub use node::ReplicaNode;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
