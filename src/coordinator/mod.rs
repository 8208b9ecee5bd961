//! Coordinator implementation
//!
//! The coordinator is responsible for:
//! - The in-memory node registry (heartbeats, overwrite-on-register)
//! - Liveness monitoring (timeout-based eviction sweep)
//! - Per-meeting sync-status tracking across nodes
//! - Download routing (redirect to a live replica, or serve locally)
//! - The meeting directory and its change token

pub mod bundle;
pub mod http;
pub mod liveness;
pub mod meetings;
pub mod registry;
pub mod selector;
pub mod server;
pub mod sync_status;

pub use server::Coordinator;
