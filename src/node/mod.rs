//! Replica node implementation
//!
//! A replica node mirrors active meeting bundles from the coordinator:
//! - A poll loop watches the coordinator's change token and downloads
//!   bundles for newly active meetings
//! - A heartbeat loop reports liveness plus which bundles are held
//! - An HTTP server serves the bundles the coordinator redirects to

pub mod client;
pub mod heartbeat;
pub mod http;
pub mod server;
pub mod store;
pub mod sync;

pub use server::ReplicaNode;
