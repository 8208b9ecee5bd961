//! Ops commands for mirror-network management

pub mod admin;

pub use admin::{AdminClient, DownloadNodesInfo, EndpointInfo};
