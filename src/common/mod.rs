//! Common utilities and types shared across meetsync

pub mod config;
pub mod error;
pub mod metrics;
pub mod utils;

pub use config::{Config, CoordinatorConfig, NetworkConfig, NodeConfig};
pub use error::{Error, Result};
pub use metrics::METRICS;
pub use utils::{decode_id, encode_id, format_bytes, parse_duration, retry_fixed, timestamp_now};
