//! Configuration for meetsync components

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Coordinator-specific config
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<CoordinatorConfig>,

    /// Replica-node-specific config
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeConfig>,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            coordinator: None,
            node: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from `meetsync.toml` (if present) merged with
    /// `MEETSYNC_*` environment variables. Missing file yields defaults.
    pub fn load() -> Self {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("meetsync").required(false))
            .add_source(
                config::Environment::with_prefix("MEETSYNC")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build().and_then(|c| c.try_deserialize()) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("Failed to load config file, using defaults: {}", e);
                Self::default()
            }
        }
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Bind address for the HTTP API
    #[serde(default = "default_coord_bind")]
    pub bind_addr: SocketAddr,

    /// URL other processes should use to reach this coordinator
    #[serde(default = "default_advertise_url")]
    pub advertise_url: String,

    /// Directory holding per-meeting bundle files
    #[serde(default = "default_bundle_root")]
    pub bundle_root: PathBuf,

    /// Seconds of heartbeat silence after which a node is evicted
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,

    /// Liveness sweep period
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

fn default_coord_bind() -> SocketAddr {
    "0.0.0.0:5000".parse().unwrap()
}
fn default_advertise_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_bundle_root() -> PathBuf {
    PathBuf::from("./bundles")
}
fn default_heartbeat_timeout() -> u64 {
    30
}
fn default_check_interval() -> u64 {
    10
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_coord_bind(),
            advertise_url: default_advertise_url(),
            bundle_root: default_bundle_root(),
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            check_interval_secs: default_check_interval(),
        }
    }
}

impl CoordinatorConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

/// Replica node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node ID; generated (`node-<uuid8>`) when absent
    #[serde(default)]
    pub node_id: Option<String>,

    /// Bind address for the node HTTP API
    #[serde(default = "default_node_bind")]
    pub bind_addr: SocketAddr,

    /// `host:port` the coordinator should embed in redirect URLs
    #[serde(default = "default_advertise_addr")]
    pub advertise_addr: String,

    /// Coordinator base URL
    #[serde(default = "default_coordinator_url")]
    pub coordinator_url: String,

    /// Local storage root for downloaded bundles
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Meeting poll / bundle sync period
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,

    /// Heartbeat send period
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Network retry/timeout tuning
    #[serde(default)]
    pub network: NetworkConfig,
}

fn default_node_bind() -> SocketAddr {
    "0.0.0.0:8001".parse().unwrap()
}
fn default_advertise_addr() -> String {
    "127.0.0.1:8001".to_string()
}
fn default_coordinator_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_storage_root() -> PathBuf {
    PathBuf::from("./node-data")
}
fn default_sync_interval() -> u64 {
    10
}
fn default_heartbeat_interval() -> u64 {
    10
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            bind_addr: default_node_bind(),
            advertise_addr: default_advertise_addr(),
            coordinator_url: default_coordinator_url(),
            storage_root: default_storage_root(),
            sync_interval_secs: default_sync_interval(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            network: NetworkConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Node ID from config, or a fresh generated one.
    pub fn resolve_node_id(&self) -> String {
        self.node_id.clone().unwrap_or_else(|| {
            let short = uuid::Uuid::new_v4().simple().to_string();
            format!("node-{}", &short[..8])
        })
    }
}

/// Retry counts and timeouts for calls to the coordinator.
///
/// Heartbeats and control-plane polls use the short connect timeout;
/// bundle downloads use the (much longer) download timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

fn default_retry_count() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    2
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_download_timeout() -> u64 {
    300
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            retry_delay_secs: default_retry_delay(),
            connect_timeout_secs: default_connect_timeout(),
            download_timeout_secs: default_download_timeout(),
        }
    }
}

impl NetworkConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinator_defaults() {
        let cfg = CoordinatorConfig::default();
        assert_eq!(cfg.heartbeat_timeout_secs, 30);
        assert_eq!(cfg.check_interval_secs, 10);
        assert_eq!(cfg.heartbeat_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_node_defaults() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.sync_interval_secs, 10);
        assert_eq!(cfg.network.retry_count, 3);
        assert_eq!(cfg.network.download_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_generated_node_id() {
        let cfg = NodeConfig::default();
        let id = cfg.resolve_node_id();
        assert!(id.starts_with("node-"));
        assert_eq!(id.len(), "node-".len() + 8);

        let pinned = NodeConfig {
            node_id: Some("node-a".into()),
            ..Default::default()
        };
        assert_eq!(pinned.resolve_node_id(), "node-a");
    }
}
