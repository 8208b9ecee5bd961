//! In-memory node registry
//!
//! Authoritative map from node id to its last-known state. Liveness is a
//! derived property: a node is live iff its last heartbeat is within the
//! configured timeout. Nothing here is persisted; after a coordinator
//! restart the registry rebuilds itself from heartbeat traffic.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::common::utils::timestamp_now;

/// An `{id, title}` pair as reported by nodes and the meeting directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRef {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl MeetingRef {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
        }
    }

    /// Title for display, falling back to the id.
    pub fn display_title(&self) -> String {
        match &self.title {
            Some(t) if !t.is_empty() => t.clone(),
            _ => format!("meeting {}", self.id),
        }
    }
}

/// One registered replica node.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub node_id: String,
    pub address: String,
    pub last_seen: Instant,
    pub registered_at: Instant,
    /// Wall-clock registration time, for uptime reporting only
    pub registered_wall: u64,
    /// Meetings the node last reported as syncing/serving, in reported order
    pub active_meetings: Vec<MeetingRef>,
}

impl NodeRecord {
    /// Human-readable summary of the node's active meetings.
    pub fn active_meeting_summary(&self) -> Option<String> {
        if self.active_meetings.is_empty() {
            return None;
        }
        let titles: Vec<String> = self
            .active_meetings
            .iter()
            .map(MeetingRef::display_title)
            .collect();
        Some(titles.join(", "))
    }
}

/// Serializable node view for the HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_id: String,
    pub address: String,
    pub status: String,
    pub last_seen_secs_ago: u64,
    pub uptime_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_meeting: Option<String>,
    pub active_meetings: Vec<MeetingRef>,
}

/// In-memory registry of replica nodes.
pub struct NodeRegistry {
    nodes: RwLock<HashMap<String, NodeRecord>>,
    heartbeat_timeout: Duration,
}

impl NodeRegistry {
    pub fn new(heartbeat_timeout: Duration) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            heartbeat_timeout,
        }
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_timeout
    }

    /// Register a node, overwriting any prior record with the same id.
    ///
    /// Re-registration resets the node's timers; the dominant trigger is a
    /// node recovering from eviction, so overwrite semantics are intended.
    /// Returns `false` on empty id or address.
    pub fn register(&self, node_id: &str, address: &str) -> bool {
        if node_id.is_empty() || address.is_empty() {
            tracing::warn!(
                "Rejected registration with invalid data: id={:?} address={:?}",
                node_id,
                address
            );
            return false;
        }

        let now = Instant::now();
        let record = NodeRecord {
            node_id: node_id.to_string(),
            address: address.to_string(),
            last_seen: now,
            registered_at: now,
            registered_wall: timestamp_now(),
            active_meetings: Vec::new(),
        };

        self.nodes
            .write()
            .unwrap()
            .insert(node_id.to_string(), record);
        tracing::info!("Node registered: {} ({})", node_id, address);
        true
    }

    /// Remove a node. Returns `false` if the id is unknown.
    pub fn unregister(&self, node_id: &str) -> bool {
        let removed = self.nodes.write().unwrap().remove(node_id).is_some();
        if removed {
            tracing::info!("Node unregistered: {}", node_id);
        } else {
            tracing::warn!("Attempted to unregister unknown node: {}", node_id);
        }
        removed
    }

    /// Record a heartbeat. Returns `false` if the node is unknown, in which
    /// case the caller is expected to register and retry.
    ///
    /// When `active_meetings` is supplied it replaces the stored list; the
    /// node's last heartbeat is authoritative for its own state.
    pub fn heartbeat(&self, node_id: &str, active_meetings: Option<Vec<MeetingRef>>) -> bool {
        let mut nodes = self.nodes.write().unwrap();
        match nodes.get_mut(node_id) {
            Some(record) => {
                record.last_seen = Instant::now();
                if let Some(meetings) = active_meetings {
                    record.active_meetings = meetings;
                }
                tracing::debug!("Heartbeat from node: {}", node_id);
                true
            }
            None => {
                tracing::warn!("Heartbeat from unknown node: {}", node_id);
                false
            }
        }
    }

    fn is_live(&self, record: &NodeRecord, now: Instant) -> bool {
        now.duration_since(record.last_seen) <= self.heartbeat_timeout
    }

    /// All live nodes with a routable (`host:port`) address.
    ///
    /// Records with a malformed address are logged and skipped; a bad
    /// address must never break routing.
    pub fn live_nodes(&self) -> Vec<NodeInfo> {
        let now = Instant::now();
        let nodes = self.nodes.read().unwrap();

        let mut out = Vec::new();
        for record in nodes.values() {
            if !self.is_live(record, now) {
                continue;
            }
            if !record.address.contains(':') {
                tracing::warn!(
                    "Node {} has malformed address {:?}, excluded from routing",
                    record.node_id,
                    record.address
                );
                continue;
            }
            out.push(NodeInfo {
                node_id: record.node_id.clone(),
                address: record.address.clone(),
                status: "online".to_string(),
                last_seen_secs_ago: now.duration_since(record.last_seen).as_secs(),
                uptime_secs: now.duration_since(record.registered_at).as_secs(),
                active_meeting: record.active_meeting_summary(),
                active_meetings: record.active_meetings.clone(),
            });
        }
        out.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        out
    }

    /// Addresses of all live, routable nodes.
    pub fn live_addresses(&self) -> Vec<String> {
        self.live_nodes().into_iter().map(|n| n.address).collect()
    }

    /// Ids of all live nodes (routable or not); used by the sync tracker.
    pub fn live_node_ids(&self) -> Vec<String> {
        let now = Instant::now();
        let nodes = self.nodes.read().unwrap();
        nodes
            .values()
            .filter(|r| self.is_live(r, now))
            .map(|r| r.node_id.clone())
            .collect()
    }

    /// Ids of every registered node, live or not.
    pub fn all_node_ids(&self) -> Vec<String> {
        self.nodes.read().unwrap().keys().cloned().collect()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.read().unwrap().contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().unwrap().is_empty()
    }

    /// Remove every record whose heartbeat silence exceeds the timeout.
    /// Returns the evicted `(node_id, address)` pairs.
    pub fn evict_stale(&self) -> Vec<(String, String)> {
        let now = Instant::now();
        let mut nodes = self.nodes.write().unwrap();

        let stale: Vec<String> = nodes
            .values()
            .filter(|r| now.duration_since(r.last_seen) > self.heartbeat_timeout)
            .map(|r| r.node_id.clone())
            .collect();

        let mut evicted = Vec::with_capacity(stale.len());
        for node_id in stale {
            if let Some(record) = nodes.remove(&node_id) {
                evicted.push((record.node_id, record.address));
            }
        }
        evicted
    }
}
