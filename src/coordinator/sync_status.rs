//! Per-meeting, per-node synchronization tracking
//!
//! Maps `meeting_id -> (node_id -> synced)`. A meeting counts as fully
//! synced once every currently-live node has confirmed it holds the
//! bundle; with no live nodes there is nothing to wait for. The tracker
//! is consulted for diagnostics, not gated on by the download router.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::coordinator::registry::NodeRegistry;

pub struct SyncStatusTracker {
    status: RwLock<HashMap<String, HashMap<String, bool>>>,
    registry: Arc<NodeRegistry>,
}

impl SyncStatusTracker {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            status: RwLock::new(HashMap::new()),
            registry,
        }
    }

    /// (Re)initialize tracking for a meeting, marking every currently
    /// registered node as not synced. Called when a meeting goes active.
    pub fn reset(&self, meeting_id: &str) {
        let mut status = self.status.write().unwrap();
        let entry = status.entry(meeting_id.to_string()).or_default();
        entry.clear();
        for node_id in self.registry.all_node_ids() {
            entry.insert(node_id, false);
        }
        tracing::info!(
            "Sync status reset for meeting {}: {} nodes pending",
            meeting_id,
            entry.len()
        );
    }

    /// Set a single node's sync flag for a meeting.
    pub fn update(&self, node_id: &str, meeting_id: &str, synced: bool) {
        let mut status = self.status.write().unwrap();
        status
            .entry(meeting_id.to_string())
            .or_default()
            .insert(node_id.to_string(), synced);
        tracing::debug!(
            "Node {} marked {} for meeting {}",
            node_id,
            if synced { "synced" } else { "not synced" },
            meeting_id
        );
    }

    /// Apply the sync report carried by one heartbeat.
    ///
    /// Meetings in `synced` that are active are marked true for this node;
    /// active meetings missing from `synced` are marked false. The node's
    /// last heartbeat wins outright, never merged with stale data.
    pub fn apply_report(&self, node_id: &str, active_meeting_ids: &[String], synced: &[String]) {
        for meeting_id in synced {
            if active_meeting_ids.contains(meeting_id) {
                self.update(node_id, meeting_id, true);
            }
        }
        for meeting_id in active_meeting_ids {
            if !synced.contains(meeting_id) {
                self.update(node_id, meeting_id, false);
            }
        }
    }

    /// Has every live node confirmed this meeting's bundle?
    pub fn is_fully_synced(&self, meeting_id: &str) -> bool {
        // No nodes at all: nothing to sync to
        if self.registry.is_empty() {
            return true;
        }

        let status = self.status.read().unwrap();
        let Some(entries) = status.get(meeting_id) else {
            // Tracked nowhere: conservatively not synced
            return false;
        };

        let live = self.registry.live_node_ids();
        if live.is_empty() {
            return true;
        }

        live.iter()
            .all(|node_id| entries.get(node_id).copied().unwrap_or(false))
    }

    /// Drop tracking once a meeting ends.
    pub fn remove(&self, meeting_id: &str) {
        if self.status.write().unwrap().remove(meeting_id).is_some() {
            tracing::info!("Sync status dropped for meeting {}", meeting_id);
        }
    }

    /// One node's flag for one meeting, if tracked.
    pub fn node_flag(&self, meeting_id: &str, node_id: &str) -> Option<bool> {
        self.status
            .read()
            .unwrap()
            .get(meeting_id)
            .and_then(|entries| entries.get(node_id))
            .copied()
    }

    /// Remove one node from every meeting's map (on unregister).
    pub fn remove_node(&self, node_id: &str) {
        let mut status = self.status.write().unwrap();
        for entries in status.values_mut() {
            entries.remove(node_id);
        }
    }

    /// Fully-synced flag per tracked meeting, for diagnostics.
    pub fn overview(&self) -> HashMap<String, bool> {
        let meeting_ids: Vec<String> = {
            let status = self.status.read().unwrap();
            status.keys().cloned().collect()
        };
        meeting_ids
            .into_iter()
            .map(|id| {
                let synced = self.is_fully_synced(&id);
                (id, synced)
            })
            .collect()
    }

    /// Number of meetings currently tracked.
    pub fn len(&self) -> usize {
        self.status.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.status.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn setup() -> (Arc<NodeRegistry>, SyncStatusTracker) {
        let registry = Arc::new(NodeRegistry::new(Duration::from_secs(30)));
        let tracker = SyncStatusTracker::new(registry.clone());
        (registry, tracker)
    }

    #[test]
    fn test_empty_registry_is_vacuously_synced() {
        let (_registry, tracker) = setup();
        tracker.reset("m1");
        assert!(tracker.is_fully_synced("m1"));
    }

    #[test]
    fn test_untracked_meeting_not_synced() {
        let (registry, tracker) = setup();
        registry.register("node-a", "10.0.0.1:9000");
        assert!(!tracker.is_fully_synced("never-reset"));
    }

    #[test]
    fn test_full_sync_requires_every_live_node() {
        let (registry, tracker) = setup();
        registry.register("node-a", "10.0.0.1:9000");
        registry.register("node-b", "10.0.0.2:9000");

        tracker.reset("m1");
        assert!(!tracker.is_fully_synced("m1"));

        tracker.update("node-a", "m1", true);
        assert!(!tracker.is_fully_synced("m1"));

        tracker.update("node-b", "m1", true);
        assert!(tracker.is_fully_synced("m1"));
    }

    #[test]
    fn test_apply_report_marks_unlisted_active_as_unsynced() {
        let (registry, tracker) = setup();
        registry.register("node-a", "10.0.0.1:9000");

        let active = vec!["m1".to_string(), "m2".to_string()];
        tracker.apply_report("node-a", &active, &["m1".to_string()]);

        assert!(tracker.is_fully_synced("m1"));
        assert!(!tracker.is_fully_synced("m2"));

        // Next report flips m1 back to pending
        tracker.apply_report("node-a", &active, &[]);
        assert!(!tracker.is_fully_synced("m1"));
    }

    #[test]
    fn test_apply_report_ignores_inactive_meetings() {
        let (registry, tracker) = setup();
        registry.register("node-a", "10.0.0.1:9000");

        tracker.apply_report("node-a", &["m1".to_string()], &["stale".to_string()]);
        assert!(!tracker.is_fully_synced("stale"));
        assert!(tracker.is_empty() || !tracker.is_fully_synced("m1"));
    }

    #[test]
    fn test_dead_nodes_do_not_block_full_sync() {
        let registry = Arc::new(NodeRegistry::new(Duration::from_millis(20)));
        let tracker = SyncStatusTracker::new(registry.clone());

        registry.register("node-a", "10.0.0.1:9000");
        registry.register("node-b", "10.0.0.2:9000");
        tracker.reset("m1");
        tracker.update("node-a", "m1", true);
        assert!(!tracker.is_fully_synced("m1"));

        // node-b goes silent past the timeout; only live nodes count
        std::thread::sleep(Duration::from_millis(40));
        registry.heartbeat("node-a", None);
        assert!(tracker.is_fully_synced("m1"));
    }

    #[test]
    fn test_remove_and_overview() {
        let (registry, tracker) = setup();
        registry.register("node-a", "10.0.0.1:9000");

        tracker.reset("m1");
        tracker.reset("m2");
        tracker.update("node-a", "m1", true);

        let overview = tracker.overview();
        assert_eq!(overview.get("m1"), Some(&true));
        assert_eq!(overview.get("m2"), Some(&false));

        tracker.remove("m1");
        assert!(!tracker.is_fully_synced("m1"));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_remove_node_clears_entries() {
        let (registry, tracker) = setup();
        registry.register("node-a", "10.0.0.1:9000");
        registry.register("node-b", "10.0.0.2:9000");
        tracker.reset("m1");
        tracker.update("node-a", "m1", true);
        tracker.update("node-b", "m1", true);

        registry.unregister("node-b");
        tracker.remove_node("node-b");
        assert!(tracker.is_fully_synced("m1"));
    }
}
