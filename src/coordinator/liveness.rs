//! Liveness monitor
//!
//! Background sweep that evicts nodes whose heartbeat silence exceeds the
//! timeout. Eviction is unconditional: no grace period, no quarantine. An
//! evicted node's next heartbeat fails, which triggers its re-registration
//! path; that round trip is the whole recovery protocol.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::common::METRICS;
use crate::coordinator::registry::NodeRegistry;

pub struct LivenessMonitor {
    registry: Arc<NodeRegistry>,
    check_interval: Duration,
    cancel: CancellationToken,
}

impl LivenessMonitor {
    pub fn new(registry: Arc<NodeRegistry>, check_interval: Duration) -> Self {
        Self {
            registry,
            check_interval,
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// One sweep over the registry. Separate from the loop for tests.
    pub fn sweep(registry: &NodeRegistry) -> usize {
        let evicted = registry.evict_stale();
        for (node_id, address) in &evicted {
            tracing::warn!(
                "Node {} ({}) evicted: no heartbeat within {:?}",
                node_id,
                address,
                registry.heartbeat_timeout()
            );
            METRICS.nodes_evicted.inc();
        }
        METRICS.live_nodes.set(registry.live_nodes().len() as u64);
        evicted.len()
    }

    /// Spawn the sweep loop. The task runs until the cancellation token
    /// fires; a panic inside one tick is caught and logged so a single bad
    /// iteration never kills the monitor.
    pub fn start(&self) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let cancel = self.cancel.clone();
        let mut timer = tokio::time::interval(self.check_interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tokio::spawn(async move {
            tracing::info!(
                "Liveness monitor started (timeout {:?})",
                registry.heartbeat_timeout()
            );
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        tracing::info!("Liveness monitor shutting down");
                        break;
                    }
                    _ = timer.tick() => {
                        let reg = registry.clone();
                        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                            Self::sweep(&reg)
                        }));
                        match result {
                            Ok(0) => {}
                            Ok(n) => tracing::info!("Liveness sweep evicted {} node(s)", n),
                            Err(_) => tracing::error!("Liveness sweep panicked, continuing"),
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweep_evicts_only_stale() {
        let registry = Arc::new(NodeRegistry::new(Duration::from_millis(30)));
        registry.register("node-a", "10.0.0.1:9000");
        registry.register("node-b", "10.0.0.2:9000");

        tokio::time::sleep(Duration::from_millis(60)).await;
        registry.heartbeat("node-a", None);

        let evicted = LivenessMonitor::sweep(&registry);
        assert_eq!(evicted, 1);
        assert!(registry.contains("node-a"));
        assert!(!registry.contains("node-b"));
    }

    #[tokio::test]
    async fn test_monitor_loop_evicts_and_cancels() {
        let registry = Arc::new(NodeRegistry::new(Duration::from_millis(30)));
        registry.register("node-a", "10.0.0.1:9000");

        let monitor = LivenessMonitor::new(registry.clone(), Duration::from_millis(20));
        let cancel = monitor.cancel_token();
        let handle = monitor.start();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(registry.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }
}
