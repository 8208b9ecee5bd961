//! Periodic heartbeat sender
//!
//! Every interval the sender snapshots the sync engine's bookkeeping and
//! posts it to the coordinator. If the coordinator rejects the node as
//! unknown, the sender re-registers and resends once in the same tick so a
//! restarted coordinator picks the node back up within one interval.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::common::{retry_fixed, Error, NodeConfig, Result, METRICS};
use crate::node::client::{CoordinatorClient, HeartbeatPayload};
use crate::node::sync::SyncEngine;

pub struct HeartbeatSender {
    client: Arc<CoordinatorClient>,
    engine: Arc<SyncEngine>,
    node_id: String,
    address: String,
    config: NodeConfig,
}

impl HeartbeatSender {
    pub fn new(
        client: Arc<CoordinatorClient>,
        engine: Arc<SyncEngine>,
        node_id: String,
        address: String,
        config: NodeConfig,
    ) -> Self {
        Self {
            client,
            engine,
            node_id,
            address,
            config,
        }
    }

    fn payload(&self) -> HeartbeatPayload {
        let (active_meetings, synced_meetings) = self.engine.heartbeat_snapshot();
        HeartbeatPayload {
            node_id: self.node_id.clone(),
            address: self.address.clone(),
            status: "online".to_string(),
            active_meetings,
            synced_meetings,
        }
    }

    async fn post_with_retries(&self, payload: &HeartbeatPayload) -> Result<()> {
        let client = self.client.clone();
        let payload = payload.clone();
        retry_fixed(
            move || {
                let client = client.clone();
                let payload = payload.clone();
                async move { client.heartbeat(&payload).await }
            },
            self.config.network.retry_count,
            self.config.network.retry_delay(),
        )
        .await
    }

    /// One heartbeat tick: bounded retries on transport failure,
    /// self-healing re-register on rejection.
    pub async fn send_once(&self) -> Result<()> {
        let payload = self.payload();
        match self.post_with_retries(&payload).await {
            Ok(()) => {
                METRICS.heartbeats_sent.inc();
                Ok(())
            }
            Err(Error::NodeUnknown(_)) => {
                tracing::warn!(
                    "Coordinator rejected heartbeat from {}, re-registering",
                    self.node_id
                );
                self.client.register(&self.node_id, &self.address).await?;
                self.post_with_retries(&payload).await?;
                METRICS.heartbeats_sent.inc();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut timer = tokio::time::interval(self.config.heartbeat_interval());
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Heartbeat sender stopping");
                    return;
                }
                _ = timer.tick() => {
                    if let Err(e) = self.send_once().await {
                        METRICS.heartbeat_failures.inc();
                        tracing::warn!("Heartbeat failed: {}", e);
                    }
                }
            }
        }
    }
}
