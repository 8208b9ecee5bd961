//! Replica node server

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::common::{retry_fixed, NodeConfig, Result};
use crate::node::client::CoordinatorClient;
use crate::node::heartbeat::HeartbeatSender;
use crate::node::http::{create_router, NodeState};
use crate::node::store::BundleStore;
use crate::node::sync::SyncEngine;

pub struct ReplicaNode {
    config: NodeConfig,
}

/// Everything a running replica is built from; exposed so tests can mount
/// the router and drive the engine directly.
pub struct ReplicaParts {
    pub node_id: String,
    pub client: Arc<CoordinatorClient>,
    pub store: Arc<BundleStore>,
    pub engine: Arc<SyncEngine>,
    pub heartbeat: Arc<HeartbeatSender>,
    pub state: NodeState,
}

impl ReplicaNode {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    pub fn build_parts(&self) -> Result<ReplicaParts> {
        let node_id = self.config.resolve_node_id();
        let client = Arc::new(CoordinatorClient::new(
            &self.config.coordinator_url,
            self.config.network.clone(),
        )?);
        let store = Arc::new(BundleStore::new(self.config.storage_root.clone()));
        let engine = Arc::new(SyncEngine::new(
            client.clone(),
            store.clone(),
            self.config.clone(),
        ));
        let heartbeat = Arc::new(HeartbeatSender::new(
            client.clone(),
            engine.clone(),
            node_id.clone(),
            self.config.advertise_addr.clone(),
            self.config.clone(),
        ));

        let state = NodeState {
            engine: engine.clone(),
            store: store.clone(),
            node_id: node_id.clone(),
            address: self.config.advertise_addr.clone(),
            coordinator_url: client.base_url().to_string(),
            started_at: Instant::now(),
        };

        Ok(ReplicaParts {
            node_id,
            client,
            store,
            engine,
            heartbeat,
            state,
        })
    }

    pub async fn serve(self) -> Result<()> {
        let parts = self.build_parts()?;

        tracing::info!("Starting replica node {}", parts.node_id);
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!("  Advertised: {}", self.config.advertise_addr);
        tracing::info!("  Coordinator: {}", parts.client.base_url());
        tracing::info!("  Storage root: {}", self.config.storage_root.display());

        parts.store.init().await?;

        // Initial registration, retried against a coordinator that is
        // still coming up
        let client = parts.client.clone();
        let node_id = parts.node_id.clone();
        let address = self.config.advertise_addr.clone();
        retry_fixed(
            move || {
                let client = client.clone();
                let node_id = node_id.clone();
                let address = address.clone();
                async move { client.register(&node_id, &address).await }
            },
            self.config.network.retry_count,
            self.config.network.retry_delay(),
        )
        .await?;
        tracing::info!("Registered with coordinator as {}", parts.node_id);

        let cancel = CancellationToken::new();
        let sync_handle = tokio::spawn(parts.engine.clone().run(cancel.clone()));
        let hb_handle = tokio::spawn(parts.heartbeat.clone().run(cancel.clone()));

        let router = create_router(parts.state.clone());
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!("✓ Replica node ready");

        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        cancel.cancel();
        for handle in [sync_handle, hb_handle] {
            if let Err(e) = handle.await {
                tracing::error!("Background task error on shutdown: {}", e);
            }
        }

        // Best-effort goodbye so the coordinator drops us ahead of the
        // liveness sweep
        if let Err(e) = parts.client.unregister(&parts.node_id).await {
            tracing::warn!("Unregister on shutdown failed: {}", e);
        }

        Ok(())
    }
}
