//! Coordinator server

use std::sync::Arc;

use crate::common::{CoordinatorConfig, Result};
use crate::coordinator::bundle::{BundleGenerator, BundleProvider, NoBundleGenerator};
use crate::coordinator::http::{create_router, CoordState};
use crate::coordinator::liveness::LivenessMonitor;
use crate::coordinator::meetings::MeetingDirectory;
use crate::coordinator::registry::NodeRegistry;
use crate::coordinator::selector::{NodeSelector, RandomSelector};
use crate::coordinator::sync_status::SyncStatusTracker;

pub struct Coordinator {
    config: CoordinatorConfig,
    selector: Arc<dyn NodeSelector>,
    generator: Arc<dyn BundleGenerator>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            selector: Arc::new(RandomSelector),
            generator: Arc::new(NoBundleGenerator),
        }
    }

    /// Substitute the node selection policy.
    pub fn with_selector(mut self, selector: Arc<dyn NodeSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Substitute the bundle generator (tests, embedded packaging).
    pub fn with_generator(mut self, generator: Arc<dyn BundleGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Build the shared state without serving; used by tests to mount the
    /// router on an ephemeral port.
    pub fn build_state(&self) -> CoordState {
        let registry = Arc::new(NodeRegistry::new(self.config.heartbeat_timeout()));
        let tracker = Arc::new(SyncStatusTracker::new(registry.clone()));
        let meetings = Arc::new(MeetingDirectory::new());
        let bundles = Arc::new(BundleProvider::new(
            self.config.bundle_root.clone(),
            self.generator.clone(),
        ));

        CoordState {
            registry,
            tracker,
            meetings,
            selector: self.selector.clone(),
            bundles,
            config: Arc::new(self.config.clone()),
        }
    }

    pub async fn serve(self) -> Result<()> {
        tracing::info!("Starting coordinator");
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!("  Advertised: {}", self.config.advertise_url);
        tracing::info!("  Bundle root: {}", self.config.bundle_root.display());
        tracing::info!(
            "  Heartbeat timeout: {}s, check interval: {}s",
            self.config.heartbeat_timeout_secs,
            self.config.check_interval_secs
        );

        tokio::fs::create_dir_all(&self.config.bundle_root).await?;

        let state = self.build_state();

        // Supervised liveness sweep, joined on shutdown
        let monitor = LivenessMonitor::new(state.registry.clone(), self.config.check_interval());
        let cancel = monitor.cancel_token();
        let monitor_handle = monitor.start();

        let router = create_router(state);
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!("✓ Coordinator ready");

        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        cancel.cancel();
        if let Err(e) = monitor_handle.await {
            tracing::error!("Liveness monitor task error on shutdown: {}", e);
        }

        Ok(())
    }
}
