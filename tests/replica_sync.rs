//! End-to-end replica sync tests: a real coordinator serving staged
//! bundles, a replica driven cycle by cycle.

use meetsync::common::{CoordinatorConfig, NodeConfig};
use meetsync::coordinator::http::{create_router, CoordState};
use meetsync::node::server::{ReplicaNode, ReplicaParts};
use meetsync::node::sync::CycleOutcome;
use meetsync::Coordinator;
use tempfile::TempDir;

async fn spawn_coordinator(bundle_root: &TempDir) -> (String, CoordState) {
    let config = CoordinatorConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        advertise_url: "http://127.0.0.1:5000".to_string(),
        bundle_root: bundle_root.path().to_path_buf(),
        heartbeat_timeout_secs: 30,
        check_interval_secs: 1,
    };
    let state = Coordinator::new(config).build_state();
    let router = create_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

fn stage_active_meeting(state: &CoordState, bundle_root: &TempDir, body: &[u8]) -> String {
    let meeting = state.meetings.create("All hands", "2026-08-26 09:00");
    let staged = bundle_root.path().join(format!("meeting_{}.zip", meeting.id));
    std::fs::write(&staged, body).unwrap();
    state.meetings.set_package_path(&meeting.id, staged).unwrap();
    state.meetings.start(&meeting.id).unwrap();
    state.tracker.reset(&meeting.id);
    meeting.id
}

async fn build_replica(coordinator_url: &str, storage: &TempDir) -> ReplicaParts {
    let config = NodeConfig {
        node_id: Some("node-test".to_string()),
        coordinator_url: coordinator_url.to_string(),
        storage_root: storage.path().to_path_buf(),
        advertise_addr: "127.0.0.1:8001".to_string(),
        ..Default::default()
    };
    let parts = ReplicaNode::new(config).build_parts().unwrap();
    parts.store.init().await.unwrap();
    parts
}

#[tokio::test]
async fn test_sync_cycle_downloads_active_bundle() {
    let bundles = TempDir::new().unwrap();
    let storage = TempDir::new().unwrap();
    let (base, coord) = spawn_coordinator(&bundles).await;
    let meeting_id = stage_active_meeting(&coord, &bundles, b"bundle-bytes");

    let replica = build_replica(&base, &storage).await;

    let outcome = replica.engine.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Applied { synced: 1, failed: 0 });

    assert!(replica.store.has(&meeting_id));
    let record = replica.store.get(&meeting_id).unwrap();
    assert_eq!(record.size, b"bundle-bytes".len() as u64);
    assert_eq!(record.title.as_deref(), Some("All hands"));
    assert_eq!(
        std::fs::read(replica.store.bundle_path(&meeting_id)).unwrap(),
        b"bundle-bytes"
    );

    // Nothing changed: the token short-circuits the next cycle
    let outcome = replica.engine.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Unchanged);
}

#[tokio::test]
async fn test_heartbeat_reports_sync_to_coordinator() {
    let bundles = TempDir::new().unwrap();
    let storage = TempDir::new().unwrap();
    let (base, coord) = spawn_coordinator(&bundles).await;
    let meeting_id = stage_active_meeting(&coord, &bundles, b"bundle-bytes");

    let replica = build_replica(&base, &storage).await;
    replica
        .client
        .register("node-test", "127.0.0.1:8001")
        .await
        .unwrap();

    // Before the first sync the heartbeat reports nothing held
    replica.heartbeat.send_once().await.unwrap();
    assert!(!coord.tracker.is_fully_synced(&meeting_id));

    replica.engine.run_cycle().await.unwrap();
    replica.heartbeat.send_once().await.unwrap();
    assert!(coord.tracker.is_fully_synced(&meeting_id));

    // Also visible through the overview endpoint
    let overview: std::collections::HashMap<String, bool> =
        reqwest::get(format!("{}/api/v1/meetings/sync-status", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
    assert_eq!(overview.get(&meeting_id), Some(&true));
}

#[tokio::test]
async fn test_ended_meeting_dropped_but_file_kept() {
    let bundles = TempDir::new().unwrap();
    let storage = TempDir::new().unwrap();
    let (base, coord) = spawn_coordinator(&bundles).await;
    let meeting_id = stage_active_meeting(&coord, &bundles, b"bundle-bytes");

    let replica = build_replica(&base, &storage).await;
    replica.engine.run_cycle().await.unwrap();
    assert!(replica.store.get(&meeting_id).is_some());

    coord.meetings.end(&meeting_id).unwrap();
    coord.tracker.remove(&meeting_id);

    let outcome = replica.engine.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Applied { synced: 0, failed: 0 });

    // Tracking gone, bytes retained
    assert!(replica.store.get(&meeting_id).is_none());
    assert!(replica.store.bundle_path(&meeting_id).exists());

    let (active, synced) = replica.engine.heartbeat_snapshot();
    assert!(active.is_empty());
    assert!(synced.is_empty());
}

#[tokio::test]
async fn test_node_serves_bundle_with_on_demand_fetch() {
    let bundles = TempDir::new().unwrap();
    let storage = TempDir::new().unwrap();
    let (base, coord) = spawn_coordinator(&bundles).await;
    let meeting_id = stage_active_meeting(&coord, &bundles, b"bundle-bytes");

    let replica = build_replica(&base, &storage).await;

    // Mount the node's HTTP API without ever running a sync cycle
    let router = meetsync::node::http::create_router(replica.state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let node_base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // A redirect can land before the poller noticed the meeting; the node
    // fetches the bundle from the coordinator on the spot
    let resp = reqwest::get(format!(
        "{}/api/v1/meetings/{}/download-package",
        node_base, meeting_id
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"bundle-bytes");

    assert!(replica.store.has(&meeting_id));

    // Unknown meetings still 404 at the coordinator and surface here
    let resp = reqwest::get(format!(
        "{}/api/v1/meetings/ghost/download-package",
        node_base
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_node_status_page() {
    let bundles = TempDir::new().unwrap();
    let storage = TempDir::new().unwrap();
    let (base, coord) = spawn_coordinator(&bundles).await;
    let meeting_id = stage_active_meeting(&coord, &bundles, b"bundle-bytes");

    let replica = build_replica(&base, &storage).await;
    replica.engine.run_cycle().await.unwrap();

    let router = meetsync::node::http::create_router(replica.state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let node_base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let status: serde_json::Value = reqwest::get(format!("{}/api/status", node_base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(status["node_id"], "node-test");
    assert_eq!(status["storage"]["tracked_meetings"], 1);
    let meetings = status["meetings"].as_array().unwrap();
    assert_eq!(meetings.len(), 1);
    assert_eq!(meetings[0]["meeting_id"], meeting_id.as_str());
    assert_eq!(meetings[0]["state"], "synced");

    let health: serde_json::Value = reqwest::get(format!("{}/health", node_base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["role"], "node");
}
