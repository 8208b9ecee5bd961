//! Coordinator HTTP API integration tests

use std::time::Duration;

use meetsync::common::CoordinatorConfig;
use meetsync::coordinator::http::{create_router, CoordState};
use meetsync::coordinator::liveness::LivenessMonitor;
use meetsync::Coordinator;
use tempfile::TempDir;

async fn spawn_coordinator(config: CoordinatorConfig) -> (String, CoordState) {
    let state = Coordinator::new(config).build_state();
    let router = create_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

fn test_config(bundle_root: &TempDir) -> CoordinatorConfig {
    CoordinatorConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        advertise_url: "http://127.0.0.1:5000".to_string(),
        bundle_root: bundle_root.path().to_path_buf(),
        heartbeat_timeout_secs: 30,
        check_interval_secs: 1,
    }
}

/// Stage a started meeting with a real bundle file; returns the id.
fn stage_active_meeting(state: &CoordState, bundle_root: &TempDir, body: &[u8]) -> String {
    let meeting = state.meetings.create("Quarterly review", "2026-08-26 09:00");
    let staged = bundle_root.path().join(format!("meeting_{}.zip", meeting.id));
    std::fs::write(&staged, body).unwrap();
    state.meetings.set_package_path(&meeting.id, staged).unwrap();
    state.meetings.start(&meeting.id).unwrap();
    state.tracker.reset(&meeting.id);
    meeting.id
}

#[tokio::test]
async fn test_register_heartbeat_and_listing() {
    let dir = TempDir::new().unwrap();
    let (base, _state) = spawn_coordinator(test_config(&dir)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/v1/nodes/register", base))
        .json(&serde_json::json!({
            "node_id": "node-a",
            "address": "127.0.0.1:8001",
            "status": "online"
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let resp = client
        .post(format!("{}/api/v1/nodes/heartbeat", base))
        .json(&serde_json::json!({
            "node_id": "node-a",
            "address": "127.0.0.1:8001",
            "active_meetings": [{"id": "m1", "title": "Standup"}],
            "synced_meetings": ["m1"]
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert!(body["timestamp"].as_f64().unwrap() > 0.0);

    let nodes: serde_json::Value = client
        .get(format!("{}/api/v1/nodes/list", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(nodes.as_array().unwrap().len(), 1);
    assert_eq!(nodes[0]["node_id"], "node-a");
    assert_eq!(nodes[0]["active_meeting"], "Standup");

    let available: serde_json::Value = client
        .get(format!("{}/api/v1/nodes/available", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(available["count"], 1);
    assert_eq!(available["nodes"][0], "127.0.0.1:8001");
}

#[tokio::test]
async fn test_heartbeat_auto_reregisters_unknown_node() {
    let dir = TempDir::new().unwrap();
    let (base, state) = spawn_coordinator(test_config(&dir)).await;
    let client = reqwest::Client::new();

    // Never registered; heartbeat carries enough to re-create the record
    let resp = client
        .post(format!("{}/api/v1/nodes/heartbeat", base))
        .json(&serde_json::json!({
            "node_id": "node-lost",
            "address": "127.0.0.1:8002",
            "active_meetings": [{"id": "m1", "title": "Standup"}],
            "synced_meetings": []
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    assert!(state.registry.contains("node-lost"));
    let nodes = state.registry.live_nodes();
    assert_eq!(nodes[0].address, "127.0.0.1:8002");
    // The same call restored the meeting report
    assert_eq!(nodes[0].active_meetings.len(), 1);
}

#[tokio::test]
async fn test_unregister_unknown_node_404() {
    let dir = TempDir::new().unwrap();
    let (base, _state) = spawn_coordinator(test_config(&dir)).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/v1/nodes/unregister", base))
        .json(&serde_json::json!({ "node_id": "ghost" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_token_lifecycle() {
    let dir = TempDir::new().unwrap();
    let (base, _state) = spawn_coordinator(test_config(&dir)).await;
    let client = reqwest::Client::new();
    let status_url = format!("{}/api/v1/meetings/status/node", base);

    let body: serde_json::Value = client.get(&status_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["id"], "none");
    assert!(body["active_meetings"].as_array().unwrap().is_empty());

    // Create + start a meeting through the API
    let meeting: serde_json::Value = client
        .post(format!("{}/api/v1/meetings", base))
        .json(&serde_json::json!({ "title": "Budget review", "time": "2026-08-26 09:00" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let meeting_id = meeting["id"].as_str().unwrap().to_string();

    let body: serde_json::Value = client.get(&status_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["id"], "none", "scheduled meeting must not rotate token");

    client
        .post(format!("{}/api/v1/meetings/{}/start", base, meeting_id))
        .send()
        .await
        .unwrap();

    let body: serde_json::Value = client.get(&status_url).send().await.unwrap().json().await.unwrap();
    let token = body["id"].as_str().unwrap().to_string();
    assert_ne!(token, "none");
    assert_eq!(body["active_meetings"][0]["id"], meeting_id.as_str());

    // Polling is read-only
    let body: serde_json::Value = client.get(&status_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["id"], token.as_str());

    client
        .post(format!("{}/api/v1/meetings/{}/end", base, meeting_id))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = client.get(&status_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["id"], "none");
}

#[tokio::test]
async fn test_download_redirects_to_live_node() {
    let dir = TempDir::new().unwrap();
    let (base, state) = spawn_coordinator(test_config(&dir)).await;
    let meeting_id = stage_active_meeting(&state, &dir, b"zip-bytes");

    state.registry.register("node-a", "127.0.0.1:8001");

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let resp = client
        .get(format!(
            "{}/api/v1/meetings/{}/download-package",
            base, meeting_id
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::FOUND);
    let location = resp.headers()["location"].to_str().unwrap();
    assert_eq!(
        location,
        format!(
            "http://127.0.0.1:8001/api/v1/meetings/{}/download-package",
            meeting_id
        )
    );
}

#[tokio::test]
async fn test_download_served_locally_without_nodes() {
    let dir = TempDir::new().unwrap();
    let (base, state) = spawn_coordinator(test_config(&dir)).await;
    let meeting_id = stage_active_meeting(&state, &dir, b"zip-bytes");

    let resp = reqwest::get(format!(
        "{}/api/v1/meetings/{}/download-package",
        base, meeting_id
    ))
    .await
    .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/zip"
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"zip-bytes");
}

#[tokio::test]
async fn test_direct_download_never_redirects() {
    let dir = TempDir::new().unwrap();
    let (base, state) = spawn_coordinator(test_config(&dir)).await;
    let meeting_id = stage_active_meeting(&state, &dir, b"zip-bytes");
    state.registry.register("node-a", "127.0.0.1:8001");

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let resp = client
        .get(format!(
            "{}/api/v1/meetings/{}/download-package-direct",
            base, meeting_id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"zip-bytes");
}

#[tokio::test]
async fn test_download_errors() {
    let dir = TempDir::new().unwrap();
    let (base, state) = spawn_coordinator(test_config(&dir)).await;

    // Unknown meeting
    let resp = reqwest::get(format!(
        "{}/api/v1/meetings/ghost/download-package",
        base
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    // Known but never started
    let meeting = state.meetings.create("Scheduled only", "2026-08-26 09:00");
    let resp = reqwest::get(format!(
        "{}/api/v1/meetings/{}/download-package",
        base, meeting.id
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_nodes_info_lists_endpoints() {
    let dir = TempDir::new().unwrap();
    let (base, state) = spawn_coordinator(test_config(&dir)).await;
    let meeting_id = stage_active_meeting(&state, &dir, b"zip-bytes");

    state.registry.register("node-a", "127.0.0.1:8001");
    state.tracker.update("node-a", &meeting_id, true);

    let info: serde_json::Value = reqwest::get(format!(
        "{}/api/v1/meetings/{}/download-nodes-info",
        base, meeting_id
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();

    assert_eq!(info["meeting_id"], meeting_id.as_str());
    assert_eq!(info["fully_synced"], true);
    let endpoints = info["endpoints"].as_array().unwrap();
    assert_eq!(endpoints.len(), 2);
    assert_eq!(endpoints[0]["kind"], "coordinator");
    assert_eq!(endpoints[1]["kind"], "node");
    assert_eq!(endpoints[1]["node_id"], "node-a");
    assert_eq!(endpoints[1]["synced"], true);
}

#[tokio::test]
async fn test_eviction_then_recovery_via_heartbeat() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.heartbeat_timeout_secs = 1;
    let (base, state) = spawn_coordinator(config).await;
    let client = reqwest::Client::new();

    state.registry.register("node-a", "127.0.0.1:8001");
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(LivenessMonitor::sweep(&state.registry), 1);
    assert!(!state.registry.contains("node-a"));

    // The node's next heartbeat brings it straight back
    let resp = client
        .post(format!("{}/api/v1/nodes/heartbeat", base))
        .json(&serde_json::json!({
            "node_id": "node-a",
            "address": "127.0.0.1:8001",
            "active_meetings": [],
            "synced_meetings": []
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert!(state.registry.contains("node-a"));
}

#[tokio::test]
async fn test_health_and_metrics() {
    let dir = TempDir::new().unwrap();
    let (base, _state) = spawn_coordinator(test_config(&dir)).await;

    let health: serde_json::Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["role"], "coordinator");

    let metrics = reqwest::get(format!("{}/metrics", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("meetsync_"));
}
