//! HTTP API for the coordinator
//!
//! This module provides:
//! - Node registration / heartbeat / listing endpoints consumed by replicas
//! - The active-meetings status endpoint replicas poll against
//! - The download router (302 to a live replica, local stream fallback)
//! - Meeting admin endpoints to drive status transitions
//! - Health and Prometheus metrics endpoints

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::common::utils::{encode_id, timestamp_now_f64};
use crate::common::{CoordinatorConfig, Error, METRICS};
use crate::coordinator::bundle::BundleProvider;
use crate::coordinator::meetings::MeetingDirectory;
use crate::coordinator::registry::{MeetingRef, NodeRegistry};
use crate::coordinator::selector::NodeSelector;
use crate::coordinator::sync_status::SyncStatusTracker;

/// Shared coordinator state for HTTP handlers.
#[derive(Clone)]
pub struct CoordState {
    pub registry: Arc<NodeRegistry>,
    pub tracker: Arc<SyncStatusTracker>,
    pub meetings: Arc<MeetingDirectory>,
    pub selector: Arc<dyn NodeSelector>,
    pub bundles: Arc<BundleProvider>,
    pub config: Arc<CoordinatorConfig>,
}

fn error_response(err: &Error) -> Response {
    (
        err.to_http_status(),
        Json(json!({ "status": "error", "message": err.to_string() })),
    )
        .into_response()
}

// ============================================================================
// Node registration and heartbeat
// ============================================================================

#[derive(Debug, Deserialize)]
struct NodeRegistration {
    node_id: String,
    address: String,
    #[serde(default)]
    #[allow(dead_code)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NodeUnregistration {
    node_id: String,
}

#[derive(Debug, Deserialize)]
struct NodeHeartbeat {
    node_id: String,
    /// Used to auto-re-register the node when it was evicted
    address: String,
    #[serde(default)]
    #[allow(dead_code)]
    status: Option<String>,
    #[serde(default)]
    active_meetings: Vec<MeetingRef>,
    #[serde(default)]
    synced_meetings: Vec<String>,
}

async fn register_node(
    State(state): State<CoordState>,
    Json(req): Json<NodeRegistration>,
) -> impl IntoResponse {
    if !state.registry.register(&req.node_id, &req.address) {
        return error_response(&Error::InvalidNode("empty node_id or address".into()));
    }
    METRICS.nodes_registered.inc();
    METRICS.live_nodes.set(state.registry.live_nodes().len() as u64);
    Json(json!({
        "status": "success",
        "message": format!("Node {} registered", req.node_id)
    }))
    .into_response()
}

async fn unregister_node(
    State(state): State<CoordState>,
    Json(req): Json<NodeUnregistration>,
) -> impl IntoResponse {
    if !state.registry.unregister(&req.node_id) {
        return error_response(&Error::NodeUnknown(req.node_id));
    }
    state.tracker.remove_node(&req.node_id);
    METRICS.live_nodes.set(state.registry.live_nodes().len() as u64);
    Json(json!({
        "status": "success",
        "message": format!("Node {} unregistered", req.node_id)
    }))
    .into_response()
}

/// Accept a heartbeat, auto-re-registering the node if it was evicted.
/// The re-applied active/synced fields come from the same payload, so the
/// coordinator's view is restored within a single call.
async fn node_heartbeat(
    State(state): State<CoordState>,
    Json(req): Json<NodeHeartbeat>,
) -> impl IntoResponse {
    let accepted = state
        .registry
        .heartbeat(&req.node_id, Some(req.active_meetings.clone()));

    if !accepted {
        tracing::info!("Unknown node {}, attempting auto-re-register", req.node_id);
        if !state.registry.register(&req.node_id, &req.address) {
            return error_response(&Error::InvalidNode(format!(
                "cannot re-register node {}",
                req.node_id
            )));
        }
        METRICS.nodes_registered.inc();
        state
            .registry
            .heartbeat(&req.node_id, Some(req.active_meetings.clone()));
    }

    let active_ids: Vec<String> = req.active_meetings.iter().map(|m| m.id.clone()).collect();
    state
        .tracker
        .apply_report(&req.node_id, &active_ids, &req.synced_meetings);

    METRICS.heartbeats_received.inc();
    METRICS.live_nodes.set(state.registry.live_nodes().len() as u64);

    Json(json!({
        "status": "success",
        "timestamp": timestamp_now_f64()
    }))
    .into_response()
}

async fn list_nodes(State(state): State<CoordState>) -> impl IntoResponse {
    Json(state.registry.live_nodes())
}

async fn available_nodes(State(state): State<CoordState>) -> impl IntoResponse {
    let nodes = state.registry.live_addresses();
    Json(json!({ "count": nodes.len(), "nodes": nodes }))
}

// ============================================================================
// Meeting activity polling
// ============================================================================

/// Replica-facing poll endpoint. The `id` token changes only when a
/// meeting transitions into the active state, so an unchanged token lets
/// pollers skip all sync work for the cycle.
async fn meeting_status_for_node(State(state): State<CoordState>) -> impl IntoResponse {
    let active = state.meetings.active_meetings();
    Json(json!({
        "id": state.meetings.status_token(),
        "active_meetings": active,
        "timestamp": timestamp_now_f64()
    }))
}

// ============================================================================
// Download routing
// ============================================================================

/// Redirect to a live replica, or stream the bundle locally when no
/// replica is live. Downloads are only distributed for active meetings.
async fn download_package(
    State(state): State<CoordState>,
    Path(meeting_id): Path<String>,
) -> Response {
    let meeting = match state.meetings.get(&meeting_id) {
        Some(m) => m,
        None => return error_response(&Error::MeetingNotFound(meeting_id)),
    };
    if !meeting.is_active() {
        return error_response(&Error::MeetingNotActive(meeting_id));
    }

    let path = match state.bundles.ensure(&state.meetings, &meeting_id).await {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };

    let candidates = state.registry.live_addresses();
    if let Some(addr) = state.selector.select(&candidates) {
        let url = format!(
            "http://{}/api/v1/meetings/{}/download-package",
            addr,
            encode_id(&meeting_id)
        );
        tracing::info!("Redirecting download of meeting {} to {}", meeting_id, addr);
        METRICS.downloads_redirected.inc();
        return (StatusCode::FOUND, [(header::LOCATION, url)]).into_response();
    }

    tracing::info!(
        "No live nodes, serving meeting {} bundle locally",
        meeting_id
    );
    METRICS.downloads_direct.inc();
    serve_bundle_file(&meeting_id, &path).await
}

/// Non-redirecting variant, used by replicas (and redirect targets) to
/// avoid loops.
async fn download_package_direct(
    State(state): State<CoordState>,
    Path(meeting_id): Path<String>,
) -> Response {
    if state.meetings.get(&meeting_id).is_none() {
        return error_response(&Error::MeetingNotFound(meeting_id));
    }

    let path = match state.bundles.ensure(&state.meetings, &meeting_id).await {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };

    METRICS.downloads_direct.inc();
    serve_bundle_file(&meeting_id, &path).await
}

async fn serve_bundle_file(meeting_id: &str, path: &std::path::Path) -> Response {
    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) => {
            return error_response(&Error::BundleUnavailable(format!(
                "cannot open bundle for meeting {}: {}",
                meeting_id, e
            )))
        }
    };

    let len = file.metadata().await.ok().map(|m| m.len());
    let stream = ReaderStream::new(file);
    let filename = format!("meeting_{}.zip", meeting_id);

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        );
    if let Some(len) = len {
        response = response.header(header::CONTENT_LENGTH, len);
    }
    response
        .body(Body::from_stream(stream))
        .unwrap_or_else(|e| error_response(&Error::Internal(e.to_string())))
}

#[derive(Debug, Serialize)]
struct BundleEndpoint {
    kind: &'static str,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    synced: Option<bool>,
}

/// Diagnostic listing of every endpoint currently able to serve the
/// meeting's bundle, with per-node sync flags.
async fn download_nodes_info(
    State(state): State<CoordState>,
    Path(meeting_id): Path<String>,
) -> Response {
    if state.meetings.get(&meeting_id).is_none() {
        return error_response(&Error::MeetingNotFound(meeting_id));
    }

    let mut endpoints = vec![BundleEndpoint {
        kind: "coordinator",
        url: format!(
            "{}/api/v1/meetings/{}/download-package-direct",
            state.config.advertise_url.trim_end_matches('/'),
            encode_id(&meeting_id)
        ),
        node_id: None,
        synced: None,
    }];

    for node in state.registry.live_nodes() {
        endpoints.push(BundleEndpoint {
            kind: "node",
            url: format!(
                "http://{}/api/v1/meetings/{}/download-package",
                node.address,
                encode_id(&meeting_id)
            ),
            synced: state.tracker.node_flag(&meeting_id, &node.node_id),
            node_id: Some(node.node_id),
        });
    }

    Json(json!({
        "meeting_id": meeting_id,
        "fully_synced": state.tracker.is_fully_synced(&meeting_id),
        "endpoints": endpoints
    }))
    .into_response()
}

async fn sync_status_overview(State(state): State<CoordState>) -> impl IntoResponse {
    Json(state.tracker.overview())
}

// ============================================================================
// Meeting admin (drives status transitions for operators and tests)
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateMeetingRequest {
    title: String,
    #[serde(default)]
    time: String,
}

async fn create_meeting(
    State(state): State<CoordState>,
    Json(req): Json<CreateMeetingRequest>,
) -> impl IntoResponse {
    let meeting = state.meetings.create(&req.title, &req.time);
    (StatusCode::CREATED, Json(meeting))
}

async fn list_meetings(State(state): State<CoordState>) -> impl IntoResponse {
    Json(state.meetings.list())
}

/// Start a meeting: rotate the change token and begin sync tracking with
/// every registered node marked pending.
async fn start_meeting(
    State(state): State<CoordState>,
    Path(meeting_id): Path<String>,
) -> Response {
    match state.meetings.start(&meeting_id) {
        Ok(meeting) => {
            state.tracker.reset(&meeting_id);
            METRICS.tracked_meetings.set(state.tracker.len() as u64);
            Json(meeting).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// End a meeting and drop its sync tracking.
async fn end_meeting(
    State(state): State<CoordState>,
    Path(meeting_id): Path<String>,
) -> Response {
    match state.meetings.end(&meeting_id) {
        Ok(meeting) => {
            state.tracker.remove(&meeting_id);
            METRICS.tracked_meetings.set(state.tracker.len() as u64);
            Json(meeting).into_response()
        }
        Err(e) => error_response(&e),
    }
}

// ============================================================================
// Health & metrics
// ============================================================================

async fn health(State(state): State<CoordState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "role": "coordinator",
        "live_nodes": state.registry.live_nodes().len(),
        "tracked_meetings": state.tracker.len(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn metrics() -> impl IntoResponse {
    (StatusCode::OK, METRICS.to_prometheus())
}

/// Per-endpoint request counters and latency histogram.
async fn track_metrics(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let path = req.uri().path().to_string();
    let start = std::time::Instant::now();
    let response = next.run(req).await;
    METRICS.record_request(&path, start.elapsed(), response.status().is_success());
    response
}

/// Creates the HTTP router with all coordinator endpoints.
pub fn create_router(state: CoordState) -> Router {
    Router::new()
        // Node registry
        .route("/api/v1/nodes/register", axum::routing::post(register_node))
        .route(
            "/api/v1/nodes/unregister",
            axum::routing::post(unregister_node),
        )
        .route(
            "/api/v1/nodes/heartbeat",
            axum::routing::post(node_heartbeat),
        )
        .route("/api/v1/nodes/list", axum::routing::get(list_nodes))
        .route("/api/v1/nodes/available", axum::routing::get(available_nodes))
        // Meeting activity polling
        .route(
            "/api/v1/meetings/status/node",
            axum::routing::get(meeting_status_for_node),
        )
        // Bundle distribution
        .route(
            "/api/v1/meetings/:meeting_id/download-package",
            axum::routing::get(download_package),
        )
        .route(
            "/api/v1/meetings/:meeting_id/download-package-direct",
            axum::routing::get(download_package_direct),
        )
        .route(
            "/api/v1/meetings/:meeting_id/download-nodes-info",
            axum::routing::get(download_nodes_info),
        )
        .route(
            "/api/v1/meetings/sync-status",
            axum::routing::get(sync_status_overview),
        )
        // Meeting admin
        .route(
            "/api/v1/meetings",
            axum::routing::post(create_meeting).get(list_meetings),
        )
        .route(
            "/api/v1/meetings/:meeting_id/start",
            axum::routing::post(start_meeting),
        )
        .route(
            "/api/v1/meetings/:meeting_id/end",
            axum::routing::post(end_meeting),
        )
        // Health & metrics
        .route("/health", axum::routing::get(health))
        .route("/metrics", axum::routing::get(metrics))
        .layer(axum::middleware::from_fn(track_metrics))
        // Heartbeats and admin calls are small JSON payloads
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
