//! HTTP API for a replica node
//!
//! Replicas expose the bundle download endpoint the coordinator redirects
//! to, plus a status page used by operators to inspect what the node holds.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;

use crate::common::{Error, METRICS};
use crate::node::store::BundleStore;
use crate::node::sync::SyncEngine;

/// Shared replica state for HTTP handlers.
#[derive(Clone)]
pub struct NodeState {
    pub engine: Arc<SyncEngine>,
    pub store: Arc<BundleStore>,
    pub node_id: String,
    pub address: String,
    pub coordinator_url: String,
    pub started_at: Instant,
}

fn error_response(err: &Error) -> Response {
    (
        err.to_http_status(),
        Json(json!({ "status": "error", "message": err.to_string() })),
    )
        .into_response()
}

/// Serve a meeting's bundle from local storage. If the poll loop has not
/// picked the meeting up yet, fetch it from the coordinator on demand
/// before answering, so a fast redirect never 404s against a slow poller.
async fn download_package(
    State(state): State<NodeState>,
    Path(meeting_id): Path<String>,
) -> Response {
    if !state.store.has(&meeting_id) {
        if let Err(e) = state.engine.fetch_on_demand(&meeting_id).await {
            tracing::warn!(
                "On-demand fetch failed for meeting {}: {}",
                meeting_id,
                e
            );
            return error_response(&Error::BundleUnavailable(format!(
                "meeting {} not held and fetch failed",
                meeting_id
            )));
        }
    }

    let path = state.store.bundle_path(&meeting_id);
    let file = match tokio::fs::File::open(&path).await {
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

/// Operator status page: identity, sync bookkeeping and storage usage.
async fn node_status(State(state): State<NodeState>) -> impl IntoResponse {
    let (disk_count, disk_bytes) = state.store.disk_usage();
    Json(json!({
        "node_id": state.node_id,
        "address": state.address,
        "coordinator": state.coordinator_url,
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "last_status_token": state.engine.last_token(),
        "last_sync_cycle": state.engine.last_cycle_at(),
        "last_sync_error": state.engine.last_error(),
        "meetings": state.engine.meeting_details(),
        "storage": {
            "tracked_meetings": state.store.len(),
            "tracked_bytes": state.store.tracked_bytes(),
            "disk_bundles": disk_count,
            "disk_bytes": disk_bytes,
        },
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health(State(state): State<NodeState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "role": "node",
        "node_id": state.node_id,
        "synced_meetings": state.store.len(),
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

/// Creates the HTTP router with all replica endpoints.
pub fn create_router(state: NodeState) -> Router {
    Router::new()
        .route(
            "/api/v1/meetings/:meeting_id/download-package",
            axum::routing::get(download_package),
        )
        .route("/api/status", axum::routing::get(node_status))
        .route("/health", axum::routing::get(health))
        .route("/metrics", axum::routing::get(metrics))
        .layer(axum::middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
