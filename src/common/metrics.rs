//! Prometheus-compatible metrics
//!
//! This module provides metrics for both coordinator and replica roles:
//! - Request latency histograms per endpoint
//! - Heartbeat / eviction / download counters
//! - Bundle sync counters

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Histogram bucket boundaries for latency measurements (in milliseconds)
const LATENCY_BUCKETS: [f64; 11] = [
    1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0,
];

/// A simple histogram implementation for latency tracking
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    boundaries: Vec<f64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Create a new histogram with default latency buckets
    pub fn new() -> Self {
        Self::with_buckets(&LATENCY_BUCKETS)
    }

    /// Create a histogram with custom bucket boundaries
    pub fn with_buckets(boundaries: &[f64]) -> Self {
        let mut buckets = Vec::with_capacity(boundaries.len() + 1);
        for _ in 0..=boundaries.len() {
            buckets.push(AtomicU64::new(0));
        }
        Self {
            buckets,
            boundaries: boundaries.to_vec(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a value in the histogram
    pub fn observe(&self, value: f64) {
        let mut bucket_idx = self.boundaries.len();
        for (i, &boundary) in self.boundaries.iter().enumerate() {
            if value <= boundary {
                bucket_idx = i;
                break;
            }
        }

        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
        self.sum
            .fetch_add((value * 1000.0) as u64, Ordering::Relaxed); // Store as microseconds for precision
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get histogram data for Prometheus format
    pub fn get_buckets(&self) -> Vec<(f64, u64)> {
        let mut cumulative = 0u64;
        let mut result = Vec::with_capacity(self.boundaries.len() + 1);

        for (i, &boundary) in self.boundaries.iter().enumerate() {
            cumulative += self.buckets[i].load(Ordering::Relaxed);
            result.push((boundary, cumulative));
        }

        // +Inf bucket
        cumulative += self.buckets[self.boundaries.len()].load(Ordering::Relaxed);
        result.push((f64::INFINITY, cumulative));

        result
    }

    /// Get sum of all observed values
    pub fn sum(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64 / 1000.0
    }

    /// Get count of observations
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter for tracking event counts
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Gauge for tracking current values
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn set(&self, v: u64) {
        self.value.store(v, Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Endpoint metrics
#[derive(Debug)]
pub struct EndpointMetrics {
    pub requests_total: Counter,
    pub requests_success: Counter,
    pub requests_error: Counter,
    pub latency: Histogram,
}

impl EndpointMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: Counter::new(),
            requests_success: Counter::new(),
            requests_error: Counter::new(),
            latency: Histogram::new(),
        }
    }
}

impl Default for EndpointMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Global metrics registry
#[derive(Debug)]
pub struct MetricsRegistry {
    /// Per-endpoint metrics
    endpoints: Mutex<HashMap<String, Arc<EndpointMetrics>>>,

    /// Coordinator-side counters
    pub heartbeats_received: Counter,
    pub nodes_registered: Counter,
    pub nodes_evicted: Counter,
    pub downloads_redirected: Counter,
    pub downloads_direct: Counter,

    /// Replica-side counters
    pub heartbeats_sent: Counter,
    pub heartbeat_failures: Counter,
    pub bundles_synced: Counter,
    pub sync_failures: Counter,
    pub bytes_downloaded: Counter,

    /// Gauges
    pub live_nodes: Gauge,
    pub tracked_meetings: Gauge,

    /// Start time for uptime calculation
    start_time: Instant,
}

impl MetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Self {
        Self {
            endpoints: Mutex::new(HashMap::new()),
            heartbeats_received: Counter::new(),
            nodes_registered: Counter::new(),
            nodes_evicted: Counter::new(),
            downloads_redirected: Counter::new(),
            downloads_direct: Counter::new(),
            heartbeats_sent: Counter::new(),
            heartbeat_failures: Counter::new(),
            bundles_synced: Counter::new(),
            sync_failures: Counter::new(),
            bytes_downloaded: Counter::new(),
            live_nodes: Gauge::new(),
            tracked_meetings: Gauge::new(),
            start_time: Instant::now(),
        }
    }

    /// Get or create metrics for an endpoint
    pub fn endpoint(&self, path: &str) -> Arc<EndpointMetrics> {
        let mut endpoints = self.endpoints.lock().unwrap();
        endpoints
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(EndpointMetrics::new()))
            .clone()
    }

    /// Record a request
    pub fn record_request(&self, path: &str, duration: Duration, success: bool) {
        let endpoint = self.endpoint(path);

        endpoint.requests_total.inc();
        endpoint.latency.observe(duration.as_secs_f64() * 1000.0);

        if success {
            endpoint.requests_success.inc();
        } else {
            endpoint.requests_error.inc();
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-compatible metrics output
    pub fn to_prometheus(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();

        let counters: [(&str, &str, &Counter); 10] = [
            (
                "meetsync_heartbeats_received_total",
                "Heartbeats accepted by the coordinator",
                &self.heartbeats_received,
            ),
            (
                "meetsync_nodes_registered_total",
                "Node registrations (including re-registrations)",
                &self.nodes_registered,
            ),
            (
                "meetsync_nodes_evicted_total",
                "Nodes evicted by the liveness sweep",
                &self.nodes_evicted,
            ),
            (
                "meetsync_downloads_redirected_total",
                "Bundle downloads redirected to a replica",
                &self.downloads_redirected,
            ),
            (
                "meetsync_downloads_direct_total",
                "Bundle downloads served from local storage",
                &self.downloads_direct,
            ),
            (
                "meetsync_heartbeats_sent_total",
                "Heartbeats sent by this node",
                &self.heartbeats_sent,
            ),
            (
                "meetsync_heartbeat_failures_total",
                "Heartbeat ticks where all attempts failed",
                &self.heartbeat_failures,
            ),
            (
                "meetsync_bundles_synced_total",
                "Bundles downloaded successfully",
                &self.bundles_synced,
            ),
            (
                "meetsync_sync_failures_total",
                "Bundle sync attempts that gave up",
                &self.sync_failures,
            ),
            (
                "meetsync_bytes_downloaded_total",
                "Bundle bytes written to local storage",
                &self.bytes_downloaded,
            ),
        ];

        for (name, help, counter) in counters {
            writeln!(out, "# HELP {} {}", name, help).unwrap();
            writeln!(out, "# TYPE {} counter", name).unwrap();
            writeln!(out, "{} {}", name, counter.get()).unwrap();
        }

        out.push_str("# HELP meetsync_live_nodes Currently live registered nodes\n");
        out.push_str("# TYPE meetsync_live_nodes gauge\n");
        writeln!(out, "meetsync_live_nodes {}", self.live_nodes.get()).unwrap();

        out.push_str("# HELP meetsync_tracked_meetings Meetings with sync tracking\n");
        out.push_str("# TYPE meetsync_tracked_meetings gauge\n");
        writeln!(out, "meetsync_tracked_meetings {}", self.tracked_meetings.get()).unwrap();

        out.push_str("# HELP meetsync_uptime_seconds Server uptime in seconds\n");
        out.push_str("# TYPE meetsync_uptime_seconds gauge\n");
        writeln!(out, "meetsync_uptime_seconds {}", self.uptime_seconds()).unwrap();

        // Per-endpoint metrics
        let endpoints = self.endpoints.lock().unwrap();

        out.push_str("# HELP meetsync_endpoint_requests_total Requests per endpoint\n");
        out.push_str("# TYPE meetsync_endpoint_requests_total counter\n");
        for (path, metrics) in endpoints.iter() {
            writeln!(
                out,
                "meetsync_endpoint_requests_total{{path=\"{}\"}} {}",
                path,
                metrics.requests_total.get()
            )
            .unwrap();
        }

        out.push_str("# HELP meetsync_endpoint_errors_total Errors per endpoint\n");
        out.push_str("# TYPE meetsync_endpoint_errors_total counter\n");
        for (path, metrics) in endpoints.iter() {
            writeln!(
                out,
                "meetsync_endpoint_errors_total{{path=\"{}\"}} {}",
                path,
                metrics.requests_error.get()
            )
            .unwrap();
        }

        out.push_str("# HELP meetsync_request_duration_ms Request duration in milliseconds\n");
        out.push_str("# TYPE meetsync_request_duration_ms histogram\n");
        for (path, metrics) in endpoints.iter() {
            for (le, count) in metrics.latency.get_buckets() {
                if le.is_infinite() {
                    writeln!(
                        out,
                        "meetsync_request_duration_ms_bucket{{path=\"{}\",le=\"+Inf\"}} {}",
                        path, count
                    )
                    .unwrap();
                } else {
                    writeln!(
                        out,
                        "meetsync_request_duration_ms_bucket{{path=\"{}\",le=\"{}\"}} {}",
                        path, le, count
                    )
                    .unwrap();
                }
            }
            writeln!(
                out,
                "meetsync_request_duration_ms_sum{{path=\"{}\"}} {}",
                path,
                metrics.latency.sum()
            )
            .unwrap();
            writeln!(
                out,
                "meetsync_request_duration_ms_count{{path=\"{}\"}} {}",
                path,
                metrics.latency.count()
            )
            .unwrap();
        }

        out
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global metrics instance
pub static METRICS: once_cell::sync::Lazy<MetricsRegistry> =
    once_cell::sync::Lazy::new(MetricsRegistry::new);
