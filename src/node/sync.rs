//! Bundle synchronization engine
//!
//! Polls the coordinator's active-meeting status at a fixed interval and
//! mirrors every active meeting's bundle into the local store. A cycle is
//! skipped entirely when the change token and the active id set both match
//! what was seen last time and nothing is left pending; a failed download
//! leaves the meeting pending, which forces the next cycle to retry it.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};

use futures_util::FutureExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::common::{format_bytes, retry_fixed, timestamp_now, NodeConfig, Result, METRICS};
use crate::coordinator::registry::MeetingRef;
use crate::node::client::CoordinatorClient;
use crate::node::store::{checksum_file, BundleStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Pending,
    Synced,
}

#[derive(Debug, Clone)]
struct TrackedMeeting {
    title: Option<String>,
    state: SyncState,
}

#[derive(Default)]
struct EngineState {
    last_token: Option<String>,
    tracked: HashMap<String, TrackedMeeting>,
    last_cycle_at: Option<u64>,
    last_error: Option<String>,
}

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Token and active set unchanged, nothing pending
    Unchanged,
    /// Processed the active set; counts of (synced, failed) this cycle
    Applied { synced: usize, failed: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingSyncDetail {
    pub meeting_id: String,
    pub title: Option<String>,
    pub state: SyncState,
    pub size: Option<u64>,
    pub checksum: Option<String>,
    pub synced_at: Option<u64>,
}

pub struct SyncEngine {
    client: Arc<CoordinatorClient>,
    store: Arc<BundleStore>,
    config: NodeConfig,
    state: RwLock<EngineState>,
}

impl SyncEngine {
    pub fn new(client: Arc<CoordinatorClient>, store: Arc<BundleStore>, config: NodeConfig) -> Self {
        Self {
            client,
            store,
            config,
            state: RwLock::new(EngineState::default()),
        }
    }

    /// Poll once and reconcile the local store against the active set.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let status = self.client.meeting_status().await?;
        let current: Vec<MeetingRef> = status.active_meetings;
        let current_ids: HashSet<String> = current.iter().map(|m| m.id.clone()).collect();

        // Skip check against the last cycle's bookkeeping
        {
            let state = self.state.read().unwrap();
            let tracked_ids: HashSet<String> = state.tracked.keys().cloned().collect();
            let any_pending = state
                .tracked
                .values()
                .any(|t| t.state == SyncState::Pending);
            if state.last_token.as_deref() == Some(status.id.as_str())
                && tracked_ids == current_ids
                && !any_pending
            {
                tracing::debug!("Meeting status unchanged (token {}), skipping", status.id);
                return Ok(CycleOutcome::Unchanged);
            }
        }

        // Reconcile tracking: drop ended meetings, admit new ones as pending
        let to_sync: Vec<MeetingRef> = {
            let mut state = self.state.write().unwrap();
            state.last_token = Some(status.id.clone());

            let ended: Vec<String> = state
                .tracked
                .keys()
                .filter(|id| !current_ids.contains(*id))
                .cloned()
                .collect();
            for id in &ended {
                state.tracked.remove(id);
                self.store.drop_tracking(id);
            }

            for meeting in &current {
                state
                    .tracked
                    .entry(meeting.id.clone())
                    .or_insert_with(|| TrackedMeeting {
                        title: meeting.title.clone(),
                        state: SyncState::Pending,
                    });
            }

            current
                .iter()
                .filter(|m| {
                    state
                        .tracked
                        .get(&m.id)
                        .map(|t| t.state == SyncState::Pending)
                        .unwrap_or(false)
                })
                .cloned()
                .collect()
        };

        let mut synced = 0usize;
        let mut failed = 0usize;
        let mut last_error = None;
        for meeting in &to_sync {
            match self.sync_meeting(meeting).await {
                Ok(size) => {
                    synced += 1;
                    let mut state = self.state.write().unwrap();
                    if let Some(t) = state.tracked.get_mut(&meeting.id) {
                        t.state = SyncState::Synced;
                    }
                    tracing::info!(
                        "Synced meeting {} ({})",
                        meeting.id,
                        format_bytes(size)
                    );
                }
                Err(e) => {
                    failed += 1;
                    METRICS.sync_failures.inc();
                    tracing::warn!("Sync failed for meeting {}: {}", meeting.id, e);
                    last_error = Some(e.to_string());
                }
            }
        }

        {
            let mut state = self.state.write().unwrap();
            state.last_cycle_at = Some(timestamp_now());
            state.last_error = last_error;
        }

        Ok(CycleOutcome::Applied { synced, failed })
    }

    /// Download one meeting's bundle (with bounded retries), checksum it
    /// and record it in the store. Returns the byte count.
    async fn sync_meeting(&self, meeting: &MeetingRef) -> Result<u64> {
        let dest = self.store.bundle_path(&meeting.id);

        let client = self.client.clone();
        let meeting_id = meeting.id.clone();
        let dest_dl = dest.clone();
        let size = retry_fixed(
            move || {
                let client = client.clone();
                let meeting_id = meeting_id.clone();
                let dest = dest_dl.clone();
                async move { client.download_bundle(&meeting_id, &dest).await }
            },
            self.config.network.retry_count,
            self.config.network.retry_delay(),
        )
        .await?;

        let checksum_path = dest.clone();
        let checksum = tokio::task::spawn_blocking(move || checksum_file(&checksum_path))
            .await
            .map_err(|e| crate::common::Error::Internal(format!("checksum task: {}", e)))??;

        self.store
            .record_synced(&meeting.id, meeting.title.clone(), size, checksum);
        METRICS.bundles_synced.inc();
        METRICS.bytes_downloaded.add(size);
        Ok(size)
    }

    /// One-shot fetch for a bundle this node does not hold, used when a
    /// download request arrives ahead of the poll loop.
    pub async fn fetch_on_demand(&self, meeting_id: &str) -> Result<()> {
        if self.store.has(meeting_id) {
            return Ok(());
        }
        tracing::info!("On-demand fetch for meeting {}", meeting_id);
        let meeting = MeetingRef {
            id: meeting_id.to_string(),
            title: None,
        };
        self.sync_meeting(&meeting).await?;

        let mut state = self.state.write().unwrap();
        state.tracked.insert(
            meeting_id.to_string(),
            TrackedMeeting {
                title: None,
                state: SyncState::Synced,
            },
        );
        Ok(())
    }

    /// `(active_meetings, synced_meeting_ids)` for the heartbeat payload.
    pub fn heartbeat_snapshot(&self) -> (Vec<MeetingRef>, Vec<String>) {
        let state = self.state.read().unwrap();
        let mut active: Vec<MeetingRef> = state
            .tracked
            .iter()
            .map(|(id, t)| MeetingRef {
                id: id.clone(),
                title: t.title.clone(),
            })
            .collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));

        let mut synced: Vec<String> = state
            .tracked
            .iter()
            .filter(|(_, t)| t.state == SyncState::Synced)
            .map(|(id, _)| id.clone())
            .collect();
        synced.sort();
        (active, synced)
    }

    /// Per-meeting detail for the status endpoint.
    pub fn meeting_details(&self) -> Vec<MeetingSyncDetail> {
        let state = self.state.read().unwrap();
        let mut out: Vec<MeetingSyncDetail> = state
            .tracked
            .iter()
            .map(|(id, t)| {
                let record = self.store.get(id);
                MeetingSyncDetail {
                    meeting_id: id.clone(),
                    title: t
                        .title
                        .clone()
                        .or_else(|| record.as_ref().and_then(|r| r.title.clone())),
                    state: t.state,
                    size: record.as_ref().map(|r| r.size),
                    checksum: record.as_ref().map(|r| r.checksum.clone()),
                    synced_at: record.as_ref().map(|r| r.synced_at),
                }
            })
            .collect();
        out.sort_by(|a, b| a.meeting_id.cmp(&b.meeting_id));
        out
    }

    pub fn last_token(&self) -> Option<String> {
        self.state.read().unwrap().last_token.clone()
    }

    pub fn last_cycle_at(&self) -> Option<u64> {
        self.state.read().unwrap().last_cycle_at
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.read().unwrap().last_error.clone()
    }

    /// Poll loop. Individual cycle failures are logged and retried on the
    /// next tick; a panic inside a cycle must not kill the task.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut timer = tokio::time::interval(self.config.sync_interval());
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Sync engine stopping");
                    return;
                }
                _ = timer.tick() => {
                    let result = AssertUnwindSafe(self.run_cycle()).catch_unwind().await;
                    match result {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => {
                            tracing::warn!("Sync cycle failed: {}", e);
                            let mut state = self.state.write().unwrap();
                            state.last_error = Some(e.to_string());
                        }
                        Err(_) => tracing::error!("Sync cycle panicked"),
                    }
                }
            }
        }
    }
}
