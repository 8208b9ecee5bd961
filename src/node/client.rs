//! HTTP client for a replica node's calls to the coordinator
//!
//! Control-plane calls (register, heartbeat, status poll) run under the
//! short connect timeout; bundle downloads get the much longer download
//! timeout and stream to a temp file renamed into place on completion.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::common::{Error, NetworkConfig, Result};
use crate::coordinator::registry::MeetingRef;

#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatPayload {
    pub node_id: String,
    pub address: String,
    pub status: String,
    pub active_meetings: Vec<MeetingRef>,
    pub synced_meetings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeetingStatusResponse {
    /// Change token; compare against the last observed value
    pub id: String,
    #[serde(default)]
    pub active_meetings: Vec<MeetingRef>,
    #[allow(dead_code)]
    #[serde(default)]
    pub timestamp: f64,
}

pub struct CoordinatorClient {
    http: reqwest::Client,
    base_url: String,
    network: NetworkConfig,
}

impl CoordinatorClient {
    pub fn new(base_url: &str, network: NetworkConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(network.connect_timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            network,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json(&self, path: &str, body: &impl Serialize) -> Result<reqwest::Response> {
        let url = self.url(path);
        let resp = self
            .http
            .post(&url)
            .timeout(self.network.connect_timeout())
            .json(body)
            .send()
            .await?;
        Ok(resp)
    }

    pub async fn register(&self, node_id: &str, address: &str) -> Result<()> {
        let resp = self
            .post_json(
                "/api/v1/nodes/register",
                &serde_json::json!({
                    "node_id": node_id,
                    "address": address,
                    "status": "online"
                }),
            )
            .await?;
        if !resp.status().is_success() {
            return Err(Error::UnexpectedStatus {
                status: resp.status().as_u16(),
                url: resp.url().to_string(),
            });
        }
        Ok(())
    }

    pub async fn unregister(&self, node_id: &str) -> Result<()> {
        let resp = self
            .post_json(
                "/api/v1/nodes/unregister",
                &serde_json::json!({ "node_id": node_id }),
            )
            .await?;
        if !resp.status().is_success() {
            return Err(Error::UnexpectedStatus {
                status: resp.status().as_u16(),
                url: resp.url().to_string(),
            });
        }
        Ok(())
    }

    /// Send one heartbeat. A 4xx reply means the coordinator does not know
    /// this node and could not re-register it; the sender then registers
    /// explicitly and resends.
    pub async fn heartbeat(&self, payload: &HeartbeatPayload) -> Result<()> {
        let resp = self.post_json("/api/v1/nodes/heartbeat", payload).await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status.is_client_error() {
            return Err(Error::NodeUnknown(payload.node_id.clone()));
        }
        Err(Error::UnexpectedStatus {
            status: status.as_u16(),
            url: resp.url().to_string(),
        })
    }

    /// Poll the active-meetings endpoint.
    pub async fn meeting_status(&self) -> Result<MeetingStatusResponse> {
        let url = self.url("/api/v1/meetings/status/node");
        let resp = self
            .http
            .get(&url)
            .timeout(self.network.connect_timeout())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::UnexpectedStatus {
                status: resp.status().as_u16(),
                url,
            });
        }
        Ok(resp.json().await?)
    }

    /// Download a meeting's bundle from the non-redirecting endpoint into
    /// `dest`. Streams to `dest.part` and renames on completion so a
    /// half-written bundle is never visible to readers. Returns the byte
    /// count.
    pub async fn download_bundle(&self, meeting_id: &str, dest: &Path) -> Result<u64> {
        let url = self.url(&format!(
            "/api/v1/meetings/{}/download-package-direct",
            crate::common::encode_id(meeting_id)
        ));
        let resp = self
            .http
            .get(&url)
            .timeout(self.network.download_timeout())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::UnexpectedStatus {
                status: resp.status().as_u16(),
                url,
            });
        }

        let tmp = dest.with_extension("zip.part");
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(&tmp).await?;
        let mut stream = resp.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, dest).await?;
        Ok(written)
    }
}
