//! Admin client for coordinator operations
//!
//! Thin typed wrapper over the coordinator's HTTP API, used by the CLI.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::common::{encode_id, Error, Result};
use crate::coordinator::meetings::MeetingSummary;
use crate::coordinator::registry::NodeInfo;

#[derive(Debug, Deserialize)]
pub struct EndpointInfo {
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub synced: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadNodesInfo {
    pub meeting_id: String,
    pub fully_synced: bool,
    pub endpoints: Vec<EndpointInfo>,
}

pub struct AdminClient {
    http: reqwest::Client,
    base_url: String,
}

impl AdminClient {
    pub fn new(coordinator_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: coordinator_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(Error::UnexpectedStatus {
                status: resp.status().as_u16(),
                url,
            });
        }
        Ok(resp.json().await?)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let url = self.url(path);
        let resp = self.http.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(Error::UnexpectedStatus {
                status: resp.status().as_u16(),
                url,
            });
        }
        Ok(resp.json().await?)
    }

    /// Live nodes as the coordinator sees them.
    pub async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        self.get_json("/api/v1/nodes/list").await
    }

    /// Fully-synced flag per tracked meeting.
    pub async fn sync_status(&self) -> Result<HashMap<String, bool>> {
        self.get_json("/api/v1/meetings/sync-status").await
    }

    /// Every endpoint currently able to serve a meeting's bundle.
    pub async fn download_endpoints(&self, meeting_id: &str) -> Result<DownloadNodesInfo> {
        self.get_json(&format!(
            "/api/v1/meetings/{}/download-nodes-info",
            encode_id(meeting_id)
        ))
        .await
    }

    pub async fn list_meetings(&self) -> Result<Vec<MeetingSummary>> {
        self.get_json("/api/v1/meetings").await
    }

    pub async fn create_meeting(&self, title: &str, time: &str) -> Result<MeetingSummary> {
        self.post_json(
            "/api/v1/meetings",
            serde_json::json!({ "title": title, "time": time }),
        )
        .await
    }

    pub async fn start_meeting(&self, meeting_id: &str) -> Result<MeetingSummary> {
        self.post_json(
            &format!("/api/v1/meetings/{}/start", encode_id(meeting_id)),
            serde_json::json!({}),
        )
        .await
    }

    pub async fn end_meeting(&self, meeting_id: &str) -> Result<MeetingSummary> {
        self.post_json(
            &format!("/api/v1/meetings/{}/end", encode_id(meeting_id)),
            serde_json::json!({}),
        )
        .await
    }
}
