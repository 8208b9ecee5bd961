//! Bundle provisioning for the download router
//!
//! The packaging pipeline itself (ZIP of rendered files) lives outside
//! this system; `BundleGenerator` is the seam it plugs into. The default
//! generator refuses, meaning the coordinator serves only pre-staged
//! bundles; tests inject one that writes bytes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::common::{Error, Result};
use crate::coordinator::meetings::{MeetingDirectory, MeetingSummary};

/// Produces a meeting's bundle file at `dest`. Runs on the blocking pool.
pub trait BundleGenerator: Send + Sync {
    fn generate(&self, meeting: &MeetingSummary, dest: &Path) -> Result<()>;
}

/// Production default: no on-demand generation, pre-staged bundles only.
pub struct NoBundleGenerator;

impl BundleGenerator for NoBundleGenerator {
    fn generate(&self, meeting: &MeetingSummary, _dest: &Path) -> Result<()> {
        Err(Error::BundleUnavailable(format!(
            "no bundle staged for meeting {} and on-demand generation is disabled",
            meeting.id
        )))
    }
}

/// Resolves a meeting id to an on-disk bundle, generating one on demand
/// when the recorded path is missing or stale.
pub struct BundleProvider {
    root: PathBuf,
    generator: Arc<dyn BundleGenerator>,
}

impl BundleProvider {
    pub fn new(root: PathBuf, generator: Arc<dyn BundleGenerator>) -> Self {
        Self { root, generator }
    }

    fn default_path(&self, meeting_id: &str) -> PathBuf {
        self.root.join(format!("meeting_{}.zip", meeting_id))
    }

    /// Path to a readable bundle for this meeting, generating if needed.
    /// Failure to produce one is fatal for the request (500-class).
    pub async fn ensure(
        &self,
        directory: &MeetingDirectory,
        meeting_id: &str,
    ) -> Result<PathBuf> {
        let meeting = directory
            .get(meeting_id)
            .ok_or_else(|| Error::MeetingNotFound(meeting_id.to_string()))?;

        if let Some(path) = &meeting.package_path {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Ok(path.clone());
            }
            tracing::warn!(
                "Recorded bundle path {} for meeting {} is stale, regenerating",
                path.display(),
                meeting_id
            );
        }

        let dest = self.default_path(meeting_id);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let generator = self.generator.clone();
        let meeting_clone = meeting.clone();
        let dest_clone = dest.clone();
        tokio::task::spawn_blocking(move || generator.generate(&meeting_clone, &dest_clone))
            .await
            .map_err(|e| Error::Internal(format!("bundle generation task failed: {}", e)))??;

        directory.set_package_path(meeting_id, dest.clone())?;
        tracing::info!(
            "Bundle generated for meeting {}: {}",
            meeting_id,
            dest.display()
        );
        Ok(dest)
    }
}
