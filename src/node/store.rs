//! Local bundle storage for a replica node
//!
//! On-disk layout mirrors what the coordinator serves:
//! `<root>/meeting_files/<meeting_id>/package.zip`. The store keeps an
//! in-memory record per synced bundle (size, checksum, timestamp); files
//! for ended meetings stay on disk after tracking is dropped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Serialize;

use crate::common::{timestamp_now, Result};

pub const BUNDLE_DIR: &str = "meeting_files";
pub const BUNDLE_FILE: &str = "package.zip";

#[derive(Debug, Clone, Serialize)]
pub struct BundleRecord {
    pub meeting_id: String,
    pub title: Option<String>,
    pub size: u64,
    pub checksum: String,
    pub synced_at: u64,
}

pub struct BundleStore {
    root: PathBuf,
    records: RwLock<HashMap<String, BundleRecord>>,
}

impl BundleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            records: RwLock::new(HashMap::new()),
        }
    }

    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(self.root.join(BUNDLE_DIR)).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bundle_path(&self, meeting_id: &str) -> PathBuf {
        self.root.join(BUNDLE_DIR).join(meeting_id).join(BUNDLE_FILE)
    }

    /// Record a completed download.
    pub fn record_synced(
        &self,
        meeting_id: &str,
        title: Option<String>,
        size: u64,
        checksum: String,
    ) {
        let record = BundleRecord {
            meeting_id: meeting_id.to_string(),
            title,
            size,
            checksum,
            synced_at: timestamp_now(),
        };
        self.records
            .write()
            .unwrap()
            .insert(meeting_id.to_string(), record);
    }

    /// Is the bundle present? Checks the record first, then falls back to
    /// the filesystem so files that survived a restart still count.
    pub fn has(&self, meeting_id: &str) -> bool {
        if self.records.read().unwrap().contains_key(meeting_id) {
            return true;
        }
        self.bundle_path(meeting_id).exists()
    }

    pub fn get(&self, meeting_id: &str) -> Option<BundleRecord> {
        self.records.read().unwrap().get(meeting_id).cloned()
    }

    /// All tracked bundles, sorted by meeting id.
    pub fn records(&self) -> Vec<BundleRecord> {
        let mut out: Vec<BundleRecord> =
            self.records.read().unwrap().values().cloned().collect();
        out.sort_by(|a, b| a.meeting_id.cmp(&b.meeting_id));
        out
    }

    pub fn tracked_ids(&self) -> Vec<String> {
        self.records.read().unwrap().keys().cloned().collect()
    }

    /// Stop tracking a meeting. The file is kept on disk.
    pub fn drop_tracking(&self, meeting_id: &str) {
        if self.records.write().unwrap().remove(meeting_id).is_some() {
            tracing::info!("Dropped tracking for ended meeting {}", meeting_id);
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }

    /// Total bytes across tracked bundles.
    pub fn tracked_bytes(&self) -> u64 {
        self.records.read().unwrap().values().map(|r| r.size).sum()
    }

    /// Walk the bundle directory and report `(bundle_count, total_bytes)`
    /// for everything on disk, tracked or not.
    pub fn disk_usage(&self) -> (usize, u64) {
        let dir = self.root.join(BUNDLE_DIR);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return (0, 0);
        };

        let mut count = 0usize;
        let mut bytes = 0u64;
        for entry in entries.flatten() {
            let package = entry.path().join(BUNDLE_FILE);
            if let Ok(meta) = std::fs::metadata(&package) {
                count += 1;
                bytes += meta.len();
            }
        }
        (count, bytes)
    }
}

/// blake3 of a file's contents, hex-encoded. Blocking; call through
/// `spawn_blocking` from async contexts.
pub fn checksum_file(path: &Path) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    let mut file = std::fs::File::open(path)?;
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bundle_path_layout() {
        let store = BundleStore::new("/data/node");
        assert_eq!(
            store.bundle_path("m1"),
            PathBuf::from("/data/node/meeting_files/m1/package.zip")
        );
    }

    #[test]
    fn test_record_and_drop() {
        let store = BundleStore::new("/tmp/unused");
        assert!(store.is_empty());

        store.record_synced("m1", Some("Standup".into()), 1024, "abc".into());
        assert!(store.has("m1"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.tracked_bytes(), 1024);

        let rec = store.get("m1").unwrap();
        assert_eq!(rec.title.as_deref(), Some("Standup"));
        assert_eq!(rec.size, 1024);

        store.drop_tracking("m1");
        assert!(store.get("m1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_has_falls_back_to_disk() {
        let dir = TempDir::new().unwrap();
        let store = BundleStore::new(dir.path());

        let path = store.bundle_path("m1");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"zip bytes").unwrap();

        // Never recorded, but the file is there
        assert!(store.has("m1"));
        assert!(!store.has("m2"));
    }

    #[test]
    fn test_disk_usage_counts_packages() {
        let dir = TempDir::new().unwrap();
        let store = BundleStore::new(dir.path());

        for (id, body) in [("m1", &b"aaaa"[..]), ("m2", &b"bbbbbb"[..])] {
            let path = store.bundle_path(id);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, body).unwrap();
        }

        let (count, bytes) = store.disk_usage();
        assert_eq!(count, 2);
        assert_eq!(bytes, 10);
    }

    #[test]
    fn test_checksum_file_stable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"hello").unwrap();

        let a = checksum_file(&path).unwrap();
        let b = checksum_file(&path).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
