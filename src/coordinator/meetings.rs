//! Meeting directory
//!
//! In-memory stand-in for the external meeting store: meeting summaries,
//! status transitions, and the change token replicas poll against. The
//! token rotates only when a meeting transitions into the in-progress
//! state, so an unchanged token means "nothing to do" for pollers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::common::{Error, Result};
use crate::coordinator::registry::MeetingRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Scheduled,
    InProgress,
    Ended,
}

impl std::fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeetingStatus::Scheduled => write!(f, "scheduled"),
            MeetingStatus::InProgress => write!(f, "in_progress"),
            MeetingStatus::Ended => write!(f, "ended"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingSummary {
    pub id: String,
    pub title: String,
    pub time: String,
    pub status: MeetingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_path: Option<PathBuf>,
}

impl MeetingSummary {
    pub fn is_active(&self) -> bool {
        self.status == MeetingStatus::InProgress
    }

    pub fn to_ref(&self) -> MeetingRef {
        MeetingRef::new(self.id.clone(), self.title.clone())
    }
}

/// Token value when no meeting is in progress.
const TOKEN_NONE: &str = "none";

pub struct MeetingDirectory {
    meetings: RwLock<HashMap<String, MeetingSummary>>,
    change_token: RwLock<String>,
}

impl MeetingDirectory {
    pub fn new() -> Self {
        Self {
            meetings: RwLock::new(HashMap::new()),
            change_token: RwLock::new(uuid::Uuid::new_v4().to_string()),
        }
    }

    /// Create a scheduled meeting with a generated id.
    pub fn create(&self, title: &str, time: &str) -> MeetingSummary {
        let meeting = MeetingSummary {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            time: time.to_string(),
            status: MeetingStatus::Scheduled,
            package_path: None,
        };
        self.insert(meeting.clone());
        meeting
    }

    /// Insert or replace a meeting record (tests pin explicit ids).
    pub fn insert(&self, meeting: MeetingSummary) {
        self.meetings
            .write()
            .unwrap()
            .insert(meeting.id.clone(), meeting);
    }

    pub fn get(&self, meeting_id: &str) -> Option<MeetingSummary> {
        self.meetings.read().unwrap().get(meeting_id).cloned()
    }

    pub fn list(&self) -> Vec<MeetingSummary> {
        let mut out: Vec<MeetingSummary> =
            self.meetings.read().unwrap().values().cloned().collect();
        out.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));
        out
    }

    /// Transition a meeting to in-progress and rotate the change token.
    pub fn start(&self, meeting_id: &str) -> Result<MeetingSummary> {
        let mut meetings = self.meetings.write().unwrap();
        let meeting = meetings
            .get_mut(meeting_id)
            .ok_or_else(|| Error::MeetingNotFound(meeting_id.to_string()))?;
        meeting.status = MeetingStatus::InProgress;

        let token = uuid::Uuid::new_v4().to_string();
        *self.change_token.write().unwrap() = token.clone();
        tracing::info!(
            "Meeting {} started ({}), change token now {}",
            meeting_id,
            meeting.title,
            token
        );
        Ok(meeting.clone())
    }

    /// Transition a meeting to ended. The token is left alone: it rotates
    /// only on activation, pollers notice the end via the active-id set.
    pub fn end(&self, meeting_id: &str) -> Result<MeetingSummary> {
        let mut meetings = self.meetings.write().unwrap();
        let meeting = meetings
            .get_mut(meeting_id)
            .ok_or_else(|| Error::MeetingNotFound(meeting_id.to_string()))?;
        meeting.status = MeetingStatus::Ended;
        tracing::info!("Meeting {} ended ({})", meeting_id, meeting.title);
        Ok(meeting.clone())
    }

    /// Meetings currently in progress, as `{id, title}` refs.
    pub fn active_meetings(&self) -> Vec<MeetingRef> {
        let mut refs: Vec<MeetingRef> = self
            .meetings
            .read()
            .unwrap()
            .values()
            .filter(|m| m.is_active())
            .map(MeetingSummary::to_ref)
            .collect();
        refs.sort_by(|a, b| a.id.cmp(&b.id));
        refs
    }

    /// Current change token; `"none"` when no meeting is in progress.
    pub fn status_token(&self) -> String {
        let any_active = self
            .meetings
            .read()
            .unwrap()
            .values()
            .any(MeetingSummary::is_active);
        if any_active {
            self.change_token.read().unwrap().clone()
        } else {
            TOKEN_NONE.to_string()
        }
    }

    pub fn set_package_path(&self, meeting_id: &str, path: PathBuf) -> Result<()> {
        let mut meetings = self.meetings.write().unwrap();
        let meeting = meetings
            .get_mut(meeting_id)
            .ok_or_else(|| Error::MeetingNotFound(meeting_id.to_string()))?;
        meeting.package_path = Some(path);
        Ok(())
    }
}

impl Default for MeetingDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_none_without_active_meetings() {
        let dir = MeetingDirectory::new();
        assert_eq!(dir.status_token(), "none");

        dir.create("Budget review", "2026-08-26 09:00");
        assert_eq!(dir.status_token(), "none");
    }

    #[test]
    fn test_token_rotates_on_start_only() {
        let dir = MeetingDirectory::new();
        let meeting = dir.create("Budget review", "2026-08-26 09:00");

        dir.start(&meeting.id).unwrap();
        let token = dir.status_token();
        assert_ne!(token, "none");

        // Polling does not rotate the token
        assert_eq!(dir.status_token(), token);

        // Re-activation rotates it again
        dir.end(&meeting.id).unwrap();
        assert_eq!(dir.status_token(), "none");
        dir.start(&meeting.id).unwrap();
        assert_ne!(dir.status_token(), token);
    }

    #[test]
    fn test_active_meetings_filtering() {
        let dir = MeetingDirectory::new();
        let a = dir.create("A", "2026-08-26 09:00");
        let b = dir.create("B", "2026-08-26 10:00");
        dir.create("C", "2026-08-26 11:00");

        dir.start(&a.id).unwrap();
        dir.start(&b.id).unwrap();
        dir.end(&b.id).unwrap();

        let active = dir.active_meetings();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, a.id);
        assert_eq!(active[0].title.as_deref(), Some("A"));
    }

    #[test]
    fn test_start_unknown_meeting() {
        let dir = MeetingDirectory::new();
        assert!(matches!(
            dir.start("ghost"),
            Err(Error::MeetingNotFound(_))
        ));
    }

    #[test]
    fn test_package_path_bookkeeping() {
        let dir = MeetingDirectory::new();
        let m = dir.create("A", "2026-08-26 09:00");
        assert!(dir.get(&m.id).unwrap().package_path.is_none());

        dir.set_package_path(&m.id, PathBuf::from("/tmp/m.zip"))
            .unwrap();
        assert_eq!(
            dir.get(&m.id).unwrap().package_path,
            Some(PathBuf::from("/tmp/m.zip"))
        );
    }
}
