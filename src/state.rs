/// Session state shared by the dispatcher and the poller.
///
/// Everything here is plain data. The dispatcher owns a single `Session`
/// and hands `&mut` access to the poller when a snapshot event is applied,
/// so there is exactly one writer at any time.
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event_log::EventLog;

// ── Agent status ──────────────────────────────────────────────────────────────

/// Status reported by the backend. Unknown values are kept verbatim so a newer
/// backend never breaks decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentStatus {
    Thinking,
    Executing,
    Validating,
    Idle,
    Standby,
    Other(String),
}

impl AgentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AgentStatus::Thinking => "THINKING",
            AgentStatus::Executing => "EXECUTING",
            AgentStatus::Validating => "VALIDATING",
            AgentStatus::Idle => "IDLE",
            AgentStatus::Standby => "STANDBY",
            AgentStatus::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for AgentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "THINKING" => AgentStatus::Thinking,
            "EXECUTING" => AgentStatus::Executing,
            "VALIDATING" => AgentStatus::Validating,
            "IDLE" => AgentStatus::Idle,
            "STANDBY" => AgentStatus::Standby,
            _ => AgentStatus::Other(s),
        }
    }
}

impl From<AgentStatus> for String {
    fn from(status: AgentStatus) -> Self {
        match status {
            AgentStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Snapshot (wire shape of the status endpoint) ──────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStateSnapshot {
    /// Epoch milliseconds; the identity of the snapshot.
    pub timestamp: i64,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    pub status: AgentStatus,
    #[serde(default)]
    pub details: String,
}

impl AgentStateSnapshot {
    /// Source column used when this snapshot lands in the event log.
    pub fn log_source(&self) -> &str {
        match self.agent.as_deref() {
            Some(a) if !a.is_empty() => a,
            _ => "CORE",
        }
    }

    /// Message column: the details text, or the bare status when empty.
    pub fn log_message(&self) -> &str {
        if self.details.is_empty() {
            self.status.as_str()
        } else {
            &self.details
        }
    }
}

// ── Active state (what the status panel shows) ────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActiveState {
    /// Nothing received yet this session.
    #[default]
    None,
    /// Latest snapshot applied by the poller.
    Snapshot(AgentStateSnapshot),
    /// Explicit idle marker written when a command completes successfully.
    Idle,
}

impl ActiveState {
    pub fn team(&self) -> &str {
        match self {
            ActiveState::None => "---",
            ActiveState::Snapshot(s) => s.team.as_deref().unwrap_or("---"),
            ActiveState::Idle => "IDLE",
        }
    }

    pub fn agent(&self) -> &str {
        match self {
            ActiveState::None | ActiveState::Idle => "---",
            ActiveState::Snapshot(s) => s.agent.as_deref().unwrap_or("---"),
        }
    }

    pub fn status(&self) -> &str {
        match self {
            ActiveState::None => "---",
            ActiveState::Snapshot(s) => s.status.as_str(),
            ActiveState::Idle => "STBY",
        }
    }

    pub fn details(&self) -> &str {
        match self {
            ActiveState::None => "",
            ActiveState::Snapshot(s) => &s.details,
            ActiveState::Idle => "Neural link stable.",
        }
    }
}

// ── Chat ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: Role::Model, text: text.into() }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

pub const PROGRESS_SEED: u8 = 15;
pub const PROGRESS_STEP: u8 = 8;
/// Poll-driven progress only grows while below this value; only completion reaches 100.
pub const PROGRESS_SOFT_CEILING: u8 = 90;
pub const PROGRESS_DONE: u8 = 100;

#[derive(Debug, Default)]
pub struct Session {
    pub active: ActiveState,
    pub is_processing: bool,
    pub is_connected: bool,
    /// 0–100
    pub progress: u8,
    pub chat: Vec<ChatMessage>,
    pub log: EventLog,
    /// Timestamp of the most recently applied snapshot.
    pub last_timestamp: Option<i64>,
    /// Every snapshot timestamp applied this session, so a late duplicate
    /// that arrives out of order is still rejected.
    seen_timestamps: HashSet<i64>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snapshot timestamp. Returns false if it was already seen.
    pub fn mark_seen(&mut self, timestamp: i64) -> bool {
        if !self.seen_timestamps.insert(timestamp) {
            return false;
        }
        self.last_timestamp = Some(timestamp);
        true
    }

    pub fn bump_progress(&mut self) {
        if self.progress < PROGRESS_SOFT_CEILING {
            self.progress += PROGRESS_STEP;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_decodes_known_and_unknown_status() {
        let s: AgentStateSnapshot = serde_json::from_str(
            r#"{"timestamp":100,"team":"OPS TEAM","agent":"BUILDER","status":"EXECUTING","details":"working"}"#,
        )
        .unwrap();
        assert_eq!(s.status, AgentStatus::Executing);
        assert_eq!(s.team.as_deref(), Some("OPS TEAM"));

        let s: AgentStateSnapshot =
            serde_json::from_str(r#"{"timestamp":5,"team":null,"agent":null,"status":"REFLECTING"}"#).unwrap();
        assert_eq!(s.status, AgentStatus::Other("REFLECTING".to_string()));
        assert_eq!(s.details, "");
        assert_eq!(serde_json::to_value(&s.status).unwrap(), "REFLECTING");
    }

    #[test]
    fn test_snapshot_log_columns_fall_back() {
        let s = AgentStateSnapshot {
            timestamp: 1,
            team: None,
            agent: None,
            status: AgentStatus::Thinking,
            details: String::new(),
        };
        assert_eq!(s.log_source(), "CORE");
        assert_eq!(s.log_message(), "THINKING");
    }

    #[test]
    fn test_mark_seen_rejects_repeats_and_late_duplicates() {
        let mut session = Session::new();
        assert!(session.mark_seen(100));
        assert!(!session.mark_seen(100));
        assert!(session.mark_seen(200));
        // 100 arriving again after 200 is still a duplicate
        assert!(!session.mark_seen(100));
        assert_eq!(session.last_timestamp, Some(200));
    }

    #[test]
    fn test_progress_never_reaches_done_from_polling() {
        let mut session = Session::new();
        session.progress = PROGRESS_SEED;
        for _ in 0..50 {
            session.bump_progress();
        }
        assert!(session.progress < PROGRESS_DONE);
        assert!(session.progress >= PROGRESS_SOFT_CEILING);
    }

    #[test]
    fn test_idle_marker_fields() {
        let idle = ActiveState::Idle;
        assert_eq!(idle.team(), "IDLE");
        assert_eq!(idle.agent(), "---");
        assert_eq!(idle.status(), "STBY");
        assert_eq!(idle.details(), "Neural link stable.");
    }
}
