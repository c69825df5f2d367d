use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cap on retained history entries; the oldest entry is trimmed first.
pub const MAX_HISTORY_ENTRIES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Running,
    Paused,
    Suspended,
    Completed,
    Failed,
}

impl AgentStatus {
    /// Resumption is legal from paused, suspended, or failed only.
    pub fn can_resume(self) -> bool {
        matches!(self, Self::Paused | Self::Suspended | Self::Failed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Suspended => "suspended",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleAction {
    Start,
    Pause,
    Resume,
    Suspend,
    Complete,
    Fail,
    Reset,
    Checkpoint,
    Progress,
    Data,
}

/// One line of the append-only lifecycle audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub action: LifecycleAction,
    pub status: AgentStatus,
    pub checkpoint_id: Option<String>,
}

/// Durable per-agent state, owned exclusively by one lifecycle instance
/// and persisted after every transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub status: AgentStatus,
    pub current_task: Option<String>,
    /// 0-100, clamped on every update.
    pub progress: f64,
    pub data: serde_json::Value,
    pub last_error: Option<String>,
    pub last_activity_at: DateTime<Utc>,
    pub history: Vec<HistoryEntry>,
}

impl AgentState {
    pub fn new() -> Self {
        Self {
            status: AgentStatus::Idle,
            current_task: None,
            progress: 0.0,
            data: serde_json::Value::Null,
            last_error: None,
            last_activity_at: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Append a history entry, trimming the oldest past the cap.
    pub fn record(&mut self, action: LifecycleAction, checkpoint_id: Option<String>) {
        self.last_activity_at = Utc::now();
        self.history.push(HistoryEntry {
            timestamp: self.last_activity_at,
            action,
            status: self.status,
            checkpoint_id,
        });
        if self.history.len() > MAX_HISTORY_ENTRIES {
            let excess = self.history.len() - MAX_HISTORY_ENTRIES;
            self.history.drain(..excess);
        }
    }
}

impl Default for AgentState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_resume_matrix() {
        assert!(AgentStatus::Paused.can_resume());
        assert!(AgentStatus::Suspended.can_resume());
        assert!(AgentStatus::Failed.can_resume());
        assert!(!AgentStatus::Idle.can_resume());
        assert!(!AgentStatus::Running.can_resume());
        assert!(!AgentStatus::Completed.can_resume());
    }

    #[test]
    fn test_history_trims_oldest() {
        let mut state = AgentState::new();
        for _ in 0..MAX_HISTORY_ENTRIES {
            state.record(LifecycleAction::Progress, None);
        }
        assert_eq!(state.history.len(), MAX_HISTORY_ENTRIES);
        let first = state.history[0].timestamp;

        state.record(LifecycleAction::Pause, None);
        assert_eq!(state.history.len(), MAX_HISTORY_ENTRIES);
        assert!(state.history[0].timestamp >= first);
        assert_eq!(
            state.history.last().unwrap().action,
            LifecycleAction::Pause
        );
    }

    #[test]
    fn test_state_serde_round_trip() {
        let mut state = AgentState::new();
        state.status = AgentStatus::Paused;
        state.progress = 42.5;
        state.data = serde_json::json!({"cursor": 7});
        state.record(LifecycleAction::Pause, Some("abc123".into()));

        let value = serde_json::to_value(&state).unwrap();
        let back: AgentState = serde_json::from_value(value).unwrap();

        assert_eq!(back.status, AgentStatus::Paused);
        assert_eq!(back.progress, 42.5);
        assert_eq!(back.data["cursor"], 7);
        assert_eq!(back.history.len(), 1);
        assert_eq!(back.history[0].checkpoint_id.as_deref(), Some("abc123"));
    }
}
