use std::sync::Arc;
use tracing::{info, warn};

use crate::checkpoint::{Checkpoint, CheckpointBackend};
use crate::errors::ConclaveError;
use crate::store::PersistenceStore;
use super::state::{AgentState, AgentStatus, LifecycleAction};

/// Which checkpoint, if any, to restore before resuming.
#[derive(Debug, Clone, Default)]
pub enum RestoreTarget {
    #[default]
    None,
    Latest,
    Named(String),
    Id(String),
}

/// Single-owner durable state machine for one worker identity.
///
/// Legal moves: idle -> running; running -> paused | suspended |
/// completed | failed; paused/suspended/failed -> running (resume).
/// Every mutating operation appends one history entry and persists the
/// whole state before returning. Suspending captures a checkpoint first
/// and attaches its id to the history entry; a failed capture aborts
/// the suspend with status unchanged.
pub struct AgentLifecycle {
    agent_id: String,
    state: AgentState,
    store: Arc<dyn PersistenceStore>,
    checkpoints: Arc<dyn CheckpointBackend>,
}

impl AgentLifecycle {
    /// Load persisted state for `agent_id`, falling back to a fresh
    /// default when the record is absent or unreadable.
    pub fn load(
        agent_id: impl Into<String>,
        store: Arc<dyn PersistenceStore>,
        checkpoints: Arc<dyn CheckpointBackend>,
    ) -> Self {
        let agent_id = agent_id.into();
        let state = match store.load(&Self::key_for(&agent_id)) {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(state) => state,
                Err(e) => {
                    warn!(agent = %agent_id, error = %e, "Corrupt agent state, starting fresh");
                    AgentState::new()
                }
            },
            Ok(None) => AgentState::new(),
            Err(e) => {
                warn!(agent = %agent_id, error = %e, "Failed to load agent state, starting fresh");
                AgentState::new()
            }
        };
        Self { agent_id, state, store, checkpoints }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn status(&self) -> AgentStatus {
        self.state.status
    }

    fn key_for(agent_id: &str) -> String {
        format!("agent/{}", agent_id)
    }

    /// Persist the current state. Storage trouble degrades to the
    /// in-memory copy with a logged warning; it never fails the
    /// operation that triggered it.
    fn persist(&self) {
        let value = match serde_json::to_value(&self.state) {
            Ok(v) => v,
            Err(e) => {
                warn!(agent = %self.agent_id, error = %e, "Failed to serialize agent state");
                return;
            }
        };
        if let Err(e) = self.store.save(&Self::key_for(&self.agent_id), &value) {
            warn!(agent = %self.agent_id, error = %e, "Failed to persist agent state");
        }
    }

    fn commit(&mut self, action: LifecycleAction, checkpoint_id: Option<String>) {
        self.state.record(action, checkpoint_id);
        self.persist();
    }

    pub fn start(&mut self, task: Option<String>) -> Result<(), ConclaveError> {
        match self.state.status {
            AgentStatus::Running => {
                return Err(ConclaveError::InvalidTransition(format!(
                    "{} is already running",
                    self.agent_id
                )));
            }
            AgentStatus::Idle => {}
            other => {
                return Err(ConclaveError::InvalidTransition(format!(
                    "{} cannot start from {} (reset or resume instead)",
                    self.agent_id, other
                )));
            }
        }
        self.state.status = AgentStatus::Running;
        self.state.current_task = task;
        self.state.last_error = None;
        self.commit(LifecycleAction::Start, None);
        info!(agent = %self.agent_id, "Agent started");
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), ConclaveError> {
        self.require_running("pause")?;
        self.state.status = AgentStatus::Paused;
        self.commit(LifecycleAction::Pause, None);
        info!(agent = %self.agent_id, "Agent paused");
        Ok(())
    }

    /// Capture a checkpoint, then move to suspended. The checkpoint id
    /// lands on the history entry; if the capture fails the agent stays
    /// running.
    pub async fn suspend(&mut self, label: &str) -> Result<Checkpoint, ConclaveError> {
        self.require_running("suspend")?;
        let checkpoint = self
            .checkpoints
            .checkpoint(label, self.state.history.len() as u32, &self.agent_id)
            .await?;

        self.state.status = AgentStatus::Suspended;
        self.commit(LifecycleAction::Suspend, Some(checkpoint.id.clone()));
        info!(agent = %self.agent_id, checkpoint = %checkpoint.id, "Agent suspended");
        Ok(checkpoint)
    }

    /// Resume a paused, suspended, or failed agent, optionally restoring
    /// a checkpoint first. A failed restore leaves the status unchanged.
    pub async fn resume(&mut self, restore: RestoreTarget) -> Result<(), ConclaveError> {
        if !self.state.status.can_resume() {
            return Err(ConclaveError::InvalidTransition(format!(
                "{} cannot resume from {}",
                self.agent_id, self.state.status
            )));
        }

        let restored = match restore {
            RestoreTarget::None => None,
            RestoreTarget::Latest => {
                let all = self.checkpoints.list(&self.agent_id).await?;
                let latest = all.into_iter().last().ok_or_else(|| {
                    ConclaveError::NotFound(format!("no checkpoints for {}", self.agent_id))
                })?;
                Some(self.checkpoints.restore(&latest.id).await?)
            }
            RestoreTarget::Named(name) => {
                let found = self.checkpoints.get_by_tag(&name).await?;
                Some(self.checkpoints.restore(&found.id).await?)
            }
            RestoreTarget::Id(id) => Some(self.checkpoints.restore(&id).await?),
        };

        self.state.status = AgentStatus::Running;
        self.state.last_error = None;
        self.commit(LifecycleAction::Resume, restored.map(|c| c.id));
        info!(agent = %self.agent_id, "Agent resumed");
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), ConclaveError> {
        self.require_running("complete")?;
        self.state.status = AgentStatus::Completed;
        self.state.progress = 100.0;
        self.state.current_task = None;
        self.commit(LifecycleAction::Complete, None);
        info!(agent = %self.agent_id, "Agent completed");
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), ConclaveError> {
        self.require_running("fail")?;
        let reason = reason.into();
        self.state.status = AgentStatus::Failed;
        self.state.last_error = Some(reason.clone());
        self.commit(LifecycleAction::Fail, None);
        warn!(agent = %self.agent_id, reason = %reason, "Agent failed");
        Ok(())
    }

    /// Return to a fresh idle state from any status.
    pub fn reset(&mut self) -> Result<(), ConclaveError> {
        self.state = AgentState::new();
        self.commit(LifecycleAction::Reset, None);
        info!(agent = %self.agent_id, "Agent reset");
        Ok(())
    }

    /// Capture a checkpoint on request, without changing status.
    pub async fn checkpoint(&mut self, label: &str) -> Result<Checkpoint, ConclaveError> {
        let checkpoint = self
            .checkpoints
            .checkpoint(label, self.state.history.len() as u32, &self.agent_id)
            .await?;
        self.commit(LifecycleAction::Checkpoint, Some(checkpoint.id.clone()));
        Ok(checkpoint)
    }

    pub fn set_progress(&mut self, progress: f64) -> Result<(), ConclaveError> {
        self.state.progress = progress.clamp(0.0, 100.0);
        self.commit(LifecycleAction::Progress, None);
        Ok(())
    }

    pub fn set_data(&mut self, data: serde_json::Value) -> Result<(), ConclaveError> {
        self.state.data = data;
        self.commit(LifecycleAction::Data, None);
        Ok(())
    }

    fn require_running(&self, op: &str) -> Result<(), ConclaveError> {
        if self.state.status != AgentStatus::Running {
            return Err(ConclaveError::InvalidTransition(format!(
                "{} cannot {} from {}",
                self.agent_id, op, self.state.status
            )));
        }
        Ok(())
    }
}
