use std::collections::BTreeSet;
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::worker::WorkerRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Produces a vote that feeds a consensus round.
    Decision,
    /// Side-effecting job; the output is not aggregated.
    Job,
}

/// Task lifecycle. Transitions are append-only: a task never reverts to
/// an earlier status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Assigned => 1,
            Self::Running => 2,
            Self::Completed => 3,
            Self::Failed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `next` is a legal forward move from this status.
    pub fn can_advance_to(self, next: TaskStatus) -> bool {
        next.rank() > self.rank()
    }
}

/// What a task asks a worker to do.
///
/// Known shapes are typed; `Opaque` is the escape hatch for embedder
/// payloads the core does not interpret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TaskPayload {
    Decide { prompt: String },
    Run { instruction: String },
    Opaque { blob: serde_json::Value },
}

impl TaskPayload {
    /// Render the payload as the prompt handed to an executor.
    pub fn to_prompt(&self) -> String {
        match self {
            Self::Decide { prompt } => prompt.clone(),
            Self::Run { instruction } => instruction.clone(),
            Self::Opaque { blob } => blob.to_string(),
        }
    }

    /// Augment this payload with the result of the previous pipeline step.
    pub fn augmented_with(&self, prior_output: &str) -> TaskPayload {
        match self {
            Self::Decide { prompt } => Self::Decide {
                prompt: format!("{prompt}\n\n## Previous step output\n{prior_output}"),
            },
            Self::Run { instruction } => Self::Run {
                instruction: format!("{instruction}\n\n## Previous step output\n{prior_output}"),
            },
            Self::Opaque { blob } => Self::Opaque {
                blob: serde_json::json!({ "input": blob, "prior": prior_output }),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub kind: TaskKind,
    pub payload: TaskPayload,
    pub required_role: Option<WorkerRole>,
    #[serde(default)]
    pub required_tags: BTreeSet<String>,
    pub priority: u8,
    /// Upper bound on a single executor invocation for this task.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn decision(prompt: impl Into<String>) -> Self {
        Self::new(TaskKind::Decision, TaskPayload::Decide { prompt: prompt.into() })
    }

    pub fn job(instruction: impl Into<String>) -> Self {
        Self::new(TaskKind::Job, TaskPayload::Run { instruction: instruction.into() })
    }

    pub fn new(kind: TaskKind, payload: TaskPayload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            payload,
            required_role: None,
            required_tags: BTreeSet::new(),
            priority: 5,
            timeout: Duration::from_secs(60),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_role(mut self, role: WorkerRole) -> Self {
        self.required_role = Some(role);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(10);
        self
    }

    /// Advance the status, ignoring attempts to move backwards.
    pub fn advance(&mut self, next: TaskStatus) {
        if self.status.can_advance_to(next) {
            self.status = next;
        }
    }
}

/// Outcome of one task within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub worker_id: String,
    pub output: String,
    pub duration_ms: u64,
}

/// Captured failure of one task within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskError {
    pub task_id: String,
    pub worker_id: Option<String>,
    pub error: String,
}

mod duration_ms {
    use std::time::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_never_reverts() {
        let mut task = Task::job("echo");
        task.advance(TaskStatus::Running);
        assert_eq!(task.status, TaskStatus::Running);

        task.advance(TaskStatus::Pending);
        assert_eq!(task.status, TaskStatus::Running); // ignored

        task.advance(TaskStatus::Completed);
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.status.is_terminal());
    }

    #[test]
    fn test_completed_and_failed_are_parallel_terminals() {
        assert!(!TaskStatus::Completed.can_advance_to(TaskStatus::Failed));
        assert!(!TaskStatus::Failed.can_advance_to(TaskStatus::Completed));
    }

    #[test]
    fn test_payload_augmentation() {
        let payload = TaskPayload::Decide { prompt: "Should we ship?".into() };
        let augmented = payload.augmented_with("tests are green");
        match augmented {
            TaskPayload::Decide { prompt } => {
                assert!(prompt.starts_with("Should we ship?"));
                assert!(prompt.contains("tests are green"));
            }
            _ => panic!("payload shape changed"),
        }
    }

    #[test]
    fn test_opaque_payload_augmentation_wraps() {
        let payload = TaskPayload::Opaque { blob: serde_json::json!({"k": 1}) };
        let augmented = payload.augmented_with("prior");
        match augmented {
            TaskPayload::Opaque { blob } => {
                assert_eq!(blob["input"]["k"], 1);
                assert_eq!(blob["prior"], "prior");
            }
            _ => panic!("payload shape changed"),
        }
    }

    #[test]
    fn test_task_serde_round_trip() {
        let task = Task::decision("go or no-go")
            .with_role(WorkerRole::Analyst)
            .with_tags(["markets"])
            .with_timeout(Duration::from_millis(1500));
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, task.id);
        assert_eq!(back.timeout, Duration::from_millis(1500));
        assert_eq!(back.required_role, Some(WorkerRole::Analyst));
    }
}
