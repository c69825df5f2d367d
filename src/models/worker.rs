use std::collections::BTreeSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Functional role of a worker within a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerRole {
    Planner,
    Analyst,
    Reviewer,
    Specialist,
    Generalist,
}

impl WorkerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Analyst => "analyst",
            Self::Reviewer => "reviewer",
            Self::Specialist => "specialist",
            Self::Generalist => "generalist",
        }
    }
}

impl std::fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Idle,
    Busy,
    Error,
    Disabled,
}

/// A worker tracked by the pool.
///
/// Mutated only by the pool: created on registration, removed on
/// unregistration. `active_tasks` never exceeds `max_concurrency`, and
/// `status` is `Busy` exactly while `active_tasks > 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRegistration {
    pub id: String,
    pub name: String,
    pub role: WorkerRole,
    /// Capability tags matched against a task's `required_tags`.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub max_concurrency: u32,
    /// Scheduling priority, 0-10. Clamped on construction.
    pub priority: u8,
    pub status: WorkerStatus,
    #[serde(default)]
    pub active_tasks: u32,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl WorkerRegistration {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: WorkerRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            tags: BTreeSet::new(),
            max_concurrency: 1,
            priority: 5,
            status: WorkerStatus::Idle,
            active_tasks: 0,
            last_used_at: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(10);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: u32) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn is_available(&self) -> bool {
        self.status == WorkerStatus::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_clamped() {
        let w = WorkerRegistration::new("w1", "alpha", WorkerRole::Analyst).with_priority(99);
        assert_eq!(w.priority, 10);
    }

    #[test]
    fn test_new_worker_is_idle() {
        let w = WorkerRegistration::new("w1", "alpha", WorkerRole::Generalist);
        assert!(w.is_available());
        assert_eq!(w.active_tasks, 0);
    }

    #[test]
    fn test_role_serde_kebab_case() {
        let json = serde_json::to_string(&WorkerRole::Specialist).unwrap();
        assert_eq!(json, "\"specialist\"");
    }
}
