use serde::{Deserialize, Serialize};

use crate::models::task::TaskKind;
use crate::models::worker::WorkerRole;
use crate::orchestrator::Mode;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ConclaveConfig {
    pub pool: Option<PoolConfig>,
    pub orchestration: Option<OrchestrationConfig>,
    pub consensus: Option<ConsensusConfig>,
    pub storage: Option<StorageConfig>,
    pub notifications: Option<NotificationConfig>,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PoolConfig {
    #[serde(default)]
    pub workers: Vec<WorkerSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerSpec {
    pub id: String,
    pub name: Option<String>,
    pub role: WorkerRole,
    pub tags: Option<Vec<String>>,
    pub priority: Option<u8>,
    pub max_concurrency: Option<u32>,
    /// Consensus weight for this worker's votes (default 1.0).
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct OrchestrationConfig {
    pub mode: Option<Mode>,
    pub max_workers: Option<usize>,
    pub task_timeout_ms: Option<u64>,
    pub cost_averse: Option<bool>,
    pub favor_reliability: Option<bool>,
    pub latency_averse: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ConsensusConfig {
    pub min_agreement: Option<f64>,
    pub min_confidence: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StorageConfig {
    /// Path of the sqlite database backing agent state and suspensions.
    pub db_path: Option<String>,
    /// Versioned working directory used for checkpoints.
    pub working_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskSpec {
    pub kind: TaskKind,
    pub prompt: String,
    pub role: Option<WorkerRole>,
    pub tags: Option<Vec<String>>,
    pub priority: Option<u8>,
    pub timeout_ms: Option<u64>,
}
