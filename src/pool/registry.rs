use std::sync::Arc;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::ConclaveError;
use crate::executor::Executor;
use crate::models::task::Task;
use crate::models::worker::{WorkerRegistration, WorkerStatus};
use super::ledger::{CostLedger, CostRecord, WorkerStats};

/// Optional scoring factors applied during selection. Each factor only
/// affects workers that have ledger history for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionWeighting {
    pub cost_averse: bool,
    pub favor_reliability: bool,
    pub latency_averse: bool,
}

/// A worker checked out for one task: identity plus its executor handle.
/// The caller must hand it back through [`AgentPool::release`].
#[derive(Clone)]
pub struct LeasedWorker {
    pub worker_id: String,
    pub worker_name: String,
    pub executor: Arc<dyn Executor>,
}

impl std::fmt::Debug for LeasedWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeasedWorker")
            .field("worker_id", &self.worker_id)
            .field("worker_name", &self.worker_name)
            .finish_non_exhaustive()
    }
}

struct PoolEntry {
    registration: WorkerRegistration,
    executor: Arc<dyn Executor>,
}

/// Named registry of workers with selection, status bracketing, and a
/// bounded usage ledger.
///
/// Registration order is preserved: score ties resolve to the
/// first-registered candidate. The worker table is the only shared
/// mutable state touched by concurrent dispatches; `acquire`/`release`
/// perform their read-modify-write under one write lock. The ledger has
/// its own lock so `record_cost` never contends with dispatch.
pub struct AgentPool {
    workers: RwLock<Vec<PoolEntry>>,
    ledger: RwLock<CostLedger>,
}

impl AgentPool {
    pub fn new() -> Self {
        Self {
            workers: RwLock::new(Vec::new()),
            ledger: RwLock::new(CostLedger::new()),
        }
    }

    pub async fn register(
        &self,
        registration: WorkerRegistration,
        executor: Arc<dyn Executor>,
    ) -> Result<(), ConclaveError> {
        let mut workers = self.workers.write().await;
        if workers.iter().any(|e| e.registration.id == registration.id) {
            return Err(ConclaveError::Config(format!(
                "worker {} is already registered",
                registration.id
            )));
        }
        info!(worker = %registration.id, role = %registration.role, "Worker registered");
        workers.push(PoolEntry { registration, executor });
        Ok(())
    }

    pub async fn unregister(&self, worker_id: &str) -> Result<(), ConclaveError> {
        let mut workers = self.workers.write().await;
        let before = workers.len();
        workers.retain(|e| e.registration.id != worker_id);
        if workers.len() == before {
            return Err(ConclaveError::NotFound(format!("worker {}", worker_id)));
        }
        info!(worker = %worker_id, "Worker unregistered");
        Ok(())
    }

    pub async fn get(&self, worker_id: &str) -> Option<WorkerRegistration> {
        self.workers
            .read()
            .await
            .iter()
            .find(|e| e.registration.id == worker_id)
            .map(|e| e.registration.clone())
    }

    pub async fn workers(&self) -> Vec<WorkerRegistration> {
        self.workers.read().await.iter().map(|e| e.registration.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.workers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workers.read().await.is_empty()
    }

    pub async fn set_disabled(&self, worker_id: &str, disabled: bool) -> Result<(), ConclaveError> {
        let mut workers = self.workers.write().await;
        let entry = workers
            .iter_mut()
            .find(|e| e.registration.id == worker_id)
            .ok_or_else(|| ConclaveError::NotFound(format!("worker {}", worker_id)))?;
        entry.registration.status = if disabled {
            WorkerStatus::Disabled
        } else {
            WorkerStatus::Idle
        };
        entry.registration.active_tasks = 0;
        Ok(())
    }

    /// Score the idle candidates for `task` and return the best one
    /// without changing any state. Read-only view of the selection
    /// algorithm; dispatch should go through [`AgentPool::acquire`].
    pub async fn select_agent(
        &self,
        task: &Task,
        weighting: SelectionWeighting,
    ) -> Result<WorkerRegistration, ConclaveError> {
        let workers = self.workers.read().await;
        let ledger = self.ledger.read().await;
        Self::pick(&workers, &ledger, task, weighting)
            .map(|idx| workers[idx].registration.clone())
    }

    /// Select the best idle candidate for `task` and mark it busy, in one
    /// atomic step with respect to other dispatches.
    pub async fn acquire(
        &self,
        task: &Task,
        weighting: SelectionWeighting,
    ) -> Result<LeasedWorker, ConclaveError> {
        let mut workers = self.workers.write().await;
        let idx = {
            let ledger = self.ledger.read().await;
            Self::pick(&workers, &ledger, task, weighting)?
        };

        let entry = &mut workers[idx];
        entry.registration.active_tasks += 1;
        entry.registration.status = WorkerStatus::Busy;
        entry.registration.last_used_at = Some(Utc::now());
        debug!(worker = %entry.registration.id, task = %task.id, "Worker checked out");

        Ok(LeasedWorker {
            worker_id: entry.registration.id.clone(),
            worker_name: entry.registration.name.clone(),
            executor: entry.executor.clone(),
        })
    }

    /// Check out a specific worker by id, atomically with other
    /// dispatches. Used by consensus rounds, which address every
    /// eligible voter rather than the best-scored one.
    pub async fn checkout(&self, worker_id: &str) -> Result<LeasedWorker, ConclaveError> {
        let mut workers = self.workers.write().await;
        let entry = workers
            .iter_mut()
            .find(|e| e.registration.id == worker_id)
            .ok_or_else(|| ConclaveError::NotFound(format!("worker {}", worker_id)))?;

        let reg = &mut entry.registration;
        let has_capacity = match reg.status {
            WorkerStatus::Idle => true,
            WorkerStatus::Busy => reg.active_tasks < reg.max_concurrency,
            _ => false,
        };
        if !has_capacity {
            return Err(ConclaveError::NoCandidate(format!(
                "worker {} is not available",
                worker_id
            )));
        }

        reg.active_tasks += 1;
        reg.status = WorkerStatus::Busy;
        reg.last_used_at = Some(Utc::now());

        Ok(LeasedWorker {
            worker_id: reg.id.clone(),
            worker_name: reg.name.clone(),
            executor: entry.executor.clone(),
        })
    }

    /// Return a worker after an execution outcome. Success maps back to
    /// idle (once no task remains in flight), failure to error; a worker
    /// is never left busy after its outcome is known.
    pub async fn release(&self, worker_id: &str, success: bool) {
        let mut workers = self.workers.write().await;
        if let Some(entry) = workers.iter_mut().find(|e| e.registration.id == worker_id) {
            let reg = &mut entry.registration;
            reg.active_tasks = reg.active_tasks.saturating_sub(1);
            reg.status = if !success {
                WorkerStatus::Error
            } else if reg.active_tasks == 0 {
                WorkerStatus::Idle
            } else {
                WorkerStatus::Busy
            };
            debug!(worker = %worker_id, success, status = ?reg.status, "Worker released");
        }
    }

    /// Clear a worker's error state back to idle.
    pub async fn reinstate(&self, worker_id: &str) -> Result<(), ConclaveError> {
        let mut workers = self.workers.write().await;
        let entry = workers
            .iter_mut()
            .find(|e| e.registration.id == worker_id)
            .ok_or_else(|| ConclaveError::NotFound(format!("worker {}", worker_id)))?;
        if entry.registration.status == WorkerStatus::Error {
            entry.registration.status = WorkerStatus::Idle;
            entry.registration.active_tasks = 0;
        }
        Ok(())
    }

    /// Append a usage sample. Uses a lock separate from the worker table
    /// so recording never blocks scheduling.
    pub async fn record_cost(&self, record: CostRecord) {
        self.ledger.write().await.push(record);
    }

    pub async fn stats_for(&self, worker_id: &str) -> Option<WorkerStats> {
        self.ledger.read().await.stats_for(worker_id)
    }

    pub async fn total_cost_usd(&self) -> f64 {
        self.ledger.read().await.total_cost_usd()
    }

    fn pick(
        workers: &[PoolEntry],
        ledger: &CostLedger,
        task: &Task,
        weighting: SelectionWeighting,
    ) -> Result<usize, ConclaveError> {
        let mut best: Option<(usize, f64)> = None;

        for (idx, entry) in workers.iter().enumerate() {
            let reg = &entry.registration;
            if reg.status != WorkerStatus::Idle {
                continue;
            }
            if let Some(required) = task.required_role {
                if reg.role != required {
                    continue;
                }
            }
            if !task.required_tags.is_empty()
                && task.required_tags.intersection(&reg.tags).next().is_none()
            {
                continue;
            }

            let score = Self::score(reg, ledger.stats_for(&reg.id), weighting);
            // Strict greater-than keeps the first-registered worker on ties.
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((idx, score)),
            }
        }

        best.map(|(idx, _)| idx).ok_or_else(|| {
            ConclaveError::NoCandidate(format!("no idle worker matches task {}", task.id))
        })
    }

    fn score(
        reg: &WorkerRegistration,
        stats: Option<WorkerStats>,
        weighting: SelectionWeighting,
    ) -> f64 {
        let mut score = reg.priority as f64 * 10.0;
        if let Some(stats) = stats {
            if weighting.cost_averse {
                score -= stats.avg_cost_usd * 100.0;
            }
            if weighting.favor_reliability {
                score += stats.success_rate * 50.0;
            }
            if weighting.latency_averse {
                score -= stats.avg_latency_ms / 100.0;
            }
        }
        score
    }
}

impl Default for AgentPool {
    fn default() -> Self {
        Self::new()
    }
}
