use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::consensus::ConsensusAggregator;
use crate::errors::ConclaveError;
use crate::executor::{invoke_with_timeout, ExecutorOutcome};
use crate::models::consensus::ConsensusResult;
use crate::models::task::{Task, TaskError, TaskResult, TaskStatus};
use crate::models::vote::Vote;
use crate::models::worker::{WorkerRole, WorkerStatus};
use crate::pool::{AgentPool, CostRecord, SelectionWeighting};
use super::events::{EventBus, OrchestratorEvent};
use super::mode::Mode;

/// Results and captured failures of one batch. Partial failure is the
/// normal case, not an exception.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: Vec<TaskResult>,
    pub errors: Vec<TaskError>,
}

/// Options for a consensus round.
#[derive(Debug, Clone)]
pub struct RoundOptions {
    pub timeout: Duration,
    pub required_role: Option<WorkerRole>,
}

impl Default for RoundOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            required_role: None,
        }
    }
}

/// Runs batches of tasks against a pool under one scheduling strategy,
/// and fans decision prompts out to every eligible voter.
///
/// The controller owns the busy/idle bracketing of every dispatch: a
/// worker leaves as busy and comes back idle (success) or error
/// (failure), even when the executor blows up. Cancellation is
/// cooperative; the controller stops waiting, it does not kill
/// executors beyond the per-task timeout race.
pub struct OrchestrationController {
    pool: Arc<AgentPool>,
    aggregator: ConsensusAggregator,
    weighting: SelectionWeighting,
    events: Arc<EventBus>,
    cancel_token: CancellationToken,
    max_workers: usize,
}

impl OrchestrationController {
    pub fn new(pool: Arc<AgentPool>) -> Self {
        Self {
            pool,
            aggregator: ConsensusAggregator::new(),
            weighting: SelectionWeighting::default(),
            events: Arc::new(EventBus::new()),
            cancel_token: CancellationToken::new(),
            max_workers: 4,
        }
    }

    pub fn with_aggregator(mut self, aggregator: ConsensusAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn with_weighting(mut self, weighting: SelectionWeighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// Replace the controller's cancel token with an external one so the
    /// embedder's `.cancel()` actually stops the batch.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Hard concurrency cap for swarm mode.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Execute `tasks` under `mode`.
    ///
    /// Per-task failures are captured in the outcome, never raised; only
    /// a structurally unusable configuration is a hard error.
    pub async fn execute(&self, tasks: Vec<Task>, mode: Mode) -> Result<BatchOutcome, ConclaveError> {
        if mode == Mode::Swarm && self.max_workers == 0 {
            return Err(ConclaveError::Config("swarm mode requires max_workers >= 1".into()));
        }

        let batch_id = uuid::Uuid::new_v4().to_string();
        let start = Instant::now();
        self.events.emit(OrchestratorEvent::BatchStarted {
            batch_id: batch_id.clone(),
            mode,
            task_count: tasks.len(),
        });
        info!(batch = %batch_id, %mode, tasks = tasks.len(), "Batch started");

        let outcome = match mode {
            Mode::Sequential => self.run_sequential(tasks).await,
            Mode::Parallel => self.run_parallel(tasks).await,
            Mode::Pipeline => self.run_pipeline(tasks).await,
            Mode::Swarm => self.run_swarm(tasks).await,
        };

        self.events.emit(OrchestratorEvent::BatchCompleted {
            batch_id: batch_id.clone(),
            completed: outcome.results.len(),
            failed: outcome.errors.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        });
        info!(
            batch = %batch_id,
            completed = outcome.results.len(),
            failed = outcome.errors.len(),
            "Batch finished"
        );
        Ok(outcome)
    }

    async fn run_sequential(&self, tasks: Vec<Task>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for task in tasks {
            if self.cancel_token.is_cancelled() {
                outcome.errors.push(Self::cancelled(&task));
                continue;
            }
            match dispatch_task(
                self.pool.clone(),
                self.events.clone(),
                self.weighting,
                task,
            ).await {
                Ok(result) => outcome.results.push(result),
                // A task with no agent or a failing executor is recorded
                // and the batch moves on.
                Err(error) => outcome.errors.push(error),
            }
        }
        outcome
    }

    async fn run_pipeline(&self, tasks: Vec<Task>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut prior: Option<String> = None;

        for mut task in tasks {
            if self.cancel_token.is_cancelled() {
                outcome.errors.push(Self::cancelled(&task));
                break;
            }
            if let Some(prior) = &prior {
                task.payload = task.payload.augmented_with(prior);
            }
            match dispatch_task(
                self.pool.clone(),
                self.events.clone(),
                self.weighting,
                task,
            ).await {
                Ok(result) => {
                    prior = Some(result.output.clone());
                    outcome.results.push(result);
                }
                Err(error) => {
                    // Fail-fast: downstream steps depend on this output.
                    warn!(task = %error.task_id, "Pipeline aborted");
                    outcome.errors.push(error);
                    break;
                }
            }
        }
        outcome
    }

    async fn run_parallel(&self, tasks: Vec<Task>) -> BatchOutcome {
        let handles: Vec<_> = tasks
            .into_iter()
            .map(|task| {
                let task_id = task.id.clone();
                let handle = tokio::spawn(dispatch_task(
                    self.pool.clone(),
                    self.events.clone(),
                    self.weighting,
                    task,
                ));
                (task_id, handle)
            })
            .collect();

        let mut outcome = BatchOutcome::default();
        for (task_id, handle) in handles {
            match handle.await {
                Ok(Ok(result)) => outcome.results.push(result),
                Ok(Err(error)) => outcome.errors.push(error),
                Err(join_error) => outcome.errors.push(TaskError {
                    task_id,
                    worker_id: None,
                    error: format!("task panicked: {}", join_error),
                }),
            }
        }
        outcome
    }

    async fn run_swarm(&self, tasks: Vec<Task>) -> BatchOutcome {
        let slots = self.max_workers.min(tasks.len().max(1));
        let queue: Arc<Mutex<VecDeque<Task>>> = Arc::new(Mutex::new(tasks.into()));

        let workers: Vec<_> = (0..slots)
            .map(|_| {
                let queue = queue.clone();
                let pool = self.pool.clone();
                let events = self.events.clone();
                let weighting = self.weighting;
                let cancel = self.cancel_token.clone();

                tokio::spawn(async move {
                    let mut outcome = BatchOutcome::default();
                    loop {
                        let task = {
                            let mut queue = queue.lock().unwrap();
                            if cancel.is_cancelled() {
                                // Stop waiting; drain the rest as cancelled.
                                while let Some(task) = queue.pop_front() {
                                    outcome.errors.push(Self::cancelled(&task));
                                }
                                break;
                            }
                            queue.pop_front()
                        };
                        let Some(task) = task else { break };

                        match dispatch_task(pool.clone(), events.clone(), weighting, task).await {
                            Ok(result) => outcome.results.push(result),
                            Err(error) => outcome.errors.push(error),
                        }
                    }
                    outcome
                })
            })
            .collect();

        let mut merged = BatchOutcome::default();
        for handle in futures::future::join_all(workers).await {
            match handle {
                Ok(outcome) => {
                    merged.results.extend(outcome.results);
                    merged.errors.extend(outcome.errors);
                }
                Err(join_error) => merged.errors.push(TaskError {
                    task_id: String::new(),
                    worker_id: None,
                    error: format!("swarm worker panicked: {}", join_error),
                }),
            }
        }
        merged
    }

    /// Fan one decision prompt out to every eligible idle voter in
    /// parallel and aggregate their votes. A voter that errors or times
    /// out degrades to an abstention rather than sinking the round.
    pub async fn run_round(&self, prompt: &str, options: RoundOptions) -> ConsensusResult {
        let round_id = uuid::Uuid::new_v4().to_string();
        let voters: Vec<String> = self
            .pool
            .workers()
            .await
            .into_iter()
            .filter(|w| w.status == WorkerStatus::Idle)
            .filter(|w| options.required_role.map_or(true, |r| w.role == r))
            .map(|w| w.id)
            .collect();

        self.events.emit(OrchestratorEvent::RoundStarted {
            round_id: round_id.clone(),
            voters: voters.len(),
        });
        info!(round = %round_id, voters = voters.len(), "Consensus round started");

        let handles: Vec<_> = voters
            .into_iter()
            .map(|worker_id| {
                let pool = self.pool.clone();
                let events = self.events.clone();
                let prompt = prompt.to_string();
                let timeout = options.timeout;
                let round_id = round_id.clone();

                tokio::spawn(async move {
                    let vote = collect_vote(pool, &worker_id, &prompt, timeout).await;
                    events.emit(OrchestratorEvent::VoteCast {
                        round_id,
                        worker_id: vote.worker_id.clone(),
                        decision: vote.decision,
                        confidence: vote.confidence,
                    });
                    vote
                })
            })
            .collect();

        let mut votes = Vec::new();
        for handle in futures::future::join_all(handles).await {
            if let Ok(vote) = handle {
                votes.push(vote);
            }
        }

        let result = self.aggregator.aggregate(votes);
        self.events.emit(OrchestratorEvent::RoundCompleted {
            round_id: round_id.clone(),
            decision: result.decision,
            agreement: result.agreement,
            confidence: result.confidence,
        });
        info!(
            round = %round_id,
            decision = %result.decision,
            agreement = format!("{:.3}", result.agreement),
            "Consensus round completed"
        );
        result
    }

    fn cancelled(task: &Task) -> TaskError {
        TaskError {
            task_id: task.id.clone(),
            worker_id: None,
            error: "batch cancelled".into(),
        }
    }
}

/// Run one task end to end: acquire a worker, race the executor against
/// the task timeout, and bracket the worker's status around the outcome.
async fn dispatch_task(
    pool: Arc<AgentPool>,
    events: Arc<EventBus>,
    weighting: SelectionWeighting,
    mut task: Task,
) -> Result<TaskResult, TaskError> {
    let lease = match pool.acquire(&task, weighting).await {
        Ok(lease) => lease,
        Err(e) => {
            task.advance(TaskStatus::Failed);
            task.error = Some(e.to_string());
            events.emit(OrchestratorEvent::TaskFailed {
                task_id: task.id.clone(),
                worker_id: None,
                error: e.to_string(),
            });
            return Err(TaskError {
                task_id: task.id,
                worker_id: None,
                error: e.to_string(),
            });
        }
    };

    task.advance(TaskStatus::Assigned);
    events.emit(OrchestratorEvent::TaskStarted {
        task_id: task.id.clone(),
        worker_id: lease.worker_id.clone(),
    });
    task.advance(TaskStatus::Running);

    let prompt = task.payload.to_prompt();
    let start = Instant::now();
    let outcome = invoke_with_timeout(lease.executor.as_ref(), &prompt, task.timeout).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(outcome) => {
            pool.release(&lease.worker_id, true).await;
            pool.record_cost(CostRecord::new(&lease.worker_id).with_latency(duration_ms)).await;

            let output = outcome.into_output();
            task.result = Some(output.clone());
            task.advance(TaskStatus::Completed);
            events.emit(OrchestratorEvent::TaskCompleted {
                task_id: task.id.clone(),
                worker_id: lease.worker_id.clone(),
                duration_ms,
            });
            Ok(TaskResult {
                task_id: task.id,
                worker_id: lease.worker_id,
                output,
                duration_ms,
            })
        }
        Err(e) => {
            pool.release(&lease.worker_id, false).await;
            pool.record_cost(
                CostRecord::new(&lease.worker_id).with_latency(duration_ms).failed(),
            ).await;

            task.error = Some(e.to_string());
            task.advance(TaskStatus::Failed);
            events.emit(OrchestratorEvent::TaskFailed {
                task_id: task.id.clone(),
                worker_id: Some(lease.worker_id.clone()),
                error: e.to_string(),
            });
            Err(TaskError {
                task_id: task.id,
                worker_id: Some(lease.worker_id),
                error: e.to_string(),
            })
        }
    }
}

/// One voter's contribution to a round. Any failure degrades to a
/// neutral abstention carrying the error.
async fn collect_vote(
    pool: Arc<AgentPool>,
    worker_id: &str,
    prompt: &str,
    timeout: Duration,
) -> Vote {
    let lease = match pool.checkout(worker_id).await {
        Ok(lease) => lease,
        Err(e) => return Vote::errored(worker_id, e.to_string(), 0),
    };

    let start = Instant::now();
    let outcome = invoke_with_timeout(lease.executor.as_ref(), prompt, timeout).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(ExecutorOutcome::Ballot(ballot)) => {
            pool.release(worker_id, true).await;
            pool.record_cost(CostRecord::new(worker_id).with_latency(latency_ms)).await;
            Vote::from_ballot(worker_id, ballot, latency_ms)
        }
        Ok(ExecutorOutcome::Output(_)) => {
            pool.release(worker_id, true).await;
            pool.record_cost(CostRecord::new(worker_id).with_latency(latency_ms)).await;
            Vote::errored(worker_id, "unstructured output for a decision prompt", latency_ms)
        }
        Err(e) => {
            pool.release(worker_id, false).await;
            pool.record_cost(
                CostRecord::new(worker_id).with_latency(latency_ms).failed(),
            ).await;
            Vote::errored(worker_id, e.to_string(), latency_ms)
        }
    }
}
