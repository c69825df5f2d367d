use std::time::Duration;
use async_trait::async_trait;

use crate::errors::ConclaveError;
use crate::models::vote::{Ballot, Decision};

/// What an executor invocation produced: a structured vote for decision
/// tasks, or free text for side-effecting jobs.
#[derive(Debug, Clone)]
pub enum ExecutorOutcome {
    Ballot(Ballot),
    Output(String),
}

impl ExecutorOutcome {
    pub fn into_output(self) -> String {
        match self {
            Self::Ballot(b) => format!("{} ({:.2}): {}", b.decision, b.confidence, b.rationale),
            Self::Output(s) => s,
        }
    }
}

/// The opaque decision service behind a worker.
///
/// May be slow, may fail, may hang; callers bound every invocation with
/// a timeout. No assumption is made about the underlying transport.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<ExecutorOutcome, ConclaveError>;

    /// Executor name for logging
    fn name(&self) -> &str;
}

/// Race an invocation against `timeout`. Whichever resolves first wins;
/// the loser's result is discarded. A lost race surfaces as `Timeout`,
/// never as an invocation left pending.
pub async fn invoke_with_timeout(
    executor: &dyn Executor,
    prompt: &str,
    timeout: Duration,
) -> Result<ExecutorOutcome, ConclaveError> {
    match tokio::time::timeout(timeout, executor.invoke(prompt)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ConclaveError::Timeout(format!(
            "{} exceeded {}ms",
            executor.name(),
            timeout.as_millis()
        ))),
    }
}

/// Canned executor used by `--dry-run` and tests: replays a fixed
/// outcome after an optional delay, with no external service involved.
pub struct ScriptedExecutor {
    name: String,
    outcome: ScriptedOutcome,
    delay: Duration,
}

enum ScriptedOutcome {
    Ballot(Ballot),
    Output(String),
    Failure(String),
    Hang,
}

impl ScriptedExecutor {
    pub fn ballot(name: impl Into<String>, decision: Decision, confidence: f64) -> Self {
        Self {
            name: name.into(),
            outcome: ScriptedOutcome::Ballot(Ballot::new(decision, confidence, "scripted")),
            delay: Duration::ZERO,
        }
    }

    pub fn output(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: ScriptedOutcome::Output(text.into()),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: ScriptedOutcome::Failure(error.into()),
            delay: Duration::ZERO,
        }
    }

    /// Never resolves; only the caller's timeout ends the invocation.
    pub fn hanging(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: ScriptedOutcome::Hang,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn invoke(&self, _prompt: &str) -> Result<ExecutorOutcome, ConclaveError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.outcome {
            ScriptedOutcome::Ballot(b) => Ok(ExecutorOutcome::Ballot(b.clone())),
            ScriptedOutcome::Output(s) => Ok(ExecutorOutcome::Output(s.clone())),
            ScriptedOutcome::Failure(e) => Err(ConclaveError::Executor(e.clone())),
            ScriptedOutcome::Hang => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
