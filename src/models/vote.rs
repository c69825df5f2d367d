use serde::{Deserialize, Serialize};

/// The closed action set a vote can choose from.
///
/// `ALL` fixes the iteration order used to break ties between decisions,
/// so repeated aggregations over the same vote set are reproducible
/// regardless of vote arrival order. `Abstain` is the neutral decision:
/// it carries voter weight but never wins on its own merit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Proceed,
    Reject,
    Hold,
    Abstain,
}

impl Decision {
    pub const ALL: [Decision; 4] = [
        Decision::Proceed,
        Decision::Reject,
        Decision::Hold,
        Decision::Abstain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proceed => "proceed",
            Self::Reject => "reject",
            Self::Hold => "hold",
            Self::Abstain => "abstain",
        }
    }

    pub fn is_neutral(&self) -> bool {
        matches!(self, Self::Abstain)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an executor hands back for a decision prompt, before the
/// orchestrator attributes it to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ballot {
    pub decision: Decision,
    /// 0.0 to 1.0, clamped on construction.
    pub confidence: f64,
    pub rationale: String,
}

impl Ballot {
    pub fn new(decision: Decision, confidence: f64, rationale: impl Into<String>) -> Self {
        Self {
            decision,
            confidence: confidence.clamp(0.0, 1.0),
            rationale: rationale.into(),
        }
    }

    /// The neutral ballot used when a voter times out or errors.
    pub fn abstain(rationale: impl Into<String>) -> Self {
        Self::new(Decision::Abstain, 0.0, rationale)
    }
}

/// One worker's opinion in a consensus round. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub worker_id: String,
    pub decision: Decision,
    pub confidence: f64,
    pub rationale: String,
    pub latency_ms: u64,
    pub error: Option<String>,
}

impl Vote {
    pub fn from_ballot(worker_id: impl Into<String>, ballot: Ballot, latency_ms: u64) -> Self {
        Self {
            worker_id: worker_id.into(),
            decision: ballot.decision,
            confidence: ballot.confidence,
            rationale: ballot.rationale,
            latency_ms,
            error: None,
        }
    }

    /// A vote degraded to neutral because the voter failed or timed out.
    pub fn errored(worker_id: impl Into<String>, error: impl Into<String>, latency_ms: u64) -> Self {
        let error = error.into();
        Self {
            worker_id: worker_id.into(),
            decision: Decision::Abstain,
            confidence: 0.0,
            rationale: String::new(),
            latency_ms,
            error: Some(error),
        }
    }

    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }
}
