use std::collections::HashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::vote::{Decision, Vote};

/// Aggregated outcome of one consensus round. Derived, never mutated
/// after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub decision: Decision,
    /// Weighted average confidence scaled down by disagreement, 0.0-1.0.
    pub confidence: f64,
    /// Fraction of total vote weight behind the winning decision, 0.0-1.0.
    pub agreement: f64,
    pub votes: Vec<Vote>,
    pub total_latency_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl ConsensusResult {
    /// The round with no voters: neutral decision, zero confidence,
    /// zero agreement.
    pub fn empty() -> Self {
        Self {
            decision: Decision::Abstain,
            confidence: 0.0,
            agreement: 0.0,
            votes: Vec::new(),
            total_latency_ms: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn is_unanimous(&self) -> bool {
        !self.votes.is_empty()
            && self.votes.iter().all(|v| v.decision == self.decision)
    }

    /// Votes that did not back the winning decision.
    pub fn dissenting(&self) -> impl Iterator<Item = &Vote> {
        let winner = self.decision;
        self.votes.iter().filter(move |v| v.decision != winner)
    }

    /// Per-decision share of total vote weight. Shares sum to 1.0 for a
    /// non-empty round (abstaining weight included under `Abstain`).
    pub fn weight_distribution(&self, weight_of: impl Fn(&str) -> f64) -> HashMap<Decision, f64> {
        let mut mass: HashMap<Decision, f64> = HashMap::new();
        let mut total = 0.0;
        for vote in &self.votes {
            let w = weight_of(&vote.worker_id);
            *mass.entry(vote.decision).or_insert(0.0) += w;
            total += w;
        }
        if total > 0.0 {
            for share in mass.values_mut() {
                *share /= total;
            }
        }
        mass
    }
}
