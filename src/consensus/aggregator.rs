use std::collections::HashMap;
use chrono::Utc;
use tracing::debug;

use crate::models::consensus::ConsensusResult;
use crate::models::vote::{Decision, Vote};

/// Combines independent votes into one decision with a quantified
/// agreement score.
///
/// Each voter carries a weight (default 1.0). For every decision the
/// aggregator accumulates `weight x confidence` over its voters; the
/// decision with the largest mass wins, `agreement` is the winner's
/// share of the accumulated mass, and `confidence` is the weighted
/// average confidence scaled down by disagreement. Neutral (abstaining
/// or errored) voters carry zero confidence: they drag `confidence`
/// down through the weighted average but never push any decision's
/// tally. Ties break by the fixed [`Decision::ALL`] order, so repeated
/// runs over the same vote set are reproducible regardless of arrival
/// order.
///
/// The aggregator never filters: actionability is the caller's call,
/// via [`ConsensusGate`].
#[derive(Debug, Clone, Default)]
pub struct ConsensusAggregator {
    weights: HashMap<String, f64>,
}

impl ConsensusAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a voter's weight. Negative weights are treated as zero.
    pub fn with_weight(mut self, worker_id: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(worker_id.into(), weight.max(0.0));
        self
    }

    pub fn set_weight(&mut self, worker_id: impl Into<String>, weight: f64) {
        self.weights.insert(worker_id.into(), weight.max(0.0));
    }

    pub fn weight_of(&self, worker_id: &str) -> f64 {
        self.weights.get(worker_id).copied().unwrap_or(1.0)
    }

    pub fn aggregate(&self, votes: Vec<Vote>) -> ConsensusResult {
        if votes.is_empty() {
            return ConsensusResult::empty();
        }

        let mut mass: HashMap<Decision, f64> = HashMap::new();
        let mut total_mass = 0.0;
        let mut total_weight = 0.0;
        let mut weighted_confidence = 0.0;
        let mut total_latency_ms = 0u64;

        for vote in &votes {
            let weight = self.weight_of(&vote.worker_id);
            total_weight += weight;
            weighted_confidence += vote.confidence * weight;
            total_latency_ms += vote.latency_ms;

            if !vote.decision.is_neutral() {
                let contribution = weight * vote.confidence;
                *mass.entry(vote.decision).or_insert(0.0) += contribution;
                total_mass += contribution;
            }
        }

        // Fixed enumeration order decides ties, not vote arrival order.
        let mut decision = Decision::Abstain;
        let mut winning_mass = 0.0;
        for candidate in Decision::ALL.iter().filter(|d| !d.is_neutral()) {
            let m = mass.get(candidate).copied().unwrap_or(0.0);
            if m > winning_mass {
                winning_mass = m;
                decision = *candidate;
            }
        }

        let agreement = if total_mass > 0.0 {
            winning_mass / total_mass
        } else {
            0.0
        };
        let confidence = if total_weight > 0.0 {
            (weighted_confidence / total_weight) * agreement
        } else {
            0.0
        };

        debug!(
            %decision,
            agreement = format!("{:.3}", agreement),
            confidence = format!("{:.3}", confidence),
            voters = votes.len(),
            "Consensus round aggregated"
        );

        ConsensusResult {
            decision,
            confidence,
            agreement,
            votes,
            total_latency_ms,
            timestamp: Utc::now(),
        }
    }
}

/// Caller-side actionability thresholds. The aggregator reports every
/// round; whether the result is acted on is decided here.
#[derive(Debug, Clone, Copy)]
pub struct ConsensusGate {
    pub min_agreement: f64,
    pub min_confidence: f64,
}

impl Default for ConsensusGate {
    fn default() -> Self {
        Self {
            min_agreement: 0.5,
            min_confidence: 0.3,
        }
    }
}

impl ConsensusGate {
    pub fn is_actionable(&self, result: &ConsensusResult) -> bool {
        result.agreement >= self.min_agreement && result.confidence >= self.min_confidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::vote::Ballot;

    fn vote(worker: &str, decision: Decision, confidence: f64) -> Vote {
        Vote::from_ballot(worker, Ballot::new(decision, confidence, ""), 10)
    }

    #[test]
    fn test_weighted_majority_wins() {
        let aggregator = ConsensusAggregator::new();
        let result = aggregator.aggregate(vec![
            vote("a", Decision::Proceed, 0.8),
            vote("b", Decision::Proceed, 0.7),
            vote("c", Decision::Reject, 0.9),
        ]);

        assert_eq!(result.decision, Decision::Proceed);
        // (0.8 + 0.7) / (0.8 + 0.7 + 0.9)
        assert!((result.agreement - 0.625).abs() < 1e-9);
        // mean confidence 0.8 scaled by agreement
        assert!((result.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_bounds_hold_for_all_inputs() {
        let aggregator = ConsensusAggregator::new().with_weight("heavy", 10.0);
        let result = aggregator.aggregate(vec![
            vote("heavy", Decision::Reject, 1.0),
            vote("a", Decision::Proceed, 0.2),
            Vote::errored("b", "boom", 100),
        ]);

        assert!(result.agreement >= 0.0 && result.agreement <= 1.0);
        assert!(result.confidence >= 0.0 && result.confidence <= 1.0);
        assert_eq!(result.decision, Decision::Reject);
    }

    #[test]
    fn test_zero_voters_is_neutral() {
        let result = ConsensusAggregator::new().aggregate(vec![]);
        assert_eq!(result.decision, Decision::Abstain);
        assert_eq!(result.agreement, 0.0);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_all_abstain_is_neutral() {
        let result = ConsensusAggregator::new().aggregate(vec![
            Vote::errored("a", "timeout", 5000),
            Vote::errored("b", "timeout", 5000),
        ]);
        assert_eq!(result.decision, Decision::Abstain);
        assert_eq!(result.agreement, 0.0);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_errored_voter_drags_confidence_not_tally() {
        let aggregator = ConsensusAggregator::new();
        let clean = aggregator.aggregate(vec![vote("a", Decision::Proceed, 0.9)]);
        let degraded = aggregator.aggregate(vec![
            vote("a", Decision::Proceed, 0.9),
            Vote::errored("b", "deadline", 5000),
        ]);

        assert_eq!(clean.decision, degraded.decision);
        assert_eq!(degraded.agreement, clean.agreement); // tally untouched
        assert!(degraded.confidence < clean.confidence); // average dragged down
    }

    #[test]
    fn test_tie_breaks_by_enumeration_order_not_arrival() {
        let aggregator = ConsensusAggregator::new();
        // Reject arrives first but Proceed precedes it in the enumeration.
        let result = aggregator.aggregate(vec![
            vote("a", Decision::Reject, 0.6),
            vote("b", Decision::Proceed, 0.6),
        ]);
        assert_eq!(result.decision, Decision::Proceed);

        // Same votes, reversed arrival: identical outcome.
        let result = aggregator.aggregate(vec![
            vote("b", Decision::Proceed, 0.6),
            vote("a", Decision::Reject, 0.6),
        ]);
        assert_eq!(result.decision, Decision::Proceed);
    }

    #[test]
    fn test_weights_shift_the_winner() {
        let aggregator = ConsensusAggregator::new().with_weight("expert", 3.0);
        let result = aggregator.aggregate(vec![
            vote("a", Decision::Proceed, 0.8),
            vote("b", Decision::Proceed, 0.8),
            vote("expert", Decision::Hold, 0.9),
        ]);
        // expert: 2.7 vs proceed: 1.6
        assert_eq!(result.decision, Decision::Hold);
    }

    #[test]
    fn test_distribution_sums_to_one() {
        let aggregator = ConsensusAggregator::new().with_weight("a", 2.0);
        let result = aggregator.aggregate(vec![
            vote("a", Decision::Proceed, 0.5),
            vote("b", Decision::Reject, 0.5),
            Vote::errored("c", "x", 0),
        ]);
        let dist = result.weight_distribution(|id| aggregator.weight_of(id));
        let sum: f64 = dist.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_gate_is_caller_policy() {
        let aggregator = ConsensusAggregator::new();
        let result = aggregator.aggregate(vec![
            vote("a", Decision::Proceed, 0.4),
            vote("b", Decision::Reject, 0.4),
        ]);

        // The aggregator reported a split round untouched.
        assert_eq!(result.votes.len(), 2);

        let strict = ConsensusGate { min_agreement: 0.9, min_confidence: 0.5 };
        assert!(!strict.is_actionable(&result));

        let lax = ConsensusGate { min_agreement: 0.1, min_confidence: 0.0 };
        assert!(lax.is_actionable(&result));
    }
}
