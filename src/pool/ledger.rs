use std::collections::VecDeque;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cap on retained ledger entries; the oldest entry is evicted first.
pub const MAX_LEDGER_ENTRIES: usize = 1000;

/// One usage sample for one worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRecord {
    pub worker_id: String,
    pub timestamp: DateTime<Utc>,
    pub tokens: u64,
    pub calls: u32,
    pub cost_usd: f64,
    pub latency_ms: u64,
    pub success: bool,
}

impl CostRecord {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            timestamp: Utc::now(),
            tokens: 0,
            calls: 1,
            cost_usd: 0.0,
            latency_ms: 0,
            success: true,
        }
    }

    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = cost_usd;
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }
}

/// Rolling statistics for a single worker, derived from its own ledger
/// entries only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerStats {
    pub samples: usize,
    pub avg_cost_usd: f64,
    pub avg_latency_ms: f64,
    pub success_rate: f64,
    pub total_cost_usd: f64,
}

/// Bounded, time-ordered usage ledger shared by all workers in a pool.
#[derive(Debug, Default)]
pub struct CostLedger {
    entries: VecDeque<CostRecord>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: CostRecord) {
        if self.entries.len() >= MAX_LEDGER_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stats over this worker's entries; `None` when it has no history.
    pub fn stats_for(&self, worker_id: &str) -> Option<WorkerStats> {
        let mut samples = 0usize;
        let mut cost = 0.0;
        let mut latency = 0u64;
        let mut successes = 0usize;

        for record in self.entries.iter().filter(|r| r.worker_id == worker_id) {
            samples += 1;
            cost += record.cost_usd;
            latency += record.latency_ms;
            if record.success {
                successes += 1;
            }
        }

        if samples == 0 {
            return None;
        }

        Some(WorkerStats {
            samples,
            avg_cost_usd: cost / samples as f64,
            avg_latency_ms: latency as f64 / samples as f64,
            success_rate: successes as f64 / samples as f64,
            total_cost_usd: cost,
        })
    }

    pub fn total_cost_usd(&self) -> f64 {
        self.entries.iter().map(|r| r.cost_usd).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_only_from_own_entries() {
        let mut ledger = CostLedger::new();
        ledger.push(CostRecord::new("a").with_cost(0.10).with_latency(100));
        ledger.push(CostRecord::new("b").with_cost(9.99).with_latency(9000));
        ledger.push(CostRecord::new("a").with_cost(0.30).with_latency(300).failed());

        let stats = ledger.stats_for("a").unwrap();
        assert_eq!(stats.samples, 2);
        assert!((stats.avg_cost_usd - 0.20).abs() < 1e-9);
        assert!((stats.avg_latency_ms - 200.0).abs() < 1e-9);
        assert!((stats.success_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_no_history_no_stats() {
        let ledger = CostLedger::new();
        assert!(ledger.stats_for("ghost").is_none());
    }

    #[test]
    fn test_oldest_entry_evicted_at_cap() {
        let mut ledger = CostLedger::new();
        for i in 0..MAX_LEDGER_ENTRIES {
            ledger.push(CostRecord::new(format!("w{}", i)));
        }
        assert_eq!(ledger.len(), MAX_LEDGER_ENTRIES);
        assert!(ledger.stats_for("w0").is_some());

        ledger.push(CostRecord::new("newest"));
        assert_eq!(ledger.len(), MAX_LEDGER_ENTRIES);
        assert!(ledger.stats_for("w0").is_none()); // evicted
        assert!(ledger.stats_for("newest").is_some());
    }
}
