use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::models::vote::Decision;
use super::mode::Mode;

/// Messages emitted by the controller for real-time consumers
/// (progress display, webhook delivery, embedder dashboards).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    BatchStarted {
        batch_id: String,
        mode: Mode,
        task_count: usize,
    },
    TaskStarted {
        task_id: String,
        worker_id: String,
    },
    TaskCompleted {
        task_id: String,
        worker_id: String,
        duration_ms: u64,
    },
    TaskFailed {
        task_id: String,
        worker_id: Option<String>,
        error: String,
    },
    BatchCompleted {
        batch_id: String,
        completed: usize,
        failed: usize,
        duration_ms: u64,
    },
    RoundStarted {
        round_id: String,
        voters: usize,
    },
    VoteCast {
        round_id: String,
        worker_id: String,
        decision: Decision,
        confidence: f64,
    },
    RoundCompleted {
        round_id: String,
        decision: Decision,
        agreement: f64,
        confidence: f64,
    },
}

pub type SubscriptionId = u64;

/// Fan-out hub for orchestrator events.
///
/// Subscribers get their own unbounded channel and drain it at their own
/// pace; emitting never blocks on a slow subscriber. Channels whose
/// receiver is gone are pruned on the next emit.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<(SubscriptionId, mpsc::UnboundedSender<OrchestratorEvent>)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<OrchestratorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().unwrap().push((id, tx));
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.write().unwrap().retain(|(sub_id, _)| *sub_id != id);
    }

    pub fn emit(&self, event: OrchestratorEvent) {
        let mut subscribers = self.subscribers.write().unwrap();
        subscribers.retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap().len()
    }
}
