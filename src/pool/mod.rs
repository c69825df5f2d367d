pub mod ledger;
pub mod registry;

pub use ledger::{CostLedger, CostRecord, WorkerStats, MAX_LEDGER_ENTRIES};
pub use registry::{AgentPool, LeasedWorker, SelectionWeighting};
