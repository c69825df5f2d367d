pub mod state;
pub mod machine;
pub mod registry;

pub use state::{AgentState, AgentStatus, HistoryEntry, LifecycleAction, MAX_HISTORY_ENTRIES};
pub use machine::{AgentLifecycle, RestoreTarget};
pub use registry::LifecycleRegistry;
