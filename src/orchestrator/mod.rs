pub mod mode;
pub mod events;
pub mod controller;

pub use mode::Mode;
pub use events::{EventBus, OrchestratorEvent, SubscriptionId};
pub use controller::{BatchOutcome, OrchestrationController, RoundOptions};
