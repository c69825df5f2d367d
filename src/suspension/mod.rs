pub mod record;
pub mod registry;

pub use record::{SuspendedPipeline, SuspensionFilter};
pub use registry::{ResumedPipeline, SuspensionRegistry};
