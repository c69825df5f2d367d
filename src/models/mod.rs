pub mod worker;
pub mod task;
pub mod vote;
pub mod consensus;

pub use worker::*;
pub use task::*;
pub use vote::*;
pub use consensus::*;
