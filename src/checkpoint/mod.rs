pub mod git;

pub use git::GitCheckpointBackend;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ConclaveError;

/// An immutable, restorable snapshot reference tied to a lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Content-addressed snapshot id.
    pub id: String,
    pub label: String,
    pub ordinal: u32,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

/// Content-addressed snapshot store.
///
/// The lifecycle does not know how snapshots are taken; it only relies on
/// this contract. A backend whose working directory is not a versioned
/// snapshot-capable root fails every call with `NotVersioned` rather than
/// crashing.
#[async_trait]
pub trait CheckpointBackend: Send + Sync {
    async fn checkpoint(
        &self,
        label: &str,
        ordinal: u32,
        session_id: &str,
    ) -> Result<Checkpoint, ConclaveError>;

    /// Restore the working directory to `checkpoint_id` and return its
    /// metadata.
    async fn restore(&self, checkpoint_id: &str) -> Result<Checkpoint, ConclaveError>;

    async fn list(&self, session_id: &str) -> Result<Vec<Checkpoint>, ConclaveError>;

    /// Attach a human-readable name to a checkpoint for later lookup.
    async fn tag(&self, checkpoint_id: &str, name: &str) -> Result<(), ConclaveError>;

    async fn get_by_tag(&self, name: &str) -> Result<Checkpoint, ConclaveError>;
}
