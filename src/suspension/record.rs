use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A durably parked multi-step pipeline, awaiting resumption.
///
/// Distinct from a lifecycle checkpoint: this stores the pipeline's full
/// serialized state as JSON, not a filesystem snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendedPipeline {
    pub id: String,
    pub pipeline_id: String,
    /// Index of the step the pipeline was parked at.
    pub step: usize,
    pub state: serde_json::Value,
    pub reason: String,
    pub suspended_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub resume_input: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

impl SuspendedPipeline {
    pub fn new(
        pipeline_id: impl Into<String>,
        step: usize,
        state: serde_json::Value,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            pipeline_id: pipeline_id.into(),
            step,
            state,
            reason: reason.into(),
            suspended_at: Utc::now(),
            expires_at: None,
            resume_input: None,
            metadata: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_resume_input(mut self, input: serde_json::Value) -> Self {
        self.resume_input = Some(input);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|e| e <= now).unwrap_or(false)
    }
}

/// Query filters for [`super::SuspensionRegistry::query`].
#[derive(Debug, Clone, Default)]
pub struct SuspensionFilter {
    pub pipeline_id: Option<String>,
    /// `Some(true)` = expired only, `Some(false)` = live only.
    pub expired: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_no_expiry_never_expires() {
        let record = SuspendedPipeline::new("p1", 0, serde_json::json!({}), "waiting");
        assert!(!record.is_expired(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let record = SuspendedPipeline::new("p1", 0, serde_json::json!({}), "waiting")
            .with_expiry(now);
        assert!(record.is_expired(now));
        assert!(!record.is_expired(now - Duration::seconds(1)));
    }
}
