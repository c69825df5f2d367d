use std::sync::Arc;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::errors::ConclaveError;
use crate::store::PersistenceStore;
use super::record::{SuspendedPipeline, SuspensionFilter};

const KEY_PREFIX: &str = "suspension/";

/// What a successful resume hands back to the pipeline runner: the
/// parked state plus the input to continue with.
#[derive(Debug, Clone)]
pub struct ResumedPipeline {
    pub pipeline_id: String,
    pub step: usize,
    pub state: serde_json::Value,
    pub resume_input: Option<serde_json::Value>,
}

/// Durable, queryable store of suspended pipelines.
///
/// Expiry is cooperative: nothing here runs on a clock. Callers invoke
/// `delete_expired` when they see fit, and `resume` re-checks expiry
/// itself so a stale record can never be revived just because cleanup
/// hasn't run.
pub struct SuspensionRegistry {
    store: Arc<dyn PersistenceStore>,
}

impl SuspensionRegistry {
    pub fn new(store: Arc<dyn PersistenceStore>) -> Self {
        Self { store }
    }

    fn key(id: &str) -> String {
        format!("{}{}", KEY_PREFIX, id)
    }

    pub fn save(&self, record: &SuspendedPipeline) -> Result<(), ConclaveError> {
        if let Some(expires_at) = record.expires_at {
            if expires_at <= record.suspended_at {
                return Err(ConclaveError::Config(format!(
                    "suspension {} expires at or before its suspension time",
                    record.id
                )));
            }
        }
        let value = serde_json::to_value(record)?;
        self.store.save(&Self::key(&record.id), &value)?;
        info!(
            suspension = %record.id,
            pipeline = %record.pipeline_id,
            step = record.step,
            reason = %record.reason,
            "Pipeline suspended"
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<SuspendedPipeline>, ConclaveError> {
        match self.store.load(&Self::key(id))? {
            Some(value) => match serde_json::from_value(value) {
                Ok(record) => Ok(Some(record)),
                Err(e) => {
                    warn!(suspension = %id, error = %e, "Unreadable suspension record");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub fn query(
        &self,
        filter: &SuspensionFilter,
        limit: usize,
    ) -> Result<Vec<SuspendedPipeline>, ConclaveError> {
        let now = Utc::now();
        let mut records = self.all()?;

        records.retain(|r| {
            if let Some(pipeline_id) = &filter.pipeline_id {
                if &r.pipeline_id != pipeline_id {
                    return false;
                }
            }
            if let Some(expired) = filter.expired {
                if r.is_expired(now) != expired {
                    return false;
                }
            }
            true
        });

        records.sort_by_key(|r| r.suspended_at);
        records.truncate(limit);
        Ok(records)
    }

    pub fn delete(&self, id: &str) -> Result<bool, ConclaveError> {
        self.store.delete(&Self::key(id))
    }

    pub fn delete_by_pipeline(&self, pipeline_id: &str) -> Result<usize, ConclaveError> {
        let mut deleted = 0;
        for record in self.all()? {
            if record.pipeline_id == pipeline_id && self.delete(&record.id)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Cooperative cleanup: remove every record expired as of `now`.
    pub fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, ConclaveError> {
        let mut deleted = 0;
        for record in self.all()? {
            if record.is_expired(now) && self.delete(&record.id)? {
                deleted += 1;
            }
        }
        if deleted > 0 {
            info!(count = deleted, "Expired suspensions removed");
        }
        Ok(deleted)
    }

    pub fn count(&self) -> Result<usize, ConclaveError> {
        Ok(self.store.list(KEY_PREFIX)?.len())
    }

    pub fn count_expired(&self, now: DateTime<Utc>) -> Result<usize, ConclaveError> {
        Ok(self.all()?.iter().filter(|r| r.is_expired(now)).count())
    }

    /// Hand a parked pipeline back to its runner.
    ///
    /// Fails with `NotFound` for unknown ids and `Expired` for records
    /// past their TTL (checked now, regardless of cleanup). On success
    /// the record is deleted; a caller-supplied `input` overrides the
    /// stored resume input.
    pub fn resume(
        &self,
        id: &str,
        input: Option<serde_json::Value>,
    ) -> Result<ResumedPipeline, ConclaveError> {
        let record = self
            .get(id)?
            .ok_or_else(|| ConclaveError::NotFound(format!("suspension {}", id)))?;

        if record.is_expired(Utc::now()) {
            return Err(ConclaveError::Expired(format!(
                "suspension {} expired at {}",
                id,
                record.expires_at.map(|e| e.to_rfc3339()).unwrap_or_default()
            )));
        }

        let resumed = ResumedPipeline {
            pipeline_id: record.pipeline_id.clone(),
            step: record.step,
            state: record.state.clone(),
            resume_input: input.or(record.resume_input.clone()),
        };

        self.delete(id)?;
        info!(suspension = %id, pipeline = %resumed.pipeline_id, "Pipeline resumed");
        Ok(resumed)
    }

    fn all(&self) -> Result<Vec<SuspendedPipeline>, ConclaveError> {
        let keys = self.store.list(KEY_PREFIX)?;
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.store.load(&key)? {
                match serde_json::from_value(value) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(key = %key, error = %e, "Skipping unreadable suspension record"),
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::db::Database;
    use crate::store::MemoryStore;

    fn registry() -> SuspensionRegistry {
        SuspensionRegistry::new(Arc::new(MemoryStore::new()))
    }

    fn record(pipeline: &str) -> SuspendedPipeline {
        SuspendedPipeline::new(pipeline, 2, serde_json::json!({"cursor": 5}), "awaiting approval")
    }

    #[test]
    fn test_save_rejects_expiry_before_suspension() {
        let reg = registry();
        let bad = record("p1").with_expiry(Utc::now() - Duration::hours(1));
        assert!(matches!(reg.save(&bad).unwrap_err(), ConclaveError::Config(_)));
    }

    #[test]
    fn test_save_get_delete_round_trip() {
        let reg = registry();
        let rec = record("p1");
        reg.save(&rec).unwrap();

        let loaded = reg.get(&rec.id).unwrap().unwrap();
        assert_eq!(loaded.pipeline_id, "p1");
        assert_eq!(loaded.step, 2);
        assert_eq!(loaded.state["cursor"], 5);

        assert!(reg.delete(&rec.id).unwrap());
        assert!(reg.get(&rec.id).unwrap().is_none());
    }

    #[test]
    fn test_resume_unknown_id_is_not_found() {
        let reg = registry();
        let err = reg.resume("missing", None).unwrap_err();
        assert!(matches!(err, ConclaveError::NotFound(_)));
    }

    #[test]
    fn test_resume_expired_fails_even_without_cleanup() {
        let reg = registry();
        let mut rec = record("p1");
        // Past expiry, written directly: save() would reject it, but a
        // record can age out between save and resume.
        rec.suspended_at = Utc::now() - Duration::hours(2);
        rec.expires_at = Some(Utc::now() - Duration::hours(1));
        let value = serde_json::to_value(&rec).unwrap();
        reg.store.save(&SuspensionRegistry::key(&rec.id), &value).unwrap();

        let err = reg.resume(&rec.id, None).unwrap_err();
        assert!(matches!(err, ConclaveError::Expired(_)));
        // Record still present: resume does not clean up a failed attempt
        assert!(reg.get(&rec.id).unwrap().is_some());
    }

    #[test]
    fn test_resume_deletes_record_and_overrides_input() {
        let reg = registry();
        let rec = record("p1").with_resume_input(serde_json::json!({"stored": true}));
        reg.save(&rec).unwrap();

        let resumed = reg.resume(&rec.id, Some(serde_json::json!({"override": 1}))).unwrap();
        assert_eq!(resumed.resume_input.unwrap()["override"], 1);
        assert!(reg.get(&rec.id).unwrap().is_none());

        let rec2 = record("p2").with_resume_input(serde_json::json!({"stored": true}));
        reg.save(&rec2).unwrap();
        let resumed = reg.resume(&rec2.id, None).unwrap();
        assert_eq!(resumed.resume_input.unwrap()["stored"], true);
    }

    #[test]
    fn test_query_filters_and_limit() {
        let reg = registry();
        reg.save(&record("p1")).unwrap();
        reg.save(&record("p1")).unwrap();
        reg.save(&record("p2")).unwrap();
        reg.save(&record("p2").with_expiry(Utc::now() + Duration::milliseconds(1))).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));

        let filter = SuspensionFilter { pipeline_id: Some("p1".into()), expired: None };
        assert_eq!(reg.query(&filter, 100).unwrap().len(), 2);
        assert_eq!(reg.query(&filter, 1).unwrap().len(), 1);

        let filter = SuspensionFilter { pipeline_id: None, expired: Some(true) };
        assert_eq!(reg.query(&filter, 100).unwrap().len(), 1);

        let filter = SuspensionFilter { pipeline_id: None, expired: Some(false) };
        assert_eq!(reg.query(&filter, 100).unwrap().len(), 3);
    }

    #[test]
    fn test_delete_by_pipeline_and_expired_counts() {
        let reg = registry();
        reg.save(&record("p1")).unwrap();
        reg.save(&record("p1")).unwrap();
        reg.save(&record("p2").with_expiry(Utc::now() + Duration::milliseconds(1))).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));

        assert_eq!(reg.count().unwrap(), 3);
        assert_eq!(reg.count_expired(Utc::now()).unwrap(), 1);

        assert_eq!(reg.delete_by_pipeline("p1").unwrap(), 2);
        assert_eq!(reg.delete_expired(Utc::now()).unwrap(), 1);
        assert_eq!(reg.count().unwrap(), 0);
    }

    #[test]
    fn test_works_over_sqlite_store() {
        let reg = SuspensionRegistry::new(Arc::new(Database::in_memory().unwrap()));
        let rec = record("durable");
        reg.save(&rec).unwrap();
        assert_eq!(reg.count().unwrap(), 1);

        let resumed = reg.resume(&rec.id, None).unwrap();
        assert_eq!(resumed.pipeline_id, "durable");
        assert_eq!(reg.count().unwrap(), 0);
    }
}
