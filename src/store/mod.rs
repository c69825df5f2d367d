use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::ConclaveError;

/// Durable key/value storage consumed by the lifecycle and suspension
/// components.
///
/// Implementations must survive process restarts (the in-memory store is
/// the explicit degraded fallback). A corrupted record is the caller's
/// problem: callers fall back to a freshly-initialized default and log
/// the anomaly rather than crashing.
pub trait PersistenceStore: Send + Sync {
    fn save(&self, key: &str, value: &serde_json::Value) -> Result<(), ConclaveError>;
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, ConclaveError>;
    fn list(&self, prefix: &str) -> Result<Vec<String>, ConclaveError>;
    fn delete(&self, key: &str) -> Result<bool, ConclaveError>;
}

/// In-process store used by tests and as the degraded fallback when
/// durable storage is unavailable.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceStore for MemoryStore {
    fn save(&self, key: &str, value: &serde_json::Value) -> Result<(), ConclaveError> {
        self.records
            .write()
            .map_err(|_| ConclaveError::Persistence("store lock poisoned".into()))?
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, ConclaveError> {
        Ok(self
            .records
            .read()
            .map_err(|_| ConclaveError::Persistence("store lock poisoned".into()))?
            .get(key)
            .cloned())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, ConclaveError> {
        let records = self
            .records
            .read()
            .map_err(|_| ConclaveError::Persistence("store lock poisoned".into()))?;
        let mut keys: Vec<String> = records
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn delete(&self, key: &str) -> Result<bool, ConclaveError> {
        Ok(self
            .records
            .write()
            .map_err(|_| ConclaveError::Persistence("store lock poisoned".into()))?
            .remove(key)
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        store.save("agent/1", &serde_json::json!({"status": "idle"})).unwrap();

        let loaded = store.load("agent/1").unwrap().unwrap();
        assert_eq!(loaded["status"], "idle");
    }

    #[test]
    fn test_memory_store_missing_key() {
        let store = MemoryStore::new();
        assert!(store.load("nope").unwrap().is_none());
        assert!(!store.delete("nope").unwrap());
    }

    #[test]
    fn test_memory_store_list_by_prefix() {
        let store = MemoryStore::new();
        store.save("suspension/a", &serde_json::json!(1)).unwrap();
        store.save("suspension/b", &serde_json::json!(2)).unwrap();
        store.save("agent/x", &serde_json::json!(3)).unwrap();

        let keys = store.list("suspension/").unwrap();
        assert_eq!(keys, vec!["suspension/a", "suspension/b"]);
    }
}
