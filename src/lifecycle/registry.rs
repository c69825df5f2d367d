use std::sync::Arc;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::checkpoint::CheckpointBackend;
use crate::errors::ConclaveError;
use crate::store::PersistenceStore;
use super::machine::AgentLifecycle;

/// Explicit registry of lifecycle machines, one per agent identity.
///
/// Handed around by reference instead of living as a module-level
/// singleton, so tests and embedders can run isolated instances. Each
/// agent's machine sits behind its own `tokio::Mutex`: concurrent
/// operations on the same identity queue, never interleave their
/// persisted writes; operations on different identities proceed in
/// parallel.
pub struct LifecycleRegistry {
    store: Arc<dyn PersistenceStore>,
    checkpoints: Arc<dyn CheckpointBackend>,
    agents: DashMap<String, Arc<Mutex<AgentLifecycle>>>,
}

impl LifecycleRegistry {
    pub fn new(store: Arc<dyn PersistenceStore>, checkpoints: Arc<dyn CheckpointBackend>) -> Self {
        Self {
            store,
            checkpoints,
            agents: DashMap::new(),
        }
    }

    /// Fetch (or lazily load) the lifecycle machine for `agent_id`.
    pub fn agent(&self, agent_id: &str) -> Arc<Mutex<AgentLifecycle>> {
        self.agents
            .entry(agent_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(AgentLifecycle::load(
                    agent_id,
                    self.store.clone(),
                    self.checkpoints.clone(),
                )))
            })
            .clone()
    }

    /// Identities with persisted state, whether or not they are loaded.
    pub fn persisted_ids(&self) -> Result<Vec<String>, ConclaveError> {
        let keys = self.store.list("agent/")?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix("agent/").map(str::to_string))
            .collect())
    }

    /// Drop an agent's persisted state and its in-memory machine.
    pub fn remove(&self, agent_id: &str) -> Result<bool, ConclaveError> {
        self.agents.remove(agent_id);
        self.store.delete(&format!("agent/{}", agent_id))
    }

    pub fn loaded_count(&self) -> usize {
        self.agents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::checkpoint::Checkpoint;
    use crate::lifecycle::state::AgentStatus;
    use crate::store::MemoryStore;

    struct NoopBackend;

    #[async_trait]
    impl CheckpointBackend for NoopBackend {
        async fn checkpoint(
            &self,
            label: &str,
            ordinal: u32,
            session_id: &str,
        ) -> Result<Checkpoint, ConclaveError> {
            Ok(Checkpoint {
                id: format!("cp-{}", ordinal),
                label: label.into(),
                ordinal,
                session_id: session_id.into(),
                created_at: chrono::Utc::now(),
            })
        }

        async fn restore(&self, id: &str) -> Result<Checkpoint, ConclaveError> {
            Err(ConclaveError::NotFound(id.into()))
        }

        async fn list(&self, _session_id: &str) -> Result<Vec<Checkpoint>, ConclaveError> {
            Ok(Vec::new())
        }

        async fn tag(&self, _id: &str, _name: &str) -> Result<(), ConclaveError> {
            Ok(())
        }

        async fn get_by_tag(&self, name: &str) -> Result<Checkpoint, ConclaveError> {
            Err(ConclaveError::NotFound(name.into()))
        }
    }

    fn registry() -> LifecycleRegistry {
        LifecycleRegistry::new(Arc::new(MemoryStore::new()), Arc::new(NoopBackend))
    }

    #[tokio::test]
    async fn test_same_id_returns_same_machine() {
        let reg = registry();
        let a = reg.agent("alpha");
        let b = reg.agent("alpha");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.loaded_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_ops_on_one_agent_serialize() {
        let reg = Arc::new(registry());
        reg.agent("alpha").lock().await.start(None).unwrap();

        let mut handles = Vec::new();
        for i in 0..16u32 {
            let reg = reg.clone();
            handles.push(tokio::spawn(async move {
                let machine = reg.agent("alpha");
                let mut guard = machine.lock().await;
                guard.set_progress(i as f64).unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let machine = reg.agent("alpha");
        let guard = machine.lock().await;
        // One entry per start + 16 progress updates: no lost writes.
        assert_eq!(guard.state().history.len(), 17);
    }

    #[tokio::test]
    async fn test_persisted_ids_and_remove() {
        let reg = registry();
        reg.agent("alpha").lock().await.start(None).unwrap();
        reg.agent("beta").lock().await.start(None).unwrap();

        let mut ids = reg.persisted_ids().unwrap();
        ids.sort();
        assert_eq!(ids, vec!["alpha", "beta"]);

        assert!(reg.remove("alpha").unwrap());
        assert_eq!(reg.persisted_ids().unwrap(), vec!["beta"]);
    }

    #[tokio::test]
    async fn test_state_survives_registry_restart() {
        let store = Arc::new(MemoryStore::new());
        {
            let reg = LifecycleRegistry::new(store.clone(), Arc::new(NoopBackend));
            let machine = reg.agent("alpha");
            let mut guard = machine.lock().await;
            guard.start(Some("ingest".into())).unwrap();
            guard.pause().unwrap();
        }

        let reg = LifecycleRegistry::new(store, Arc::new(NoopBackend));
        let machine = reg.agent("alpha");
        let guard = machine.lock().await;
        assert_eq!(guard.status(), AgentStatus::Paused);
        assert_eq!(guard.state().current_task.as_deref(), Some("ingest"));
    }
}
