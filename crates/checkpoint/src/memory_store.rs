use std::collections::HashMap;

use agent::{
    Checkpoint, CheckpointError, CheckpointStore, RunId, RunState, Version, WritePrecondition,
};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::next_version;

/// In-memory checkpoint storage for tests and local development.
///
/// Every write holds the map's write lock, so writes for one run (and for all
/// runs) are serialized. Nothing survives the process.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    entries: RwLock<HashMap<RunId, Checkpoint>>,
}

impl MemoryCheckpointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored runs.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if no run has been stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(
        &self,
        state: &RunState,
        precondition: WritePrecondition,
    ) -> Result<Version, CheckpointError> {
        let mut entries = self.entries.write().await;
        let current = entries.get(state.run_id()).map(|entry| entry.version);
        let version = next_version(state.run_id(), current, precondition)?;
        entries.insert(
            state.run_id().clone(),
            Checkpoint {
                state: state.clone(),
                version,
            },
        );
        Ok(version)
    }

    async fn load(&self, run_id: &RunId) -> Result<Checkpoint, CheckpointError> {
        self.entries
            .read()
            .await
            .get(run_id)
            .cloned()
            .ok_or_else(|| CheckpointError::NotFound(run_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent::{Domain, Task};

    fn state(id: &str) -> RunState {
        RunState::new(
            RunId::new(id).unwrap(),
            &Task {
                intent: Domain::Label,
                instruction: "tidy labels".into(),
            },
        )
    }

    #[tokio::test]
    async fn save_then_load_returns_same_state() {
        let store = MemoryCheckpointStore::new();
        let run = state("m1");
        let version = store.save(&run, WritePrecondition::Absent).await.unwrap();
        let loaded = store.load(run.run_id()).await.unwrap();
        assert_eq!(version, 0);
        assert_eq!(loaded.state, run);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn load_of_unknown_run_is_not_found() {
        let store = MemoryCheckpointStore::new();
        let err = store.load(&RunId::new("nope").unwrap()).await.unwrap_err();
        assert!(matches!(err, CheckpointError::NotFound(_)));
    }

    #[tokio::test]
    async fn only_one_of_two_exact_writes_succeeds() {
        let store = MemoryCheckpointStore::new();
        let run = state("m2");
        let v0 = store.save(&run, WritePrecondition::Any).await.unwrap();

        let first = store.save(&run, WritePrecondition::Exact(v0)).await;
        let second = store.save(&run, WritePrecondition::Exact(v0)).await;
        assert_eq!(first.unwrap(), 1);
        assert!(matches!(second, Err(CheckpointError::VersionConflict { .. })));
    }
}
