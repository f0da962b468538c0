use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use agent::{
    Checkpoint, CheckpointError, CheckpointStore, RunId, RunState, Version, WritePrecondition,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::next_version;

/// On-disk layout of one checkpoint file.
#[derive(Serialize)]
struct StoredCheckpointRef<'a> {
    version: Version,
    state: &'a RunState,
}

#[derive(Deserialize)]
struct StoredCheckpoint {
    version: Version,
    state: RunState,
}

type LockTable = HashMap<RunId, Arc<tokio::sync::Mutex<()>>>;

/// Durable checkpoint storage: one `<run_id>.json` file per run.
///
/// Writes go to a temporary file that is flushed, `fsync`ed and renamed over
/// the target, so a crash leaves either the previous or the new checkpoint on
/// disk, never a torn one. Writes for the same run are serialized through a
/// per-run async lock; writes for different runs proceed in parallel.
pub struct FileCheckpointStore {
    base_path: PathBuf,
    locks: Mutex<LockTable>,
}

impl FileCheckpointStore {
    /// Opens (creating if necessary) a store rooted at `base_path`.
    pub async fn open(base_path: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let base_path = base_path.into();
        tokio::fs::create_dir_all(&base_path)
            .await
            .map_err(|e| unavailable(&base_path, e))?;
        info!(path = %base_path.display(), "Checkpoint store opened");
        Ok(Self {
            base_path,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Directory holding the checkpoint files.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Closes the store, waiting for any in-flight write to finish first.
    pub async fn close(self) {
        let locks: Vec<_> = self.lock_table().values().cloned().collect();
        for lock in locks {
            let _guard = lock.lock().await;
        }
        info!(path = %self.base_path.display(), "Checkpoint store closed");
    }

    pub(crate) fn run_path(&self, run_id: &RunId) -> Result<PathBuf, CheckpointError> {
        validate_run_id(run_id.as_str())?;
        Ok(self.base_path.join(format!("{run_id}.json")))
    }

    fn lock_table(&self) -> MutexGuard<'_, LockTable> {
        // The table only maps keys to locks; a panic while it was held cannot
        // leave it inconsistent.
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Takes the per-run write lock. The table entry is dropped again once
    /// no caller holds or waits for it.
    async fn lock_run(&self, run_id: &RunId) -> RunLock<'_> {
        let lock = Arc::clone(self.lock_table().entry(run_id.clone()).or_default());
        let guard = Arc::clone(&lock).lock_owned().await;
        RunLock {
            store: self,
            run_id: run_id.clone(),
            lock,
            guard: Some(guard),
        }
    }

    async fn read(&self, run_id: &RunId) -> Result<Option<StoredCheckpoint>, CheckpointError> {
        let path = self.run_path(run_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable(&path, e)),
        };
        let stored: StoredCheckpoint = serde_json::from_str(&content)
            .map_err(|e| CheckpointError::Serialization(format!("{}: {e}", path.display())))?;
        if stored.state.run_id() != run_id {
            return Err(CheckpointError::Serialization(format!(
                "{} holds run {}",
                path.display(),
                stored.state.run_id()
            )));
        }
        Ok(Some(stored))
    }

    async fn write_atomic(&self, path: &Path, content: &[u8]) -> Result<(), CheckpointError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("checkpoint");
        let tmp_path = self.base_path.join(format!(
            ".{file_name}.{}.tmp",
            uuid::Uuid::new_v4().simple()
        ));

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(content).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, path).await
        }
        .await;

        if let Err(e) = write_result {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                warn!(
                    path = %tmp_path.display(),
                    error = %cleanup,
                    "Failed to remove temporary checkpoint"
                );
            }
            return Err(unavailable(path, e));
        }
        self.sync_dir()
            .await
            .map_err(|e| unavailable(&self.base_path, e))
    }

    /// Flushes the directory so a completed rename survives power loss.
    #[cfg(unix)]
    async fn sync_dir(&self) -> std::io::Result<()> {
        tokio::fs::File::open(&self.base_path).await?.sync_all().await
    }

    /// Directories cannot be opened for syncing here; the rename is as durable
    /// as the platform makes it.
    #[cfg(not(unix))]
    async fn sync_dir(&self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Exclusive access to one run's checkpoint file.
struct RunLock<'a> {
    store: &'a FileCheckpointStore,
    run_id: RunId,
    lock: Arc<tokio::sync::Mutex<()>>,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for RunLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut table = self.store.lock_table();
        // Clones are only handed out under the table lock, so a count of two
        // (the table and `self.lock`) means nobody else holds or awaits it.
        if Arc::strong_count(&self.lock) == 2 {
            table.remove(&self.run_id);
        }
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(
        &self,
        state: &RunState,
        precondition: WritePrecondition,
    ) -> Result<Version, CheckpointError> {
        let run_id = state.run_id();
        let path = self.run_path(run_id)?;
        let _lock = self.lock_run(run_id).await;

        let current = self.read(run_id).await?.map(|stored| stored.version);
        let version = next_version(run_id, current, precondition)?;
        let content = serde_json::to_vec_pretty(&StoredCheckpointRef { version, state })
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        self.write_atomic(&path, &content).await?;

        debug!(run_id = %run_id, version, phase = state.phase().name(), "Checkpoint saved");
        Ok(version)
    }

    async fn load(&self, run_id: &RunId) -> Result<Checkpoint, CheckpointError> {
        let _lock = self.lock_run(run_id).await;
        self.read(run_id)
            .await?
            .map(|stored| Checkpoint {
                state: stored.state,
                version: stored.version,
            })
            .ok_or_else(|| CheckpointError::NotFound(run_id.clone()))
    }
}

/// Rejects run IDs that are unsafe as file names: path separators, `..`,
/// NUL and other control characters.
fn validate_run_id(run_id: &str) -> Result<(), CheckpointError> {
    if run_id.contains('/') || run_id.contains('\\') || run_id.contains("..") {
        return Err(CheckpointError::InvalidKey(format!(
            "run id contains path characters: {run_id:?}"
        )));
    }
    if run_id.chars().any(|c| c.is_control()) {
        return Err(CheckpointError::InvalidKey(format!(
            "run id contains control characters: {run_id:?}"
        )));
    }
    Ok(())
}

fn unavailable(path: &Path, error: std::io::Error) -> CheckpointError {
    CheckpointError::Unavailable(format!("{}: {error}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent::{Domain, Message, Task, ToolCall, ToolCallId, ToolName, ToolResult};
    use serde_json::json;
    use tempfile::TempDir;

    fn suspended_state(id: &str) -> RunState {
        let mut state = RunState::new(
            RunId::new(id).unwrap(),
            &Task {
                intent: Domain::Issue,
                instruction: "report the crash".into(),
            },
        );
        let call = ToolCall {
            id: ToolCallId::new("call-1").unwrap(),
            name: ToolName::new("create_issue").unwrap(),
            arguments: json!({"title": "Bug"}),
        };
        state.push_message(Message::assistant_tool_call("", call.clone()));
        state.suspend(call).unwrap();
        state
    }

    #[tokio::test]
    async fn suspended_run_survives_reopening_the_store() {
        let dir = TempDir::new().unwrap();
        let state = suspended_state("restart-1");
        {
            let store = FileCheckpointStore::open(dir.path()).await.unwrap();
            store.save(&state, WritePrecondition::Absent).await.unwrap();
            store.close().await;
        }

        let reopened = FileCheckpointStore::open(dir.path()).await.unwrap();
        let loaded = reopened.load(state.run_id()).await.unwrap();
        assert_eq!(loaded.version, 0);
        assert_eq!(loaded.state.messages(), state.messages());
        assert_eq!(loaded.state.pending_tool_call(), state.pending_tool_call());
        assert!(loaded.state.is_suspended());
    }

    #[tokio::test]
    async fn versions_increase_on_every_save() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path()).await.unwrap();
        let mut state = suspended_state("versions");
        assert_eq!(store.save(&state, WritePrecondition::Any).await.unwrap(), 0);
        state.decline(ToolResult::error("declined")).unwrap();
        assert_eq!(
            store.save(&state, WritePrecondition::Exact(0)).await.unwrap(),
            1
        );
        let err = store
            .save(&state, WritePrecondition::Exact(0))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckpointError::VersionConflict { actual: 1, .. }));
    }

    #[tokio::test]
    async fn concurrent_exact_writes_admit_exactly_one() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileCheckpointStore::open(dir.path()).await.unwrap());
        let state = suspended_state("race");
        let v0 = store.save(&state, WritePrecondition::Any).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                store.save(&state, WritePrecondition::Exact(v0)).await
            }));
        }
        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn load_of_unknown_run_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path()).await.unwrap();
        let err = store.load(&RunId::new("ghost").unwrap()).await.unwrap_err();
        assert!(matches!(err, CheckpointError::NotFound(_)));
    }

    #[tokio::test]
    async fn no_temporary_files_are_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path()).await.unwrap();
        store
            .save(&suspended_state("tidy"), WritePrecondition::Any)
            .await
            .unwrap();
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["tidy.json".to_string()]);
    }

    #[tokio::test]
    async fn lock_table_is_pruned_after_each_operation() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileCheckpointStore::open(dir.path()).await.unwrap());
        for i in 0..16 {
            let state = suspended_state(&format!("run-{i}"));
            store.save(&state, WritePrecondition::Absent).await.unwrap();
            store.load(state.run_id()).await.unwrap();
        }
        assert!(store.lock_table().is_empty());

        let state = suspended_state("busy");
        let v0 = store.save(&state, WritePrecondition::Any).await.unwrap();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                store.save(&state, WritePrecondition::Exact(v0)).await
            }));
        }
        for handle in handles {
            let _ = handle.await.unwrap();
        }
        assert!(store.lock_table().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn directory_sync_succeeds_on_the_store_root() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path()).await.unwrap();
        store.sync_dir().await.unwrap();
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path()).await.unwrap();
        for id in ["../../etc/passwd", "foo/bar", "foo\\bar", "foo\0bar"] {
            let run_id = RunId::new(id).unwrap();
            assert!(store.run_path(&run_id).is_err(), "{id:?}");
        }
    }
}
