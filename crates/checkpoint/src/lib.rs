//! Warden checkpoint store adapters.
//!
//! Implements the [`agent::CheckpointStore`] trait twice:
//!
//! - [`FileCheckpointStore`]: one JSON document per run in a directory,
//!   written atomically (temp file, `fsync`, rename). Survives process
//!   restarts. This is the production store.
//! - [`MemoryCheckpointStore`]: a process-local map for tests and
//!   throwaway runs.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Both stores serialize writes per run ID and enforce
//! [`agent::WritePrecondition`]s so the orchestration layer can claim a
//! suspension exactly once.

mod file_store;
mod memory_store;

pub use file_store::FileCheckpointStore;
pub use memory_store::MemoryCheckpointStore;

use agent::{CheckpointError, RunId, Version, WritePrecondition};

/// Checks `precondition` against the currently stored version and returns the
/// version the next write will carry.
pub(crate) fn next_version(
    run_id: &RunId,
    current: Option<Version>,
    precondition: WritePrecondition,
) -> Result<Version, CheckpointError> {
    match (precondition, current) {
        (WritePrecondition::Absent, Some(_)) => {
            Err(CheckpointError::AlreadyExists(run_id.clone()))
        }
        (WritePrecondition::Exact(_), None) => Err(CheckpointError::NotFound(run_id.clone())),
        (WritePrecondition::Exact(expected), Some(actual)) if expected != actual => {
            Err(CheckpointError::VersionConflict {
                run_id: run_id.clone(),
                expected,
                actual,
            })
        }
        (_, Some(actual)) => Ok(actual.saturating_add(1)),
        (_, None) => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_id() -> RunId {
        RunId::new("run-1").unwrap()
    }

    #[test]
    fn first_write_is_version_zero() {
        assert_eq!(next_version(&run_id(), None, WritePrecondition::Any).unwrap(), 0);
        assert_eq!(
            next_version(&run_id(), None, WritePrecondition::Absent).unwrap(),
            0
        );
    }

    #[test]
    fn exact_write_bumps_matching_version() {
        assert_eq!(
            next_version(&run_id(), Some(3), WritePrecondition::Exact(3)).unwrap(),
            4
        );
    }

    #[test]
    fn exact_write_rejects_stale_version() {
        let err = next_version(&run_id(), Some(4), WritePrecondition::Exact(3)).unwrap_err();
        assert!(matches!(
            err,
            CheckpointError::VersionConflict {
                expected: 3,
                actual: 4,
                ..
            }
        ));
    }

    #[test]
    fn absent_write_rejects_existing_checkpoint() {
        let err = next_version(&run_id(), Some(0), WritePrecondition::Absent).unwrap_err();
        assert!(matches!(err, CheckpointError::AlreadyExists(_)));
    }
}
