//! Top-level error and retry-policy types for the Warden domain.
//!
//! [`AgentError`] covers the conditions the orchestration layer reports to its
//! caller. [`ToolFailure`] is the failure shape of the remote resource API; it
//! never reaches the caller because the error normalization guard turns every
//! variant into a tool result for the model.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RunId;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by infrastructure error types to let callers decide whether to
/// re-invoke an operation.
///
/// - `Retryable` errors: timeouts, rate-limit responses, upstream 5xx.
/// - `NonRetryable` errors: invalid requests, authentication failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from a `Retry-After` response header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Orchestration-layer errors
// ---------------------------------------------------------------------------

/// Errors surfaced to the caller of the orchestration layer.
///
/// Tool-execution failures are deliberately absent: those are data for the
/// model, not errors for the caller.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A required context field was missing or blank. Raised before any tool
    /// executes; the run is never created.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// The run is not in a state that permits the requested operation
    /// (e.g. resuming a run that is not suspended, or was already resumed).
    ///
    /// The stored run is left untouched.
    #[error("Invalid state for run {run_id}: {message}")]
    InvalidState {
        /// The run the operation targeted.
        run_id: RunId,
        /// What was wrong.
        message: String,
    },

    /// The checkpoint store could not complete a read or write. The run
    /// remains in its last durably saved state.
    #[error("Persistence error: {message}")]
    Persistence {
        /// Description of the storage failure.
        message: String,
    },

    /// The model inference call failed after the provider's own retries.
    ///
    /// The run remains in its last durably saved state and may be retried by
    /// the caller.
    #[error("Model inference failed: {message}")]
    Model {
        /// Description of the provider failure.
        message: String,
    },
}

impl AgentError {
    /// Shorthand for [`AgentError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for [`AgentError::InvalidState`].
    pub fn invalid_state(run_id: &RunId, message: impl Into<String>) -> Self {
        Self::InvalidState {
            run_id: run_id.clone(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Remote resource failures
// ---------------------------------------------------------------------------

/// Failure of a single remote resource operation.
///
/// Produced by [`crate::ResourceApi`] implementations and consumed only by the
/// error normalization guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolFailure {
    /// The transport call completed with a non-success status code.
    #[error("HTTP {status_code}: {message}")]
    Transport {
        /// HTTP status code returned by the remote API.
        status_code: u16,
        /// Upstream error text (the body's `message` field when present).
        message: String,
    },

    /// The transport call succeeded but the GraphQL response reported errors.
    #[error("GraphQL errors: {}", messages.join("; "))]
    GraphQuery {
        /// One entry per reported error.
        messages: Vec<String>,
    },

    /// Any other failure: connection errors, malformed arguments, undecodable
    /// responses, or a panic inside the executor.
    #[error("{message}")]
    Unexpected {
        /// Description of the failure.
        message: String,
    },
}

impl ToolFailure {
    /// Shorthand for [`ToolFailure::Unexpected`].
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_query_errors_join_messages() {
        let failure = ToolFailure::GraphQuery {
            messages: vec!["first".into(), "second".into()],
        };
        assert_eq!(failure.to_string(), "GraphQL errors: first; second");
    }

    #[test]
    fn invalid_state_names_the_run() {
        let run_id = RunId::new("run-9").unwrap();
        let err = AgentError::invalid_state(&run_id, "not suspended");
        assert_eq!(err.to_string(), "Invalid state for run run-9: not suspended");
    }
}
