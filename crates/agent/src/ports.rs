//! Port traits: what the orchestration layer needs from the outside world.
//!
//! Infrastructure crates implement these traits; the orchestration layer sees
//! only the traits.
//!
//! | Trait | Implemented by |
//! |-------|----------------|
//! | [`ModelProvider`] | `llm` crate |
//! | [`ResourceApi`] | `github` crate |
//! | [`CheckpointStore`] | `checkpoint` crate |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    Message, RetryPolicy, RunId, RunState, StateShape, TaskContext, ToolCall, ToolFailure,
    ToolName, ToolSpec,
};

// ---------------------------------------------------------------------------
// Model inference
// ---------------------------------------------------------------------------

/// Everything the model sees for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// System instructions for the turn.
    pub system_instructions: String,
    /// Conversation history so far.
    pub messages: Vec<Message>,
    /// Tools the model may call.
    pub tools: Vec<ToolSpec>,
    /// Shape of the structured conversation state, if the platform defines one.
    pub state_shape: Option<StateShape>,
}

/// The model's answer for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelResponse {
    /// A final answer: the run is done.
    FinalAnswer {
        /// The answer text.
        content: String,
    },
    /// Exactly one proposed tool call.
    ToolCall {
        /// Free text accompanying the call (may be empty).
        content: String,
        /// The proposed call.
        call: ToolCall,
    },
}

/// Failure of a model inference call.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The provider answered with a non-success status.
    #[error("Model provider returned HTTP {status_code}: {message}")]
    Status {
        /// HTTP status code.
        status_code: u16,
        /// Provider error text.
        message: String,
        /// Whether the call may be retried.
        retry: RetryPolicy,
    },

    /// The provider could not be reached.
    #[error("Model provider unreachable: {0}")]
    Transport(String),

    /// The provider's answer could not be interpreted.
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

impl ModelError {
    /// Whether the failed call may be retried, and after how long.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Status { retry, .. } => retry.clone(),
            Self::Transport(_) => RetryPolicy::Retryable { after: None },
            Self::MalformedResponse(_) => RetryPolicy::NonRetryable,
        }
    }
}

/// The model-inference boundary.
///
/// Treated as synchronous per turn: the orchestration layer awaits each
/// response before doing anything else in the run.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Runs one inference turn.
    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError>;
}

// ---------------------------------------------------------------------------
// Remote resource API
// ---------------------------------------------------------------------------

/// The remote resource API boundary: named operations over issues, comments
/// and labels.
///
/// Implementations return structured data on success and a [`ToolFailure`]
/// otherwise; they never panic on remote errors.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Executes `tool` with `arguments` against the collection named by
    /// `context`.
    async fn execute(
        &self,
        context: &TaskContext,
        tool: &ToolName,
        arguments: &Value,
    ) -> Result<Value, ToolFailure>;
}

// ---------------------------------------------------------------------------
// Checkpoints
// ---------------------------------------------------------------------------

/// Monotonic version of a stored checkpoint. The first save is version 0.
pub type Version = u64;

/// A stored run state together with its version.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    /// The saved state.
    pub state: RunState,
    /// Version assigned by the store on save.
    pub version: Version,
}

/// Condition a save must meet to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePrecondition {
    /// Always write (upsert).
    Any,
    /// Only write if no checkpoint exists for the run.
    Absent,
    /// Only write if the stored version equals this one.
    Exact(Version),
}

/// Failure of a checkpoint store operation.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// No checkpoint exists for the run.
    #[error("No checkpoint for run {0}")]
    NotFound(RunId),

    /// A checkpoint already exists and [`WritePrecondition::Absent`] was given.
    #[error("Checkpoint for run {0} already exists")]
    AlreadyExists(RunId),

    /// The stored version did not match [`WritePrecondition::Exact`].
    #[error("Version conflict for run {run_id}: expected {expected}, found {actual}")]
    VersionConflict {
        /// The run whose checkpoint changed underneath the writer.
        run_id: RunId,
        /// Version the writer expected.
        expected: Version,
        /// Version actually stored.
        actual: Version,
    },

    /// The run ID cannot be used as a storage key.
    #[error("Invalid run id: {0}")]
    InvalidKey(String),

    /// The stored bytes could not be encoded or decoded.
    #[error("Checkpoint serialization failed: {0}")]
    Serialization(String),

    /// The underlying storage failed.
    #[error("Checkpoint storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable, keyed storage of run state.
///
/// Implementations serialize writes per run ID and report a save as
/// successful only once it is durable.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Saves `state` under its run ID if `precondition` holds, returning the
    /// new version.
    async fn save(
        &self,
        state: &RunState,
        precondition: WritePrecondition,
    ) -> Result<Version, CheckpointError>;

    /// Loads the checkpoint for `run_id`.
    ///
    /// # Errors
    ///
    /// [`CheckpointError::NotFound`] if the run has never been saved.
    async fn load(&self, run_id: &RunId) -> Result<Checkpoint, CheckpointError>;
}
