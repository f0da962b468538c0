//! Core domain for Warden, the approval-gated GitHub issue agent.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type and error type used by the orchestration layer, plus the port traits
//! that infrastructure crates implement.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`RunId`, `ToolName`, etc.) |
//! | [`types`] | Shared value types (`Platform`, `Credential`, `Message`, `ToolResult`, etc.) |
//! | [`errors`] | `AgentError`, `ToolFailure`, `RetryPolicy` |
//! | [`context`] | The immutable per-run `TaskContext` |
//! | [`capability`] | Per-domain capability tables, approval policy, platform profiles |
//! | [`catalog`] | Model-facing tool definitions |
//! | [`run`] | `RunState`, its phases, and approval signals |
//! | [`ports`] | `ModelProvider`, `ResourceApi`, `CheckpointStore` |

pub mod capability;
pub mod catalog;
pub mod context;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod run;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use capability::{
    CapabilityDescriptor, CapabilityRegistry, Domain, DomainPolicy, PlatformProfile,
};
pub use context::{ContextParams, TaskContext};
pub use errors::{AgentError, RetryPolicy, ToolFailure};
pub use identifiers::{CollectionName, OwnerName, RunId, ToolCallId, ToolName};
pub use ports::{
    Checkpoint, CheckpointError, CheckpointStore, ModelError, ModelProvider, ModelRequest,
    ModelResponse, ResourceApi, Version, WritePrecondition,
};
pub use run::{ApprovalDecision, ApprovalOutcome, RunPhase, RunState, SuspensionNotice, Task};
pub use types::{
    Credential, Message, Platform, StateShape, Timestamp, ToolCall, ToolResult, ToolSpec,
};
