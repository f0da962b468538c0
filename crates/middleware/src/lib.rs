//! Orchestration layer for Warden runs.
//!
//! Wraps every model step and every tool invocation of a run:
//!
//! ```text
//! task + context ─▶ SubAgentRouter ─▶ SubAgent
//!                                       │
//!                     CapabilityAdapter ─┤ (tools, instructions, state shape)
//!                                       ▼
//!                                  ModelProvider ─▶ final answer ─▶ Completed
//!                                       │
//!                                  tool call
//!                                       ▼
//!                     ApprovalGate ── gated ─▶ checkpoint ─▶ Suspended
//!                                       │
//!                                   ungated / approved
//!                                       ▼
//!                     ErrorGuard(ResourceApi) ─▶ ToolResult ─▶ back to the model
//! ```
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Sequences calls between the domain rules in the
//! [`agent`] crate and the port traits it defines. No I/O of its own beyond
//! what the ports perform.

mod adapter;
mod executor;
mod gate;
mod guard;
mod router;
mod sub_agent;

pub use adapter::CapabilityAdapter;
pub use executor::{ExecutorConfig, RunExecutor, RunReport, RunStatus};
pub use gate::{
    abandoned_result, cancelled_result, declined_result, ApprovalGate, GateDecision, GateState, Resolution,
};
pub use guard::ErrorGuard;
pub use router::SubAgentRouter;
pub use sub_agent::SubAgent;
