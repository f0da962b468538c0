//! Approval gate.
//!
//! Decides, per proposed tool call, whether the run may proceed or must
//! suspend, and turns an approver's [`ApprovalDecision`] into either an
//! execution or a declined-action result.
//!
//! ```text
//!                ┌──────────▶ APPROVED ──┐
//!   PROPOSED ────┼──────────▶ EDITED ────┼──▶ EXECUTING ──▶ COMPLETED
//!                ├──────────▶ REJECTED   │
//!                └── (not gated) ────────┘
//! ```
//!
//! The gate itself holds only the immutable policy table; the run's position
//! in this machine is persisted as its [`agent::RunPhase`].

use agent::{ApprovalDecision, DomainPolicy, RunId, ToolCall, ToolName, ToolResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Positions of a tool call in the approval state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// The model proposed the call.
    Proposed,
    /// The approver accepted the call as proposed.
    Approved,
    /// The approver declined the call.
    Rejected,
    /// The approver accepted the call with different arguments.
    Edited,
    /// The call is running.
    Executing,
    /// The call's result has been recorded.
    Completed,
}

impl GateState {
    /// Returns `true` if the machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: GateState) -> bool {
        use GateState::*;
        matches!(
            (self, next),
            (Proposed, Approved)
                | (Proposed, Rejected)
                | (Proposed, Edited)
                | (Proposed, Executing)
                | (Approved, Executing)
                | (Edited, Executing)
                | (Executing, Completed)
        )
    }
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Proposed => "proposed",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Edited => "edited",
            Self::Executing => "executing",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Logs a gate transition. Transitions the machine does not allow are a bug
/// in the caller.
pub(crate) fn log_transition(run_id: &RunId, tool: &ToolName, from: GateState, to: GateState) {
    debug_assert!(
        from.can_transition_to(to),
        "illegal gate transition {from} -> {to}"
    );
    info!(run_id = %run_id, tool = %tool, from = %from, to = %to, "Approval gate transition");
}

/// What the gate decided for a freshly proposed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Execute immediately.
    Proceed,
    /// Suspend the run until an approval decision arrives.
    Suspend,
}

/// What to do with a suspended call once the approver has answered.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Execute the call, with edited arguments if present.
    Execute {
        /// `Approved` or `Edited`.
        state: GateState,
        /// Replacement arguments, if the approver supplied any.
        edited_arguments: Option<Value>,
    },
    /// Do not execute; record this result instead.
    Decline {
        /// The declined-action result to inject into the history.
        result: ToolResult,
    },
}

/// The approval gate of one domain.
#[derive(Debug, Clone, Copy)]
pub struct ApprovalGate {
    policy: DomainPolicy,
}

impl ApprovalGate {
    /// Creates a gate enforcing `policy`.
    pub fn new(policy: DomainPolicy) -> Self {
        Self { policy }
    }

    /// The policy this gate enforces.
    pub fn policy(&self) -> &DomainPolicy {
        &self.policy
    }

    /// Decides whether `call` may run without approval.
    pub fn check(&self, call: &ToolCall) -> GateDecision {
        if self.policy.requires_approval(call.name.as_str()) {
            GateDecision::Suspend
        } else {
            GateDecision::Proceed
        }
    }

    /// Applies an approver's decision to the suspended `pending` call.
    pub fn resolve(&self, pending: &ToolCall, decision: &ApprovalDecision) -> Resolution {
        if !decision.approve {
            return Resolution::Decline {
                result: declined_result(&pending.name),
            };
        }
        match &decision.edited_arguments {
            Some(arguments) if *arguments != pending.arguments => Resolution::Execute {
                state: GateState::Edited,
                edited_arguments: Some(arguments.clone()),
            },
            _ => Resolution::Execute {
                state: GateState::Approved,
                edited_arguments: None,
            },
        }
    }
}

/// The result recorded when an approver declines a call.
pub fn declined_result(tool: &ToolName) -> ToolResult {
    ToolResult::error(format!(
        "The user declined the {tool} action. It was not performed. \
         Do not retry it unchanged; ask the user how to proceed instead."
    ))
}

/// The result recorded when a run is cancelled while a call is pending.
pub fn cancelled_result(tool: &ToolName) -> ToolResult {
    ToolResult::error(format!(
        "The run was cancelled before {tool} was executed. It was not performed."
    ))
}

/// The result recorded when a stuck executing call is given up on. Whether
/// the call took effect remotely is unknown.
pub fn abandoned_result(tool: &ToolName) -> ToolResult {
    ToolResult::error(format!(
        "The outcome of {tool} is unknown: the run was cancelled before its result \
         was recorded. It was not retried; check the repository before trying again."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent::{Domain, ToolCallId};
    use serde_json::json;

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: ToolCallId::new("c1").unwrap(),
            name: ToolName::new(name).unwrap(),
            arguments,
        }
    }

    fn issue_gate() -> ApprovalGate {
        ApprovalGate::new(DomainPolicy::for_domain(Domain::Issue))
    }

    #[test]
    fn read_only_calls_proceed() {
        assert_eq!(
            issue_gate().check(&call("list_repository_issues", json!({}))),
            GateDecision::Proceed
        );
    }

    #[test]
    fn mutations_and_unknown_tools_suspend() {
        let gate = issue_gate();
        assert_eq!(
            gate.check(&call("create_issue", json!({"title": "Bug"}))),
            GateDecision::Suspend
        );
        assert_eq!(
            gate.check(&call("delete_repository", json!({}))),
            GateDecision::Suspend
        );
    }

    #[test]
    fn rejection_declines_without_execution() {
        let pending = call("create_issue", json!({"title": "Bug"}));
        let run_id = RunId::new("r").unwrap();
        let decision = ApprovalDecision::reject(run_id, pending.id.clone());
        let resolution = issue_gate().resolve(&pending, &decision);
        match resolution {
            Resolution::Decline { result } => {
                assert!(result.is_error);
                assert!(result.content.contains("declined"));
                assert!(result.content.contains("create_issue"));
            }
            other => panic!("expected decline, got {other:?}"),
        }
    }

    #[test]
    fn edited_arguments_mark_the_call_edited() {
        let pending = call("create_issue", json!({"title": "Bug"}));
        let run_id = RunId::new("r").unwrap();
        let decision = ApprovalDecision::edit(run_id, pending.id.clone(), json!({"title": "Crash"}));
        assert_eq!(
            issue_gate().resolve(&pending, &decision),
            Resolution::Execute {
                state: GateState::Edited,
                edited_arguments: Some(json!({"title": "Crash"})),
            }
        );
    }

    #[test]
    fn unchanged_edit_counts_as_approval() {
        let pending = call("create_issue", json!({"title": "Bug"}));
        let run_id = RunId::new("r").unwrap();
        let decision = ApprovalDecision::edit(run_id, pending.id.clone(), json!({"title": "Bug"}));
        assert!(matches!(
            issue_gate().resolve(&pending, &decision),
            Resolution::Execute {
                state: GateState::Approved,
                edited_arguments: None
            }
        ));
    }

    #[test]
    fn abandoned_result_warns_the_outcome_is_unknown() {
        let result = abandoned_result(&ToolName::new("create_issue").unwrap());
        assert!(result.is_error);
        assert!(result.content.contains("create_issue"));
        assert!(result.content.contains("unknown"));
        assert!(result.content.contains("not retried"));
    }

    #[test]
    fn machine_rejects_skipping_approval_after_rejection() {
        assert!(!GateState::Rejected.can_transition_to(GateState::Executing));
        assert!(!GateState::Completed.can_transition_to(GateState::Executing));
        assert!(GateState::Edited.can_transition_to(GateState::Executing));
    }
}
