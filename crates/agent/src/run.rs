//! Run state and the approval signals that move it between phases.
//!
//! A [`RunState`] is the unit of persistence: it is what the checkpoint store
//! saves and loads. Its [`RunPhase`] makes the suspension invariant structural:
//! a pending tool call exists exactly when the phase is
//! [`RunPhase::Suspended`], so the two can never disagree.
//!
//! Phase transitions:
//!
//! ```text
//!            suspend             begin_execution          finish_execution
//!   Active ──────────▶ Suspended ───────────────▶ Executing ───────────────▶ Active
//!     │                   │                                                    │
//!     │ complete          │ decline / cancel                                   │ complete
//!     ▼                   ▼                                                    ▼
//!  Completed        Active / Cancelled                                     Completed
//! ```
//!
//! An `Executing` run whose driver is gone can be moved to `Cancelled` with
//! `abandon_execution`; its call is answered as "outcome unknown" and never
//! retried.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AgentError, Domain, Message, RunId, Timestamp, ToolCall, ToolCallId, ToolResult};

// ---------------------------------------------------------------------------
// Task input
// ---------------------------------------------------------------------------

/// An inbound unit of work.
///
/// The intent is classified by the caller; the orchestration layer does not
/// infer it from the instruction text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Which domain sub-agent should handle the task.
    pub intent: Domain,
    /// The user's request, in natural language.
    pub instruction: String,
}

// ---------------------------------------------------------------------------
// Approval signals
// ---------------------------------------------------------------------------

/// An external approver's answer to a suspension.
///
/// A decision names the tool call it answers, so it can only ever apply to
/// the suspension it was issued for. A retried or duplicated decision that
/// arrives after the run has moved on to another call is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    /// The suspended run this decision applies to.
    pub run_id: RunId,
    /// The pending call this decision answers.
    pub tool_call_id: ToolCallId,
    /// `false` declines the pending tool call.
    pub approve: bool,
    /// Replacement arguments for the pending call. Ignored when `approve` is
    /// `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_arguments: Option<Value>,
}

impl ApprovalDecision {
    /// Approves the pending call with its original arguments.
    pub fn approve(run_id: RunId, tool_call_id: ToolCallId) -> Self {
        Self {
            run_id,
            tool_call_id,
            approve: true,
            edited_arguments: None,
        }
    }

    /// Approves the pending call with replacement arguments.
    pub fn edit(run_id: RunId, tool_call_id: ToolCallId, arguments: Value) -> Self {
        Self {
            run_id,
            tool_call_id,
            approve: true,
            edited_arguments: Some(arguments),
        }
    }

    /// Declines the pending call.
    pub fn reject(run_id: RunId, tool_call_id: ToolCallId) -> Self {
        Self {
            run_id,
            tool_call_id,
            approve: false,
            edited_arguments: None,
        }
    }
}

/// How an executing tool call came to be approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalOutcome {
    /// The tool needs no approval.
    NotRequired,
    /// Approved with the model's original arguments.
    Approved,
    /// Approved with approver-supplied arguments.
    Edited,
}

/// What the approver is shown when a run suspends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspensionNotice {
    /// The suspended run.
    pub run_id: RunId,
    /// The pending call; decisions must quote it back.
    pub tool_call_id: ToolCallId,
    /// The gated tool.
    pub tool_name: String,
    /// The arguments exactly as the model proposed them.
    pub arguments: Value,
}

impl SuspensionNotice {
    /// Approves the call this notice describes.
    pub fn approve(&self) -> ApprovalDecision {
        ApprovalDecision::approve(self.run_id.clone(), self.tool_call_id.clone())
    }

    /// Approves the call this notice describes with replacement arguments.
    pub fn edit(&self, arguments: Value) -> ApprovalDecision {
        ApprovalDecision::edit(self.run_id.clone(), self.tool_call_id.clone(), arguments)
    }

    /// Declines the call this notice describes.
    pub fn reject(&self) -> ApprovalDecision {
        ApprovalDecision::reject(self.run_id.clone(), self.tool_call_id.clone())
    }
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RunPhase {
    /// The model loop is (or may be) driving the run.
    Active,
    /// Paused before a gated tool call, waiting for an approval decision.
    Suspended {
        /// The gated call, exactly as proposed.
        pending: ToolCall,
    },
    /// An approved call has been claimed for execution and its result is not
    /// yet recorded.
    Executing {
        /// The call being executed (with edited arguments, if any).
        call: ToolCall,
        /// How the call was approved.
        approval: ApprovalOutcome,
    },
    /// The model produced a final answer.
    Completed {
        /// The final answer text.
        answer: String,
    },
    /// The run was cancelled by the caller.
    Cancelled,
}

impl RunPhase {
    /// Short lowercase name of the phase, for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended { .. } => "suspended",
            Self::Executing { .. } => "executing",
            Self::Completed { .. } => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` for phases no operation can leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Cancelled)
    }
}

/// The persisted state of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    run_id: RunId,
    domain: Domain,
    messages: Vec<Message>,
    phase: RunPhase,
    #[serde(default)]
    cancel_requested: bool,
    #[serde(default)]
    turns: u32,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl RunState {
    /// Creates an active run whose history starts with the task instruction.
    pub fn new(run_id: RunId, task: &Task) -> Self {
        let now = Timestamp::now();
        Self {
            run_id,
            domain: task.intent,
            messages: vec![Message::user(task.instruction.clone())],
            phase: RunPhase::Active,
            cancel_requested: false,
            turns: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The run's identifier (its checkpoint key).
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// The domain sub-agent that owns the run.
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// The ordered conversation history.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The current phase.
    pub fn phase(&self) -> &RunPhase {
        &self.phase
    }

    /// `true` while the run waits for an approval decision.
    pub fn is_suspended(&self) -> bool {
        matches!(self.phase, RunPhase::Suspended { .. })
    }

    /// The gated call awaiting approval. `Some` exactly when suspended.
    pub fn pending_tool_call(&self) -> Option<&ToolCall> {
        match &self.phase {
            RunPhase::Suspended { pending } => Some(pending),
            _ => None,
        }
    }

    /// The pending call, provided it is the one `tool_call_id` names.
    ///
    /// # Errors
    ///
    /// [`AgentError::InvalidState`] if the run is not suspended or waits on a
    /// different call.
    pub fn pending_call_for(&self, tool_call_id: &ToolCallId) -> Result<&ToolCall, AgentError> {
        let Some(pending) = self.pending_tool_call() else {
            return Err(AgentError::invalid_state(
                &self.run_id,
                format!("run is {}, not suspended", self.phase.name()),
            ));
        };
        if pending.id != *tool_call_id {
            return Err(AgentError::invalid_state(
                &self.run_id,
                format!(
                    "decision answers tool call {tool_call_id}, but the run is waiting on {}",
                    pending.id
                ),
            ));
        }
        Ok(pending)
    }

    /// The call being executed. `Some` exactly when executing.
    pub fn executing_tool_call(&self) -> Option<&ToolCall> {
        match &self.phase {
            RunPhase::Executing { call, .. } => Some(call),
            _ => None,
        }
    }

    /// `true` if any call in the history already uses `id`.
    pub fn has_tool_call(&self, id: &ToolCallId) -> bool {
        self.messages.iter().any(|message| {
            matches!(message, Message::Assistant { tool_call: Some(call), .. } if call.id == *id)
        })
    }

    /// `true` if the caller asked to cancel while a call was executing.
    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    /// Number of model turns taken so far.
    pub fn turns(&self) -> u32 {
        self.turns
    }

    /// When the run was created.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// When the run last changed.
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Builds the notice shown to an approver. `None` unless suspended.
    pub fn suspension_notice(&self) -> Option<SuspensionNotice> {
        self.pending_tool_call().map(|call| SuspensionNotice {
            run_id: self.run_id.clone(),
            tool_call_id: call.id.clone(),
            tool_name: call.name.to_string(),
            arguments: call.arguments.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Appends a message to the history.
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    /// Counts one model turn.
    pub fn record_turn(&mut self) {
        self.turns = self.turns.saturating_add(1);
        self.touch();
    }

    /// `Active → Suspended`: parks `call` until an approval decision arrives.
    pub fn suspend(&mut self, call: ToolCall) -> Result<(), AgentError> {
        self.expect_phase("suspend", |phase| matches!(phase, RunPhase::Active))?;
        self.phase = RunPhase::Suspended { pending: call };
        self.touch();
        Ok(())
    }

    /// `Suspended → Executing`: claims the pending call for execution,
    /// optionally with edited arguments. Returns the call to execute.
    pub fn begin_execution(
        &mut self,
        edited_arguments: Option<Value>,
    ) -> Result<ToolCall, AgentError> {
        let RunPhase::Suspended { pending } = &self.phase else {
            return Err(self.wrong_phase("resume"));
        };
        let mut call = pending.clone();
        let approval = match edited_arguments {
            Some(arguments) => {
                call.arguments = arguments;
                ApprovalOutcome::Edited
            }
            None => ApprovalOutcome::Approved,
        };
        self.phase = RunPhase::Executing {
            call: call.clone(),
            approval,
        };
        self.touch();
        Ok(call)
    }

    /// `Suspended → Active`: records `result` (a declined-action result) for
    /// the pending call without executing it.
    pub fn decline(&mut self, result: ToolResult) -> Result<(), AgentError> {
        let RunPhase::Suspended { pending } = &self.phase else {
            return Err(self.wrong_phase("decline"));
        };
        let message = Message::tool_result(pending, result);
        self.messages.push(message);
        self.phase = RunPhase::Active;
        self.touch();
        Ok(())
    }

    /// `Executing → Active`: records the result of the executing call.
    pub fn finish_execution(&mut self, result: ToolResult) -> Result<(), AgentError> {
        let RunPhase::Executing { call, .. } = &self.phase else {
            return Err(self.wrong_phase("record a tool result"));
        };
        let message = Message::tool_result(call, result);
        self.messages.push(message);
        self.phase = RunPhase::Active;
        self.touch();
        Ok(())
    }

    /// `Active → Completed`: records the model's final answer.
    pub fn complete(&mut self, answer: impl Into<String>) -> Result<(), AgentError> {
        self.expect_phase("complete", |phase| matches!(phase, RunPhase::Active))?;
        let answer = answer.into();
        self.messages.push(Message::assistant(answer.clone()));
        self.phase = RunPhase::Completed { answer };
        self.touch();
        Ok(())
    }

    /// `Suspended | Active → Cancelled`.
    ///
    /// A suspended run's pending call is answered with `result` so the history
    /// stays well-formed; it is never executed.
    pub fn cancel(&mut self, result: ToolResult) -> Result<(), AgentError> {
        match &self.phase {
            RunPhase::Suspended { pending } => {
                let message = Message::tool_result(pending, result);
                self.messages.push(message);
            }
            RunPhase::Active => {}
            _ => return Err(self.wrong_phase("cancel")),
        }
        self.phase = RunPhase::Cancelled;
        self.cancel_requested = false;
        self.touch();
        Ok(())
    }

    /// Marks an executing run for cancellation once its in-flight call has
    /// finished.
    pub fn request_cancel(&mut self) -> Result<(), AgentError> {
        self.expect_phase("request cancellation of", |phase| {
            matches!(phase, RunPhase::Executing { .. })
        })?;
        self.cancel_requested = true;
        self.touch();
        Ok(())
    }

    /// `Executing → Cancelled` without waiting for the in-flight call.
    ///
    /// Used when the driver that claimed the call is gone and its result will
    /// never be recorded. `result` answers the call; it is not retried.
    pub fn abandon_execution(&mut self, result: ToolResult) -> Result<(), AgentError> {
        let RunPhase::Executing { call, .. } = &self.phase else {
            return Err(self.wrong_phase("abandon the call of"));
        };
        let message = Message::tool_result(call, result);
        self.messages.push(message);
        self.phase = RunPhase::Cancelled;
        self.cancel_requested = false;
        self.touch();
        Ok(())
    }

    /// `Active | Completed → Active`: continues the conversation with new user
    /// input.
    pub fn reopen(&mut self, content: impl Into<String>) -> Result<(), AgentError> {
        self.expect_phase("add input to", |phase| {
            matches!(phase, RunPhase::Active | RunPhase::Completed { .. })
        })?;
        self.messages.push(Message::user(content));
        self.phase = RunPhase::Active;
        self.touch();
        Ok(())
    }

    fn expect_phase(
        &self,
        operation: &str,
        allowed: impl Fn(&RunPhase) -> bool,
    ) -> Result<(), AgentError> {
        if allowed(&self.phase) {
            Ok(())
        } else {
            Err(self.wrong_phase(operation))
        }
    }

    fn wrong_phase(&self, operation: &str) -> AgentError {
        AgentError::invalid_state(
            &self.run_id,
            format!("cannot {operation} a run that is {}", self.phase.name()),
        )
    }

    fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }
}
