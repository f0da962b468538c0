//! The run executor: drives the model loop of one run and exposes the
//! operations a caller performs on runs.
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | [`RunExecutor::start`] | route a task, create the run, drive it |
//! | [`RunExecutor::resume`] | apply an approval decision to a suspended run, drive it |
//! | [`RunExecutor::reply`] | add user input to an idle or completed run, drive it |
//! | [`RunExecutor::cancel`] | cancel a suspended or idle run; flag an executing one, abandon it on a second request |
//! | [`RunExecutor::get`] | load a run (including archived ones) |
//!
//! Every write after creation uses [`WritePrecondition::Exact`] against the
//! version the executor last saw. Whoever claims a suspension first wins; a
//! second resumption of the same suspension fails with
//! [`AgentError::InvalidState`] and never reaches the resource API. Decisions
//! name the tool call they answer, so a stale decision cannot approve a later
//! suspension of the same run.

use std::sync::Arc;

use agent::{
    AgentError, ApprovalDecision, Checkpoint, CheckpointError, CheckpointStore, Domain, Message,
    ModelProvider, ModelRequest, ModelResponse, ResourceApi, RunId, RunPhase, RunState,
    SuspensionNotice, Task, TaskContext, ToolCall, ToolCallId, ToolResult, Version,
    WritePrecondition,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn, Span};

use crate::gate::log_transition;
use crate::{abandoned_result, cancelled_result, GateDecision, GateState, Resolution, SubAgent, SubAgentRouter};

// ---------------------------------------------------------------------------
// Configuration and reports
// ---------------------------------------------------------------------------

/// Tunables of the model loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Model turns allowed per drive of a run (a start, resume or reply)
    /// before the run is completed without a final answer.
    pub max_turns: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { max_turns: 25 }
    }
}

/// Where an operation left the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Waiting for an approval decision.
    Suspended {
        /// What the approver needs to decide on.
        notice: SuspensionNotice,
    },
    /// The model produced a final answer.
    Completed {
        /// The answer.
        answer: String,
    },
    /// The run was cancelled.
    Cancelled,
    /// Cancellation was requested while a call was executing; the run is
    /// cancelled once the call's result is recorded.
    CancelRequested,
    /// The run is neither suspended nor finished (e.g. a model failure
    /// interrupted it).
    InProgress,
}

/// The outcome of a run operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// The run the operation applied to.
    pub run_id: RunId,
    /// The sub-agent that owns the run.
    pub domain: Domain,
    /// Where the run stands now.
    pub status: RunStatus,
    /// Version of the checkpoint that records this status.
    pub version: Version,
}

impl RunReport {
    /// Summarizes a durably saved state.
    pub fn from_state(state: &RunState, version: Version) -> Self {
        let status = match state.phase() {
            RunPhase::Suspended { pending } => RunStatus::Suspended {
                notice: SuspensionNotice {
                    run_id: state.run_id().clone(),
                    tool_call_id: pending.id.clone(),
                    tool_name: pending.name.to_string(),
                    arguments: pending.arguments.clone(),
                },
            },
            RunPhase::Completed { answer } => RunStatus::Completed {
                answer: answer.clone(),
            },
            RunPhase::Cancelled => RunStatus::Cancelled,
            RunPhase::Executing { .. } if state.cancel_requested() => RunStatus::CancelRequested,
            RunPhase::Active | RunPhase::Executing { .. } => RunStatus::InProgress,
        };
        Self {
            run_id: state.run_id().clone(),
            domain: state.domain(),
            status,
            version,
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Drives runs through the router, the domain sub-agents and the checkpoint
/// store.
///
/// The executor holds no per-run state; any number of runs may be driven
/// concurrently through one instance. Runs share only the checkpoint store.
pub struct RunExecutor {
    model: Arc<dyn ModelProvider>,
    api: Arc<dyn ResourceApi>,
    store: Arc<dyn CheckpointStore>,
    router: SubAgentRouter,
    config: ExecutorConfig,
}

impl RunExecutor {
    /// Creates an executor with the default [`ExecutorConfig`].
    pub fn new(
        model: Arc<dyn ModelProvider>,
        api: Arc<dyn ResourceApi>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            model,
            api,
            store,
            router: SubAgentRouter::new(),
            config: ExecutorConfig::default(),
        }
    }

    /// Replaces the loop configuration.
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// The loop configuration in effect.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Routes `task`, creates its run and drives it until it completes or
    /// suspends.
    ///
    /// # Errors
    ///
    /// [`AgentError::Persistence`] if the new run cannot be saved,
    /// [`AgentError::Model`] if inference fails.
    #[instrument(skip_all, fields(intent = %task.intent, run_id = tracing::field::Empty))]
    pub async fn start(&self, task: Task, context: &TaskContext) -> Result<RunReport, AgentError> {
        let domain = self.router.route(&task, context);
        let state = RunState::new(RunId::new_random(), &task);
        Span::current().record("run_id", tracing::field::display(state.run_id()));

        let version = self
            .store
            .save(&state, WritePrecondition::Absent)
            .await
            .map_err(persistence)?;
        info!(
            run_id = %state.run_id(),
            agent = self.router.agent(domain).name(),
            "Run started"
        );
        self.drive(state, version, context).await
    }

    /// Applies an approval decision to a suspended run and drives it on.
    ///
    /// An approved call runs exactly once, behind the sub-agent's guard. A
    /// declined call never runs; the model sees a declined-action result.
    ///
    /// # Errors
    ///
    /// [`AgentError::InvalidState`] if the run is unknown, is not suspended,
    /// is waiting on a different call than the decision names, or was resumed
    /// by someone else first.
    #[instrument(skip_all, fields(run_id = %decision.run_id, approve = decision.approve))]
    pub async fn resume(
        &self,
        decision: ApprovalDecision,
        context: &TaskContext,
    ) -> Result<RunReport, AgentError> {
        let Checkpoint { mut state, version } = self.load(&decision.run_id).await?;
        let pending = state.pending_call_for(&decision.tool_call_id)?.clone();
        let agent = self.router.agent(state.domain());
        let run_id = decision.run_id.clone();

        match agent.gate().resolve(&pending, &decision) {
            Resolution::Decline { result } => {
                state.decline(result)?;
                let version = self.claim(&state, version).await?;
                log_transition(&run_id, &pending.name, GateState::Proposed, GateState::Rejected);
                self.drive(state, version, context).await
            }
            Resolution::Execute {
                state: approval,
                edited_arguments,
            } => {
                let call = state.begin_execution(edited_arguments)?;
                let version = self.claim(&state, version).await?;
                log_transition(&run_id, &call.name, GateState::Proposed, approval);
                log_transition(&run_id, &call.name, approval, GateState::Executing);

                let result = self.execute(agent, &call, context).await;
                log_transition(&run_id, &call.name, GateState::Executing, GateState::Completed);
                state.finish_execution(result)?;
                let version = self.persist(&mut state, version).await?;
                self.drive(state, version, context).await
            }
        }
    }

    /// Continues an idle or completed run with new user input.
    ///
    /// # Errors
    ///
    /// [`AgentError::InvalidState`] if the run is unknown, suspended,
    /// executing, cancelled, or changed concurrently.
    #[instrument(skip_all, fields(run_id = %run_id))]
    pub async fn reply(
        &self,
        run_id: &RunId,
        input: impl Into<String>,
        context: &TaskContext,
    ) -> Result<RunReport, AgentError> {
        let Checkpoint { mut state, version } = self.load(run_id).await?;
        state.reopen(input)?;
        let version = self.claim(&state, version).await?;
        self.drive(state, version, context).await
    }

    /// Cancels a run.
    ///
    /// A suspended run's pending call is answered with a cancellation result
    /// and never executed. An executing run is flagged; the driver that owns
    /// the in-flight call records its result and then marks the run
    /// cancelled.
    ///
    /// Cancelling an executing run that is already flagged abandons the call:
    /// it is answered with an outcome-unknown result, never retried, and the
    /// run is cancelled at once. This recovers runs whose driver crashed or
    /// failed to save the call's result. Should the original driver still
    /// finish, its recorded result replaces the outcome-unknown one.
    ///
    /// # Errors
    ///
    /// [`AgentError::InvalidState`] if the run is unknown or already
    /// finished.
    #[instrument(skip_all, fields(run_id = %run_id))]
    pub async fn cancel(&self, run_id: &RunId) -> Result<RunReport, AgentError> {
        let Checkpoint { mut state, version } = self.load(run_id).await?;
        match state.executing_tool_call().map(|call| call.name.clone()) {
            Some(tool) if state.cancel_requested() => {
                warn!(tool = %tool, "Abandoning executing call; its outcome is unknown");
                state.abandon_execution(abandoned_result(&tool))?;
            }
            Some(_) => state.request_cancel()?,
            None => cancel_in_place(&mut state)?,
        }
        let version = self.claim(&state, version).await?;
        info!(phase = state.phase().name(), "Run cancellation recorded");
        Ok(RunReport::from_state(&state, version))
    }

    /// Loads a run, including completed and cancelled (archived) ones.
    ///
    /// # Errors
    ///
    /// [`AgentError::InvalidState`] if the run is unknown.
    pub async fn get(&self, run_id: &RunId) -> Result<Checkpoint, AgentError> {
        self.load(run_id).await
    }

    // -----------------------------------------------------------------------
    // Model loop
    // -----------------------------------------------------------------------

    async fn drive(
        &self,
        mut state: RunState,
        mut version: Version,
        context: &TaskContext,
    ) -> Result<RunReport, AgentError> {
        let agent = self.router.agent(state.domain());
        let mut turns = 0u32;

        loop {
            if state.phase().is_terminal() {
                return Ok(RunReport::from_state(&state, version));
            }
            if turns >= self.config.max_turns {
                warn!(
                    run_id = %state.run_id(),
                    max_turns = self.config.max_turns,
                    "Turn limit reached without a final answer"
                );
                state.complete(format!(
                    "Stopped after {turns} model turns without a final answer."
                ))?;
                version = self.persist(&mut state, version).await?;
                return Ok(RunReport::from_state(&state, version));
            }

            let request = agent.adapter().adapt(base_request(&state, context), context);
            state.record_turn();
            turns += 1;
            let response = self.model.invoke(&request).await.map_err(|e| {
                error!(run_id = %state.run_id(), error = %e, "Model inference failed");
                AgentError::Model {
                    message: e.to_string(),
                }
            })?;

            let (content, call) = match response {
                ModelResponse::FinalAnswer { content } => {
                    state.complete(content)?;
                    version = self.persist(&mut state, version).await?;
                    info!(run_id = %state.run_id(), turns = state.turns(), "Run completed");
                    return Ok(RunReport::from_state(&state, version));
                }
                ModelResponse::ToolCall { content, call } => (content, call),
            };

            let call = with_unique_id(&state, call);
            state.push_message(Message::assistant_tool_call(content, call.clone()));
            match agent.gate().check(&call) {
                GateDecision::Suspend => {
                    state.suspend(call)?;
                    // The suspension is reported only once it is durable.
                    version = self.persist(&mut state, version).await?;
                    if state.is_suspended() {
                        info!(run_id = %state.run_id(), "Run suspended awaiting approval");
                    }
                    return Ok(RunReport::from_state(&state, version));
                }
                GateDecision::Proceed => {
                    let run_id = state.run_id().clone();
                    log_transition(&run_id, &call.name, GateState::Proposed, GateState::Executing);
                    let result = self.execute(agent, &call, context).await;
                    log_transition(&run_id, &call.name, GateState::Executing, GateState::Completed);
                    state.push_message(Message::tool_result(&call, result));
                    version = self.persist(&mut state, version).await?;
                }
            }
        }
    }

    async fn execute(&self, agent: &SubAgent, call: &ToolCall, context: &TaskContext) -> ToolResult {
        let api = Arc::clone(&self.api);
        let owned_context = context.clone();
        let tool = call.name.clone();
        let arguments = call.arguments.clone();
        agent
            .guard()
            .guard(&call.name, &call.arguments, context.platform(), async move {
                api.execute(&owned_context, &tool, &arguments).await
            })
            .await
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    async fn load(&self, run_id: &RunId) -> Result<Checkpoint, AgentError> {
        self.store.load(run_id).await.map_err(|e| match e {
            CheckpointError::NotFound(_) => AgentError::invalid_state(run_id, "unknown run"),
            other => persistence(other),
        })
    }

    /// Writes a transition the caller made on top of `version`. Losing the
    /// race means another caller changed the run first.
    async fn claim(&self, state: &RunState, version: Version) -> Result<Version, AgentError> {
        self.store
            .save(state, WritePrecondition::Exact(version))
            .await
            .map_err(|e| match e {
                CheckpointError::VersionConflict { .. } => AgentError::invalid_state(
                    state.run_id(),
                    "run changed concurrently; it may already have been resumed",
                ),
                other => persistence(other),
            })
    }

    /// Saves progress made by the driver. A concurrent cancellation is the
    /// only write allowed to land in between; it is applied to `state` here.
    async fn persist(&self, state: &mut RunState, version: Version) -> Result<Version, AgentError> {
        match self
            .store
            .save(state, WritePrecondition::Exact(version))
            .await
        {
            Ok(version) => Ok(version),
            Err(CheckpointError::VersionConflict { .. }) => {
                let latest = self.load(state.run_id()).await?;
                let cancelled = matches!(latest.state.phase(), RunPhase::Cancelled)
                    || latest.state.cancel_requested();
                if !cancelled {
                    return Err(AgentError::invalid_state(
                        state.run_id(),
                        "run changed concurrently while it was being driven",
                    ));
                }
                if state.phase().is_terminal() {
                    warn!(
                        run_id = %state.run_id(),
                        phase = state.phase().name(),
                        "Cancellation arrived after the run finished"
                    );
                } else {
                    cancel_in_place(state)?;
                    info!(run_id = %state.run_id(), "Run cancelled after in-flight work");
                }
                self.claim(state, latest.version).await
            }
            Err(other) => Err(persistence(other)),
        }
    }
}

/// The request every turn starts from, before the sub-agent's adapter
/// configures it.
fn base_request(state: &RunState, context: &TaskContext) -> ModelRequest {
    ModelRequest {
        system_instructions: context.system_instructions().to_string(),
        messages: state.messages().to_vec(),
        tools: Vec::new(),
        state_shape: None,
    }
}

/// Re-labels a call whose id already occurs in the history. Approval
/// decisions are matched by call id, so ids must be unique within a run.
fn with_unique_id(state: &RunState, mut call: ToolCall) -> ToolCall {
    if state.has_tool_call(&call.id) {
        call.id = ToolCallId::new_random();
    }
    call
}

fn cancel_in_place(state: &mut RunState) -> Result<(), AgentError> {
    let result = state
        .pending_tool_call()
        .map(|call| cancelled_result(&call.name))
        .unwrap_or_else(|| ToolResult::error("The run was cancelled."));
    state.cancel(result)
}

fn persistence(error: CheckpointError) -> AgentError {
    AgentError::Persistence {
        message: error.to_string(),
    }
}
