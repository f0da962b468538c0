//! `warden`: command-line front end for approval-gated GitHub issue runs.
//!
//! This is the composition root. It loads configuration, wires the GitHub
//! client, the model provider and the file checkpoint store into a
//! [`RunExecutor`], and maps each subcommand onto one executor operation. Every
//! command prints the resulting run report as JSON on stdout; logs go to
//! stderr.

mod config;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use agent::{
    ApprovalDecision, ContextParams, Credential, Domain, ModelError, ModelProvider, ModelRequest,
    ModelResponse, RunId, RunState, Task, TaskContext, ToolCallId, Version,
};
use anyhow::{bail, Context};
use async_trait::async_trait;
use checkpoint::FileCheckpointStore;
use clap::{ArgGroup, Args, Parser, Subcommand};
use github::GitHubApi;
use llm::OpenAiProvider;
use middleware::RunExecutor;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::config::WardenConfig;
use crate::telemetry::Telemetry;

#[derive(Debug, Parser)]
#[command(name = "warden", version, about = "Approval-gated GitHub issue agent")]
struct Cli {
    /// Configuration file (defaults to ./warden.toml when present).
    #[arg(long, env = "WARDEN_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// API key for the model provider.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a new run.
    Start {
        /// Domain that handles the request: issue, comment or label.
        #[arg(long, value_parser = parse_domain)]
        domain: Domain,

        /// The request, in natural language.
        instruction: String,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Approve, edit or reject the tool call a run is suspended on.
    #[command(group(ArgGroup::new("decision").required(true).args(["approve", "reject"])))]
    Resume {
        run_id: String,

        /// The pending call being answered, as printed in the suspension
        /// notice.
        tool_call_id: String,

        /// Execute the pending call.
        #[arg(long)]
        approve: bool,

        /// Decline the pending call.
        #[arg(long)]
        reject: bool,

        /// Replacement arguments (a JSON object) for the approved call.
        #[arg(long, requires = "approve")]
        arguments: Option<String>,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Continue a run with a new user message.
    Reply {
        run_id: String,

        message: String,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Cancel a run.
    Cancel { run_id: String },

    /// Print a run's stored state.
    Show { run_id: String },
}

/// Where a run operates and with which credential.
#[derive(Debug, Args)]
struct ContextArgs {
    /// Platform hosting the repository.
    #[arg(long, default_value = "github")]
    platform: String,

    /// Repository owner.
    #[arg(long, env = "WARDEN_OWNER")]
    owner: Option<String>,

    /// Repository name.
    #[arg(long, env = "WARDEN_REPO")]
    repo: Option<String>,

    /// Extra system instructions for platforms without a built-in profile.
    #[arg(long)]
    system_instructions: Option<String>,

    /// Access token for the platform.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
}

impl ContextArgs {
    fn into_context(self) -> anyhow::Result<TaskContext> {
        Ok(TaskContext::from_params(ContextParams {
            platform: Some(self.platform),
            credential: self.github_token,
            owner: self.owner,
            collection: self.repo,
            system_instructions: self.system_instructions,
        })?)
    }
}

fn parse_domain(raw: &str) -> Result<Domain, String> {
    Domain::ALL
        .into_iter()
        .find(|domain| domain.as_str().eq_ignore_ascii_case(raw.trim()))
        .ok_or_else(|| {
            let names: Vec<&str> = Domain::ALL.iter().map(|d| d.as_str()).collect();
            format!("unknown domain '{raw}'; expected one of {}", names.join(", "))
        })
}

fn parse_run_id(raw: &str) -> anyhow::Result<RunId> {
    RunId::new(raw.trim()).context("run id must not be empty")
}

/// Output of `warden show`.
#[derive(Serialize)]
struct StoredRun<'a> {
    version: Version,
    state: &'a RunState,
}

/// Stands in for the model on commands that never run inference.
struct NoModel;

#[async_trait]
impl ModelProvider for NoModel {
    async fn invoke(&self, _request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        Err(ModelError::Transport(
            "no model provider is configured for this command".to_string(),
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let telemetry = Telemetry::init()?;

    let outcome = run(cli).await;
    if let Err(err) = &outcome {
        error!(error = %format!("{err:#}"), "Command failed");
    }

    telemetry.shutdown();
    outcome
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = WardenConfig::load(cli.config.as_deref())?;
    let needs_model = matches!(
        cli.command,
        Command::Start { .. } | Command::Resume { .. } | Command::Reply { .. }
    );
    let executor = build_executor(&config, cli.openai_api_key, needs_model).await?;

    match cli.command {
        Command::Start {
            domain,
            instruction,
            context,
        } => {
            let context = context.into_context()?;
            let task = Task {
                intent: domain,
                instruction,
            };
            print(&executor.start(task, &context).await?)
        }
        Command::Resume {
            run_id,
            tool_call_id,
            approve,
            reject: _,
            arguments,
            context,
        } => {
            let run_id = parse_run_id(&run_id)?;
            let tool_call_id = ToolCallId::new(tool_call_id.trim())
                .context("tool call id must not be empty")?;
            let context = context.into_context()?;
            let decision = match (approve, arguments) {
                (false, _) => ApprovalDecision::reject(run_id, tool_call_id),
                (true, None) => ApprovalDecision::approve(run_id, tool_call_id),
                (true, Some(raw)) => {
                    let arguments: Value = serde_json::from_str(&raw)
                        .context("--arguments must be valid JSON")?;
                    if !arguments.is_object() {
                        bail!("--arguments must be a JSON object");
                    }
                    ApprovalDecision::edit(run_id, tool_call_id, arguments)
                }
            };
            print(&executor.resume(decision, &context).await?)
        }
        Command::Reply {
            run_id,
            message,
            context,
        } => {
            let run_id = parse_run_id(&run_id)?;
            let context = context.into_context()?;
            print(&executor.reply(&run_id, message, &context).await?)
        }
        Command::Cancel { run_id } => {
            let run_id = parse_run_id(&run_id)?;
            print(&executor.cancel(&run_id).await?)
        }
        Command::Show { run_id } => {
            let run_id = parse_run_id(&run_id)?;
            let checkpoint = executor.get(&run_id).await?;
            print(&StoredRun {
                version: checkpoint.version,
                state: &checkpoint.state,
            })
        }
    }
}

async fn build_executor(
    config: &WardenConfig,
    api_key: Option<String>,
    needs_model: bool,
) -> anyhow::Result<RunExecutor> {
    let model: Arc<dyn ModelProvider> = if needs_model {
        let key = api_key
            .and_then(Credential::new)
            .context("an OpenAI API key is required (--openai-api-key or OPENAI_API_KEY)")?;
        Arc::new(OpenAiProvider::new(config.llm.clone(), key)?)
    } else {
        Arc::new(NoModel)
    };
    let api = Arc::new(GitHubApi::new(&config.github)?);
    let store = Arc::new(FileCheckpointStore::open(&config.checkpoint.directory).await?);
    info!(
        store = %store.base_path().display(),
        model = %config.llm.model,
        "Executor ready"
    );

    Ok(RunExecutor::new(model, api, store).with_config(config.run))
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
