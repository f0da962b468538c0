//! Warden LLM provider infrastructure adapter.
//!
//! Implements the [`agent::ModelProvider`] trait over an OpenAI-compatible
//! chat-completions endpoint with function tools.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Translates [`agent::ModelRequest`]s into provider wire
//! format and provider answers back into [`agent::ModelResponse`]s. Retry and
//! back-off for transient provider failures live here, driven by
//! [`agent::RetryPolicy`]; the orchestration layer sees only the final
//! outcome.
//!
//! A turn yields either a final answer or exactly one tool call. When the
//! provider proposes several, the first is taken.

mod provider;
mod wire;

pub use provider::{LlmSetupError, OpenAiConfig, OpenAiProvider};
