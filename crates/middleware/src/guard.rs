//! Error normalization guard.
//!
//! Every tool execution runs behind [`ErrorGuard::guard`]. Whatever happens
//! inside (a status-coded transport failure, a GraphQL error, a decode error,
//! even a panic) comes out as a [`ToolResult`] the model can read. Nothing
//! escapes to the model loop.

use std::future::Future;

use agent::{Platform, ToolFailure, ToolName, ToolResult};
use serde_json::Value;
use tracing::{error, warn};

/// Converts tool outcomes into model-readable results.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorGuard;

impl ErrorGuard {
    /// Creates a guard.
    pub fn new() -> Self {
        Self
    }

    /// Runs `execute` and normalizes its outcome.
    ///
    /// The future runs on its own task so that a panic inside the executor is
    /// caught and reported like any other unexpected failure.
    pub async fn guard<F>(
        &self,
        tool: &ToolName,
        arguments: &Value,
        platform: &Platform,
        execute: F,
    ) -> ToolResult
    where
        F: Future<Output = Result<Value, ToolFailure>> + Send + 'static,
    {
        let outcome = match tokio::spawn(execute).await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    "tool executor panicked".to_string()
                } else {
                    join_error.to_string()
                };
                Err(ToolFailure::unexpected(message))
            }
        };

        if let Err(ToolFailure::Unexpected { message }) = &outcome {
            error!(
                tool = %tool,
                arguments = %arguments,
                error = %message,
                "Unexpected error in tool execution"
            );
        }
        self.normalize(tool, platform, outcome)
    }

    /// Maps an outcome onto a [`ToolResult`].
    ///
    /// | Outcome | Result |
    /// |---------|--------|
    /// | `Ok(value)` | value rendered as content, `is_error = false` |
    /// | HTTP 401 | credential requirement for `platform`, upstream text |
    /// | HTTP 404 | the three possible causes, upstream text |
    /// | other HTTP / GraphQL | generic error naming the tool |
    /// | anything else | "Unexpected error occurred while executing …" |
    pub fn normalize(
        &self,
        tool: &ToolName,
        platform: &Platform,
        outcome: Result<Value, ToolFailure>,
    ) -> ToolResult {
        let failure = match outcome {
            Ok(value) => return ToolResult::from_value(&value),
            Err(failure) => failure,
        };

        match failure {
            ToolFailure::Transport {
                status_code: 401,
                message,
            } => {
                warn!(tool = %tool, status_code = 401, "Tool call was not authenticated");
                ToolResult::error(format!(
                    "Authentication required for {tool}. \
                     The operation requires a valid {platform} token. \
                     Error: {message}"
                ))
            }
            ToolFailure::Transport {
                status_code: 404,
                message,
            } => {
                warn!(tool = %tool, status_code = 404, "Tool call target was not found");
                ToolResult::error(format!(
                    "Resource not found for {tool}. This could mean: \
                     1) The repository/issue doesn't exist, \
                     2) The repository is private and you don't have access, or \
                     3) You need authentication to view this resource. \
                     Error: {message}"
                ))
            }
            ToolFailure::Transport {
                status_code,
                message,
            } => {
                warn!(tool = %tool, status_code, "Tool call failed upstream");
                ToolResult::error(format!("HTTP {status_code} error for {tool}: {message}"))
            }
            ToolFailure::GraphQuery { messages } => {
                warn!(tool = %tool, errors = messages.len(), "Tool query reported errors");
                ToolResult::error(format!(
                    "GraphQL error for {tool}: {}",
                    messages.join("; ")
                ))
            }
            ToolFailure::Unexpected { message } => ToolResult::error(format!(
                "Unexpected error occurred while executing {tool}: {message}"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str) -> ToolName {
        ToolName::new(name).unwrap()
    }

    fn transport(status_code: u16, message: &str) -> Result<Value, ToolFailure> {
        Err(ToolFailure::Transport {
            status_code,
            message: message.to_string(),
        })
    }

    #[test]
    fn success_is_not_an_error() {
        let result = ErrorGuard::new().normalize(
            &tool("get_issue"),
            &Platform::GitHub,
            Ok(json!({"number": 3})),
        );
        assert!(!result.is_error);
        assert_eq!(result.content, r#"{"number":3}"#);
    }

    #[test]
    fn unauthorized_names_tool_and_platform() {
        let result = ErrorGuard::new().normalize(
            &tool("create_issue"),
            &Platform::GitHub,
            transport(401, "Bad credentials"),
        );
        assert!(result.is_error);
        assert!(result.content.contains("create_issue"));
        assert!(result.content.contains("github"));
        assert!(result.content.contains("Bad credentials"));
    }

    #[test]
    fn not_found_lists_exactly_three_causes() {
        let result = ErrorGuard::new().normalize(
            &tool("get_issue"),
            &Platform::GitHub,
            transport(404, "Not Found"),
        );
        assert!(result.is_error);
        assert!(result.content.contains("Not Found"));
        assert!(result.content.contains("1) The repository/issue doesn't exist"));
        assert!(result.content.contains("2) The repository is private"));
        assert!(result.content.contains("3) You need authentication"));
        assert!(!result.content.contains("4)"));
    }

    #[test]
    fn other_statuses_are_generic() {
        let result = ErrorGuard::new().normalize(
            &tool("update_label"),
            &Platform::GitHub,
            transport(422, "Validation Failed"),
        );
        assert!(result.is_error);
        assert_eq!(
            result.content,
            "HTTP 422 error for update_label: Validation Failed"
        );
    }

    #[test]
    fn graph_query_errors_are_generic() {
        let result = ErrorGuard::new().normalize(
            &tool("search_issues"),
            &Platform::GitHub,
            Err(ToolFailure::GraphQuery {
                messages: vec!["Could not resolve to a Repository".into()],
            }),
        );
        assert!(result.is_error);
        assert!(result.content.contains("search_issues"));
        assert!(result.content.contains("Could not resolve to a Repository"));
    }

    #[tokio::test]
    async fn unexpected_failures_are_absorbed() {
        let result = ErrorGuard::new()
            .guard(&tool("delete_label"), &json!({}), &Platform::GitHub, async {
                Err(ToolFailure::unexpected("connection reset"))
            })
            .await;
        assert!(result.is_error);
        assert_eq!(
            result.content,
            "Unexpected error occurred while executing delete_label: connection reset"
        );
    }

    #[tokio::test]
    async fn panics_are_absorbed() {
        let result = ErrorGuard::new()
            .guard(&tool("get_issue"), &json!({}), &Platform::GitHub, async {
                if true {
                    panic!("boom");
                }
                Ok(Value::Null)
            })
            .await;
        assert!(result.is_error);
        assert!(result
            .content
            .starts_with("Unexpected error occurred while executing get_issue"));
    }
}
