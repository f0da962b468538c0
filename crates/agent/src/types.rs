//! Shared value types for the Warden domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (a credential is never printed, a tool
//! result always says whether it is an error) and flow through every layer of
//! the model loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ToolCallId, ToolName};

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// The remote collaboration platform a run operates against.
///
/// Only [`Platform::GitHub`] has a registered capability profile. Any other
/// identifier is carried verbatim so the capability adapter can pass requests
/// through unmodified instead of rejecting the run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Platform {
    /// github.com (REST v3 + GraphQL v4).
    GitHub,
    /// A platform identifier with no registered profile.
    Other(String),
}

impl Platform {
    /// Parses a platform identifier, returning `None` for blank input.
    ///
    /// Matching of known platforms is case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim();
        if v.is_empty() {
            return None;
        }
        if v.eq_ignore_ascii_case("github") {
            Some(Self::GitHub)
        } else {
            Some(Self::Other(v.to_string()))
        }
    }

    /// Returns the canonical identifier string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::GitHub => "github",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for Platform {
    fn from(value: String) -> Self {
        Self::parse(&value).unwrap_or(Self::Other(value))
    }
}

impl From<Platform> for String {
    fn from(value: Platform) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// An opaque access token for the remote platform.
///
/// Deliberately not `Serialize`: credentials are never written to a
/// checkpoint, and `Debug` output is redacted so they never reach a log line.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a token, returning `None` if it is blank.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let t = token.into();
        if t.trim().is_empty() {
            None
        } else {
            Some(Self(t))
        }
    }

    /// Returns the raw token for use in an `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// One tool invocation proposed by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call identifier.
    pub id: ToolCallId,
    /// Name of the tool to invoke.
    pub name: ToolName,
    /// Structured arguments, normally a JSON object.
    pub arguments: Value,
}

/// The outcome of a tool execution as seen by the model.
///
/// Produced only by the error normalization guard or by the approval gate
/// (for declined and cancelled calls).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Text handed back to the model.
    pub content: String,
    /// `true` when the content describes a failure rather than data.
    pub is_error: bool,
}

impl ToolResult {
    /// A successful result with the given content.
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    /// A failed result with the given explanation.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }

    /// Renders a structured tool output as a successful result.
    ///
    /// Strings are passed through as-is; everything else is rendered as
    /// compact JSON.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::success(s.clone()),
            other => Self::success(other.to_string()),
        }
    }
}

/// One turn of the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// Input supplied by the human caller.
    User {
        /// Message text.
        content: String,
    },
    /// Output from the model: either a final answer or a tool request.
    Assistant {
        /// Free text accompanying the turn (may be empty for pure tool calls).
        content: String,
        /// The tool call the model proposed in this turn, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_call: Option<ToolCall>,
    },
    /// The result of executing (or declining) a tool call.
    Tool {
        /// The call this result answers.
        tool_call_id: ToolCallId,
        /// The tool that was (or would have been) invoked.
        tool_name: ToolName,
        /// The normalized result.
        result: ToolResult,
    },
}

impl Message {
    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// An assistant message carrying a final answer.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_call: None,
        }
    }

    /// An assistant message proposing a tool call.
    pub fn assistant_tool_call(content: impl Into<String>, call: ToolCall) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_call: Some(call),
        }
    }

    /// A tool result answering `call`.
    pub fn tool_result(call: &ToolCall, result: ToolResult) -> Self {
        Self::Tool {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result,
        }
    }
}

// ---------------------------------------------------------------------------
// Model-facing descriptors
// ---------------------------------------------------------------------------

/// A tool definition handed to the model: name, description and a JSON-schema
/// object describing its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name as the model must call it.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON-schema `object` for the arguments.
    pub parameters: Value,
}

/// The canonical shape of the structured conversation state a platform
/// expects the model to maintain alongside its message history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateShape {
    /// Human-readable name of the schema (e.g. `"issue_state"`).
    pub name: String,
    /// JSON-schema `object` describing the state fields.
    pub schema: Value,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn platform_parse_is_case_insensitive_for_known_platforms() {
        assert_eq!(Platform::parse("GitHub"), Some(Platform::GitHub));
        assert_eq!(
            Platform::parse("gitlab"),
            Some(Platform::Other("gitlab".to_string()))
        );
        assert_eq!(Platform::parse("  "), None);
    }

    #[test]
    fn platform_serialises_as_identifier() {
        let json = serde_json::to_string(&Platform::GitHub).unwrap();
        assert_eq!(json, "\"github\"");
        let back: Platform = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Platform::GitHub);
    }

    #[test]
    fn credential_debug_is_redacted() {
        let credential = Credential::new("ghp_secret").unwrap();
        assert_eq!(format!("{credential:?}"), "Credential(***)");
        assert_eq!(credential.expose(), "ghp_secret");
    }

    #[test]
    fn tool_result_from_value_passes_strings_through() {
        assert_eq!(ToolResult::from_value(&json!("done")).content, "done");
        let result = ToolResult::from_value(&json!({"number": 7}));
        assert_eq!(result.content, r#"{"number":7}"#);
        assert!(!result.is_error);
    }

    #[test]
    fn messages_are_tagged_by_role() {
        let value = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(value, json!({"role": "user", "content": "hi"}));
    }
}
