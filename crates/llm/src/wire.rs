//! Chat-completions wire format.

use agent::{Message, ModelError, ModelRequest, ModelResponse, ToolCall, ToolCallId, ToolName};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

/// Translates a model request into a chat-completions body.
///
/// The state shape, when present, is described to the model in a second
/// system message. Parallel tool calls are disabled: the loop consumes
/// exactly one call per turn.
pub(crate) fn chat_request(model: &str, request: &ModelRequest) -> ChatRequest {
    let mut messages = vec![json!({
        "role": "system",
        "content": request.system_instructions,
    })];
    if let Some(shape) = &request.state_shape {
        messages.push(json!({
            "role": "system",
            "content": format!(
                "Track the conversation state using the '{}' shape: {}",
                shape.name, shape.schema
            ),
        }));
    }
    messages.extend(request.messages.iter().map(message));

    let tools: Vec<Value> = request
        .tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                },
            })
        })
        .collect();
    let parallel_tool_calls = (!tools.is_empty()).then_some(false);

    ChatRequest {
        model: model.to_string(),
        messages,
        tools,
        parallel_tool_calls,
    }
}

fn message(message: &Message) -> Value {
    match message {
        Message::User { content } => json!({ "role": "user", "content": content }),
        Message::Assistant {
            content,
            tool_call: None,
        } => json!({ "role": "assistant", "content": content }),
        Message::Assistant {
            content,
            tool_call: Some(call),
        } => json!({
            "role": "assistant",
            "content": if content.is_empty() { Value::Null } else { json!(content) },
            "tool_calls": [{
                "id": call.id,
                "type": "function",
                "function": {
                    "name": call.name,
                    "arguments": call.arguments.to_string(),
                },
            }],
        }),
        Message::Tool {
            tool_call_id,
            result,
            ..
        } => json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": result.content,
        }),
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Interprets the first choice: its first tool call if it has any, otherwise
/// its text as a final answer.
pub(crate) fn model_response(response: ChatResponse) -> Result<ModelResponse, ModelError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::MalformedResponse("response has no choices".into()))?;
    let content = choice.message.content.unwrap_or_default();

    let Some(wire) = choice.message.tool_calls.into_iter().next() else {
        return Ok(ModelResponse::FinalAnswer { content });
    };

    let name = ToolName::new(wire.function.name).ok_or_else(|| {
        ModelError::MalformedResponse("tool call has no function name".into())
    })?;
    let arguments = if wire.function.arguments.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str(&wire.function.arguments).map_err(|e| {
            ModelError::MalformedResponse(format!("arguments for {name} are not JSON: {e}"))
        })?
    };
    let id = ToolCallId::new(wire.id).unwrap_or_else(ToolCallId::new_random);

    Ok(ModelResponse::ToolCall {
        content,
        call: ToolCall {
            id,
            name,
            arguments,
        },
    })
}

/// Extracts `error.message` from a provider error body.
pub(crate) fn error_message(status_code: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {status_code}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent::{StateShape, ToolResult, ToolSpec};

    fn call() -> ToolCall {
        ToolCall {
            id: ToolCallId::new("call_1").unwrap(),
            name: ToolName::new("get_issue").unwrap(),
            arguments: json!({"issue_number": 4}),
        }
    }

    #[test]
    fn request_includes_tools_and_history() {
        let request = ModelRequest {
            system_instructions: "be careful".into(),
            messages: vec![
                Message::user("show issue 4"),
                Message::assistant_tool_call("", call()),
                Message::tool_result(&call(), ToolResult::success("{}")),
            ],
            tools: vec![ToolSpec {
                name: "get_issue".into(),
                description: "Gets an issue".into(),
                parameters: json!({"type": "object"}),
            }],
            state_shape: None,
        };
        let body = serde_json::to_value(chat_request("gpt-test", &request)).unwrap();

        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["parallel_tool_calls"], false);
        assert_eq!(body["tools"][0]["function"]["name"], "get_issue");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["content"], Value::Null);
        assert_eq!(
            messages[2]["tool_calls"][0]["function"]["arguments"],
            r#"{"issue_number":4}"#
        );
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn request_without_tools_omits_the_tool_fields() {
        let request = ModelRequest {
            system_instructions: String::new(),
            messages: vec![Message::user("hi")],
            tools: Vec::new(),
            state_shape: Some(StateShape {
                name: "issue_state".into(),
                schema: json!({"type": "object"}),
            }),
        };
        let body = serde_json::to_value(chat_request("m", &request)).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("parallel_tool_calls").is_none());
        assert!(body["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("issue_state"));
    }

    #[test]
    fn first_tool_call_wins() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [
                    {"id": "call_a", "type": "function",
                     "function": {"name": "create_issue", "arguments": "{\"title\":\"Bug\"}"}},
                    {"id": "call_b", "type": "function",
                     "function": {"name": "delete_label", "arguments": "{}"}}
                ]
            }}]
        }))
        .unwrap();

        match model_response(response).unwrap() {
            ModelResponse::ToolCall { content, call } => {
                assert_eq!(content, "");
                assert_eq!(call.id.as_str(), "call_a");
                assert_eq!(call.name.as_str(), "create_issue");
                assert_eq!(call.arguments, json!({"title": "Bug"}));
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn text_only_is_a_final_answer() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "Done."}}]
        }))
        .unwrap();
        assert_eq!(
            model_response(response).unwrap(),
            ModelResponse::FinalAnswer {
                content: "Done.".into()
            }
        );
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"tool_calls": [
                {"id": "c", "function": {"name": "get_issue", "arguments": "{not json"}}
            ]}}]
        }))
        .unwrap();
        assert!(matches!(
            model_response(response),
            Err(ModelError::MalformedResponse(_))
        ));
    }

    #[test]
    fn empty_choices_are_rejected() {
        let response: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(model_response(response).is_err());
    }

    #[test]
    fn error_message_reads_the_provider_error() {
        assert_eq!(
            error_message(429, r#"{"error":{"message":"Rate limit reached","type":"x"}}"#),
            "Rate limit reached"
        );
        assert_eq!(error_message(503, "upstream down"), "HTTP 503");
    }
}
