//! Model-facing definitions of every tool the GitHub platform exposes.
//!
//! Each entry pairs a tool name with a description and a JSON-schema object for
//! its arguments. The owner and repository never appear as arguments: they come
//! from the run's [`crate::TaskContext`], so the model cannot redirect a call to
//! a collection the caller did not choose.

use serde_json::{json, Value};

use crate::ToolSpec;

fn spec(name: &str, description: &str, parameters: Value) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn pagination() -> Value {
    json!({
        "per_page": { "type": "integer", "minimum": 1, "maximum": 100, "default": 30 },
        "page": { "type": "integer", "minimum": 1, "default": 1 }
    })
}

fn with_pagination(mut properties: Value) -> Value {
    if let (Some(target), Value::Object(extra)) = (properties.as_object_mut(), pagination()) {
        target.extend(extra);
    }
    properties
}

/// Returns the definition of `name`, or `None` if the catalog has no such tool.
pub fn tool_spec(name: &str) -> Option<ToolSpec> {
    let definition = match name {
        // --- issues -------------------------------------------------------
        "search_issues" => spec(
            name,
            "Searches issues in the repository by title and body terms.",
            object(
                json!({
                    "title": { "type": "string", "description": "Terms to match in the title" },
                    "body": { "type": "string", "description": "Terms to match in the body" },
                    "days_ago": { "type": "integer", "minimum": 1, "default": 30,
                                  "description": "Only issues created within this many days" }
                }),
                &[],
            ),
        ),
        "get_issue" => spec(
            name,
            "Gets the details of a specific issue.",
            object(json!({ "issue_number": { "type": "integer" } }), &["issue_number"]),
        ),
        "list_repository_issues" => spec(
            name,
            "Lists issues in the repository.",
            object(
                with_pagination(json!({
                    "milestone": { "type": "string", "description": "Milestone number, '*' or 'none'" },
                    "state": { "type": "string", "enum": ["open", "closed", "all"], "default": "open" },
                    "assignee": { "type": "string", "description": "Login, 'none' or '*'" },
                    "creator": { "type": "string" },
                    "mentioned": { "type": "string" },
                    "labels": { "type": "string", "description": "Comma-separated label names" },
                    "sort": { "type": "string", "enum": ["created", "updated", "comments"], "default": "created" },
                    "direction": { "type": "string", "enum": ["asc", "desc"], "default": "desc" }
                })),
                &[],
            ),
        ),
        "list_assigned_issues" => spec(
            name,
            "Lists issues assigned to the authenticated user across all repositories.",
            object(
                with_pagination(json!({
                    "filter": { "type": "string",
                                "enum": ["assigned", "created", "mentioned", "subscribed", "repos", "all"],
                                "default": "assigned" },
                    "state": { "type": "string", "enum": ["open", "closed", "all"], "default": "open" },
                    "labels": { "type": "string" },
                    "sort": { "type": "string", "enum": ["created", "updated", "comments"], "default": "created" },
                    "direction": { "type": "string", "enum": ["asc", "desc"], "default": "desc" }
                })),
                &[],
            ),
        ),
        "create_issue" => spec(
            name,
            "Creates a new issue in the repository.",
            object(
                json!({
                    "title": { "type": "string" },
                    "body": { "type": "string" },
                    "assignees": { "type": "array", "items": { "type": "string" } },
                    "milestone": { "type": "integer" },
                    "labels": { "type": "array", "items": { "type": "string" } }
                }),
                &["title"],
            ),
        ),
        "update_issue" => spec(
            name,
            "Updates an existing issue. Omitted fields are left unchanged.",
            object(
                json!({
                    "issue_number": { "type": "integer" },
                    "title": { "type": "string" },
                    "body": { "type": "string" },
                    "state": { "type": "string", "enum": ["open", "closed"] },
                    "state_reason": { "type": "string",
                                      "enum": ["completed", "not_planned", "duplicate", "reopened"] },
                    "assignees": { "type": "array", "items": { "type": "string" } },
                    "milestone": { "type": ["integer", "null"] },
                    "labels": { "type": "array", "items": { "type": "string" } }
                }),
                &["issue_number"],
            ),
        ),
        "lock_issue" => spec(
            name,
            "Locks an issue's conversation.",
            object(
                json!({
                    "issue_number": { "type": "integer" },
                    "lock_reason": { "type": "string",
                                     "enum": ["off-topic", "too heated", "resolved", "spam"] }
                }),
                &["issue_number"],
            ),
        ),
        "unlock_issue" => spec(
            name,
            "Unlocks an issue's conversation.",
            object(json!({ "issue_number": { "type": "integer" } }), &["issue_number"]),
        ),

        // --- comments -----------------------------------------------------
        "get_issue_comments" => spec(
            name,
            "Gets the comments on an issue.",
            object(
                with_pagination(json!({ "issue_number": { "type": "integer" } })),
                &["issue_number"],
            ),
        ),
        "add_comment_to_issue" => spec(
            name,
            "Adds a comment to an issue.",
            object(
                json!({
                    "issue_number": { "type": "integer" },
                    "body": { "type": "string" }
                }),
                &["issue_number", "body"],
            ),
        ),
        "update_comment" => spec(
            name,
            "Replaces the body of an existing comment.",
            object(
                json!({
                    "comment_id": { "type": "integer" },
                    "body": { "type": "string" }
                }),
                &["comment_id", "body"],
            ),
        ),
        "delete_comment" => spec(
            name,
            "Deletes a comment.",
            object(json!({ "comment_id": { "type": "integer" } }), &["comment_id"]),
        ),

        // --- labels -------------------------------------------------------
        "list_issue_labels" => spec(
            name,
            "Lists the labels applied to an issue.",
            object(
                with_pagination(json!({ "issue_number": { "type": "integer" } })),
                &["issue_number"],
            ),
        ),
        "add_labels_to_issue" => spec(
            name,
            "Adds labels to an issue, keeping existing ones.",
            object(
                json!({
                    "issue_number": { "type": "integer" },
                    "labels": { "type": "array", "items": { "type": "string" } }
                }),
                &["issue_number", "labels"],
            ),
        ),
        "set_issue_labels" => spec(
            name,
            "Replaces all labels on an issue.",
            object(
                json!({
                    "issue_number": { "type": "integer" },
                    "labels": { "type": "array", "items": { "type": "string" } }
                }),
                &["issue_number", "labels"],
            ),
        ),
        "clear_labels_from_issue" => spec(
            name,
            "Removes every label from an issue.",
            object(json!({ "issue_number": { "type": "integer" } }), &["issue_number"]),
        ),
        "remove_label_from_issue" => spec(
            name,
            "Removes one label from an issue.",
            object(
                json!({
                    "issue_number": { "type": "integer" },
                    "label_name": { "type": "string" }
                }),
                &["issue_number", "label_name"],
            ),
        ),
        "get_repository_labels" => spec(
            name,
            "Lists every label defined in the repository.",
            object(pagination(), &[]),
        ),
        "create_label" => spec(
            name,
            "Creates a repository label.",
            object(
                json!({
                    "name": { "type": "string" },
                    "color": { "type": "string", "description": "Hex colour without the leading '#'" },
                    "description": { "type": "string", "maxLength": 100 }
                }),
                &["name", "color"],
            ),
        ),
        "get_label_by_name" => spec(
            name,
            "Gets a repository label by name.",
            object(json!({ "label_name": { "type": "string" } }), &["label_name"]),
        ),
        "update_label" => spec(
            name,
            "Updates a repository label.",
            object(
                json!({
                    "label_name": { "type": "string" },
                    "new_name": { "type": "string" },
                    "color": { "type": "string" },
                    "description": { "type": "string", "maxLength": 100 }
                }),
                &["label_name"],
            ),
        ),
        "delete_label" => spec(
            name,
            "Deletes a repository label.",
            object(json!({ "label_name": { "type": "string" } }), &["label_name"]),
        ),
        _ => return None,
    };
    Some(definition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_arguments_are_declared() {
        let spec = tool_spec("create_issue").unwrap();
        assert_eq!(spec.parameters["required"], json!(["title"]));
        assert_eq!(spec.parameters["type"], "object");
    }

    #[test]
    fn paginated_tools_merge_pagination_fields() {
        let spec = tool_spec("get_issue_comments").unwrap();
        let properties = spec.parameters["properties"].as_object().unwrap();
        assert!(properties.contains_key("issue_number"));
        assert!(properties.contains_key("per_page"));
        assert!(properties.contains_key("page"));
    }

    #[test]
    fn unknown_tools_have_no_spec() {
        assert!(tool_spec("transfer_repository").is_none());
    }
}
