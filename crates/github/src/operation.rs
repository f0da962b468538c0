//! Maps a tool name and its model-supplied arguments onto a GitHub request.
//!
//! Pure: nothing here performs I/O, so every mapping is unit-testable.

use agent::ToolFailure;
use chrono::{Duration, NaiveDate};
use reqwest::Method;
use serde_json::{Map, Value};

use crate::graphql;

/// Page size used for issue search.
const SEARCH_PAGE_SIZE: u32 = 15;

/// Upper bound on the search window, in days.
const MAX_SEARCH_DAYS: u64 = 36_500;

/// GitHub's maximum page size.
const MAX_PER_PAGE: u64 = 100;

/// What a successful response is flattened into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ResponseShape {
    Issue,
    IssueList,
    Comment,
    CommentList,
    Label,
    LabelList,
    /// The endpoint returns no useful body; report this message instead.
    Message(String),
}

/// A REST call relative to the API base URL.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RestRequest {
    pub method: Method,
    pub path: Vec<String>,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<Value>,
    pub response: ResponseShape,
}

/// One resolved tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operation {
    Rest(RestRequest),
    /// GraphQL issue search.
    Search { query: String, first: u32 },
}

/// Resolves `tool` against the repository `owner/repo`.
///
/// `today` anchors relative date filters.
pub(crate) fn plan(
    tool: &str,
    owner: &str,
    repo: &str,
    arguments: &Value,
    today: NaiveDate,
) -> Result<Operation, ToolFailure> {
    let args = Arguments::new(arguments)?;
    let repo_path = |rest: &[String]| -> Vec<String> {
        let mut path = vec!["repos".to_string(), owner.to_string(), repo.to_string()];
        path.extend_from_slice(rest);
        path
    };
    let issue_path = |number: u64, rest: &[&str]| -> Vec<String> {
        let mut tail = vec!["issues".to_string(), number.to_string()];
        tail.extend(rest.iter().map(|s| s.to_string()));
        repo_path(&tail)
    };

    let request = match tool {
        "search_issues" => {
            let days_ago = args.optional_number("days_ago").unwrap_or(30).min(MAX_SEARCH_DAYS);
            let since = today - Duration::days(days_ago as i64);
            return Ok(Operation::Search {
                query: graphql::search_terms(
                    owner,
                    repo,
                    args.optional_text("title"),
                    args.optional_text("body"),
                    since,
                ),
                first: SEARCH_PAGE_SIZE,
            });
        }
        "get_issue" => RestRequest {
            method: Method::GET,
            path: issue_path(args.number("issue_number")?, &[]),
            query: Vec::new(),
            body: None,
            response: ResponseShape::Issue,
        },
        "list_repository_issues" => {
            let mut query = vec![
                ("state", args.text_or("state", "open")),
                ("sort", args.text_or("sort", "created")),
                ("direction", args.text_or("direction", "desc")),
            ];
            for key in ["milestone", "assignee", "creator", "mentioned", "labels"] {
                if let Some(value) = args.optional_text(key) {
                    query.push((key, value.to_string()));
                }
            }
            args.paginate(&mut query);
            RestRequest {
                method: Method::GET,
                path: repo_path(&["issues".to_string()]),
                query,
                body: None,
                response: ResponseShape::IssueList,
            }
        }
        "list_assigned_issues" => {
            let mut query = vec![
                ("filter", args.text_or("filter", "assigned")),
                ("state", args.text_or("state", "open")),
                ("sort", args.text_or("sort", "created")),
                ("direction", args.text_or("direction", "desc")),
            ];
            if let Some(labels) = args.optional_text("labels") {
                query.push(("labels", labels.to_string()));
            }
            args.paginate(&mut query);
            RestRequest {
                method: Method::GET,
                path: vec!["issues".to_string()],
                query,
                body: None,
                response: ResponseShape::IssueList,
            }
        }
        "create_issue" => {
            args.text("title")?;
            RestRequest {
                method: Method::POST,
                path: repo_path(&["issues".to_string()]),
                query: Vec::new(),
                body: Some(args.pick(&["title", "body", "assignees", "milestone", "labels"])),
                response: ResponseShape::Issue,
            }
        }
        "update_issue" => RestRequest {
            method: Method::PATCH,
            path: issue_path(args.number("issue_number")?, &[]),
            query: Vec::new(),
            body: Some(args.pick(&[
                "title",
                "body",
                "state",
                "state_reason",
                "assignees",
                "milestone",
                "labels",
            ])),
            response: ResponseShape::Issue,
        },
        "lock_issue" => {
            let number = args.number("issue_number")?;
            RestRequest {
                method: Method::PUT,
                path: issue_path(number, &["lock"]),
                query: Vec::new(),
                body: Some(args.pick(&["lock_reason"])),
                response: ResponseShape::Message(format!("Issue {number} locked successfully")),
            }
        }
        "unlock_issue" => {
            let number = args.number("issue_number")?;
            RestRequest {
                method: Method::DELETE,
                path: issue_path(number, &["lock"]),
                query: Vec::new(),
                body: None,
                response: ResponseShape::Message(format!("Issue {number} unlocked successfully")),
            }
        }

        "get_issue_comments" => {
            let mut query = Vec::new();
            args.paginate(&mut query);
            RestRequest {
                method: Method::GET,
                path: issue_path(args.number("issue_number")?, &["comments"]),
                query,
                body: None,
                response: ResponseShape::CommentList,
            }
        }
        "add_comment_to_issue" => {
            args.text("body")?;
            RestRequest {
                method: Method::POST,
                path: issue_path(args.number("issue_number")?, &["comments"]),
                query: Vec::new(),
                body: Some(args.pick(&["body"])),
                response: ResponseShape::Comment,
            }
        }
        "update_comment" => {
            args.text("body")?;
            RestRequest {
                method: Method::PATCH,
                path: repo_path(&comment_tail(args.number("comment_id")?)),
                query: Vec::new(),
                body: Some(args.pick(&["body"])),
                response: ResponseShape::Comment,
            }
        }
        "delete_comment" => {
            let id = args.number("comment_id")?;
            RestRequest {
                method: Method::DELETE,
                path: repo_path(&comment_tail(id)),
                query: Vec::new(),
                body: None,
                response: ResponseShape::Message(format!("Comment {id} deleted successfully")),
            }
        }

        "list_issue_labels" => {
            let mut query = Vec::new();
            args.paginate(&mut query);
            RestRequest {
                method: Method::GET,
                path: issue_path(args.number("issue_number")?, &["labels"]),
                query,
                body: None,
                response: ResponseShape::LabelList,
            }
        }
        "add_labels_to_issue" | "set_issue_labels" => {
            args.array("labels")?;
            RestRequest {
                method: if tool == "add_labels_to_issue" {
                    Method::POST
                } else {
                    Method::PUT
                },
                path: issue_path(args.number("issue_number")?, &["labels"]),
                query: Vec::new(),
                body: Some(args.pick(&["labels"])),
                response: ResponseShape::LabelList,
            }
        }
        "clear_labels_from_issue" => {
            let number = args.number("issue_number")?;
            RestRequest {
                method: Method::DELETE,
                path: issue_path(number, &["labels"]),
                query: Vec::new(),
                body: None,
                response: ResponseShape::Message(format!(
                    "All labels removed from issue {number}"
                )),
            }
        }
        "remove_label_from_issue" => {
            let label = args.text("label_name")?;
            let mut path = issue_path(args.number("issue_number")?, &["labels"]);
            path.push(label.to_string());
            RestRequest {
                method: Method::DELETE,
                path,
                query: Vec::new(),
                body: None,
                response: ResponseShape::LabelList,
            }
        }
        "get_repository_labels" => {
            let mut query = Vec::new();
            args.paginate(&mut query);
            RestRequest {
                method: Method::GET,
                path: repo_path(&["labels".to_string()]),
                query,
                body: None,
                response: ResponseShape::LabelList,
            }
        }
        "create_label" => {
            args.text("name")?;
            args.text("color")?;
            RestRequest {
                method: Method::POST,
                path: repo_path(&["labels".to_string()]),
                query: Vec::new(),
                body: Some(args.pick(&["name", "color", "description"])),
                response: ResponseShape::Label,
            }
        }
        "get_label_by_name" => RestRequest {
            method: Method::GET,
            path: repo_path(&label_tail(args.text("label_name")?)),
            query: Vec::new(),
            body: None,
            response: ResponseShape::Label,
        },
        "update_label" => RestRequest {
            method: Method::PATCH,
            path: repo_path(&label_tail(args.text("label_name")?)),
            query: Vec::new(),
            body: Some(args.pick(&["new_name", "color", "description"])),
            response: ResponseShape::Label,
        },
        "delete_label" => {
            let label = args.text("label_name")?;
            RestRequest {
                method: Method::DELETE,
                path: repo_path(&label_tail(label)),
                query: Vec::new(),
                body: None,
                response: ResponseShape::Message(format!("Label '{label}' deleted successfully")),
            }
        }
        other => {
            return Err(ToolFailure::unexpected(format!(
                "no GitHub operation named '{other}'"
            )))
        }
    };
    Ok(Operation::Rest(request))
}

fn comment_tail(id: u64) -> Vec<String> {
    vec!["issues".to_string(), "comments".to_string(), id.to_string()]
}

fn label_tail(name: &str) -> Vec<String> {
    vec!["labels".to_string(), name.to_string()]
}

// ---------------------------------------------------------------------------
// Argument access
// ---------------------------------------------------------------------------

/// Typed view over a tool's JSON arguments. `null` counts as no arguments.
struct Arguments<'a> {
    values: Option<&'a Map<String, Value>>,
}

impl<'a> Arguments<'a> {
    fn new(arguments: &'a Value) -> Result<Self, ToolFailure> {
        match arguments {
            Value::Object(values) => Ok(Self {
                values: Some(values),
            }),
            Value::Null => Ok(Self { values: None }),
            other => Err(ToolFailure::unexpected(format!(
                "tool arguments must be a JSON object, got {other}"
            ))),
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.values?.get(key)
    }

    fn number(&self, key: &str) -> Result<u64, ToolFailure> {
        self.optional_number(key).ok_or_else(|| invalid(key, "a positive integer"))
    }

    fn optional_number(&self, key: &str) -> Option<u64> {
        match self.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn text(&self, key: &str) -> Result<&'a str, ToolFailure> {
        self.optional_text(key).ok_or_else(|| invalid(key, "a non-empty string"))
    }

    fn optional_text(&self, key: &str) -> Option<&'a str> {
        self.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn text_or(&self, key: &str, default: &str) -> String {
        self.optional_text(key).unwrap_or(default).to_string()
    }

    fn array(&self, key: &str) -> Result<&'a Vec<Value>, ToolFailure> {
        self.get(key)
            .and_then(Value::as_array)
            .ok_or_else(|| invalid(key, "an array"))
    }

    /// Appends `per_page` (capped at 100) and `page`.
    fn paginate(&self, query: &mut Vec<(&'static str, String)>) {
        let per_page = self.optional_number("per_page").unwrap_or(30).clamp(1, MAX_PER_PAGE);
        let page = self.optional_number("page").unwrap_or(1).max(1);
        query.push(("per_page", per_page.to_string()));
        query.push(("page", page.to_string()));
    }

    /// A request body holding only the listed keys the model supplied.
    fn pick(&self, keys: &[&str]) -> Value {
        let body: Map<String, Value> = keys
            .iter()
            .filter_map(|key| Some((key.to_string(), self.get(key)?.clone())))
            .collect();
        Value::Object(body)
    }
}

fn invalid(key: &str, expected: &str) -> ToolFailure {
    ToolFailure::unexpected(format!("argument '{key}' is required and must be {expected}"))
}
