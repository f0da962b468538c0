//! Flattens GitHub payloads into the compact issue, comment and label shapes
//! the model reads.

use serde_json::{json, Map, Value};

use crate::operation::ResponseShape;

/// Issue bodies longer than this are truncated.
const BODY_PREVIEW_CHARS: usize = 500;

/// Applies `shape` to a successful response body.
pub(crate) fn shape(response: &ResponseShape, body: &Value) -> Value {
    match response {
        ResponseShape::Issue => issue(body),
        ResponseShape::IssueList => json!({ "issues": each(body, issue) }),
        ResponseShape::Comment => comment(body),
        ResponseShape::CommentList => json!({ "comments": each(body, comment) }),
        ResponseShape::Label => label(body),
        ResponseShape::LabelList => json!({ "labels": each(body, label) }),
        ResponseShape::Message(message) => json!({ "message": message }),
    }
}

fn each(body: &Value, item: fn(&Value) -> Value) -> Vec<Value> {
    body.as_array()
        .map(|items| items.iter().map(item).collect())
        .unwrap_or_default()
}

/// A REST issue.
pub(crate) fn issue(issue: &Value) -> Value {
    json!({
        "id": issue["id"],
        "number": issue["number"],
        "title": issue["title"],
        "body": preview(issue["body"].as_str().unwrap_or_default()),
        "state": issue["state"],
        "state_reason": issue["state_reason"],
        "url": issue["html_url"],
        "created_at": issue["created_at"],
        "updated_at": issue["updated_at"],
        "closed_at": issue["closed_at"],
        "comments_count": issue["comments"],
        "labels": names(&issue["labels"], "name"),
        "author": issue["user"]["login"],
        "assignee": issue["assignee"]["login"],
        "assignees": names(&issue["assignees"], "login"),
        "milestone": milestone(&issue["milestone"]),
        "locked": issue["locked"].as_bool().unwrap_or(false),
        "lock_reason": issue["active_lock_reason"],
        "repository": issue["repository"]["full_name"],
    })
}

/// A GraphQL `Issue` node, in the same shape as [`issue`].
pub(crate) fn graph_issue(node: &Value) -> Value {
    json!({
        "id": node["id"],
        "number": node["number"],
        "title": node["title"],
        "body": preview(node["body"].as_str().unwrap_or_default()),
        "state": node["state"].as_str().map(str::to_lowercase),
        "url": node["url"],
        "created_at": node["createdAt"],
        "updated_at": node["updatedAt"],
        "closed_at": node["closedAt"],
        "comments_count": node["comments"]["totalCount"],
        "labels": names(&node["labels"]["nodes"], "name"),
        "author": node["author"]["login"],
        "assignees": names(&node["assignees"]["nodes"], "login"),
        "milestone": milestone(&node["milestone"]),
        "locked": node["locked"].as_bool().unwrap_or(false),
        "lock_reason": node["activeLockReason"],
        "repository": node["repository"]["nameWithOwner"],
    })
}

/// A REST issue comment.
pub(crate) fn comment(comment: &Value) -> Value {
    json!({
        "id": comment["id"],
        "body": comment["body"].as_str().unwrap_or_default(),
        "author": comment["user"]["login"],
        "created_at": comment["created_at"],
        "updated_at": comment["updated_at"],
        "url": comment["html_url"],
    })
}

/// A REST label.
pub(crate) fn label(label: &Value) -> Value {
    json!({
        "id": label["id"],
        "name": label["name"],
        "description": label["description"],
        "color": label["color"],
        "default": label["default"].as_bool().unwrap_or(false),
        "url": label["url"],
    })
}

fn milestone(milestone: &Value) -> Value {
    if !milestone.is_object() {
        return Value::Null;
    }
    let mut out = Map::new();
    for key in ["number", "title", "state"] {
        out.insert(key.to_string(), milestone[key].clone());
    }
    Value::Object(out)
}

fn names(items: &Value, field: &str) -> Vec<Value> {
    items
        .as_array()
        .map(|items| items.iter().map(|item| item[field].clone()).collect())
        .unwrap_or_default()
}

fn preview(body: &str) -> String {
    if body.chars().count() <= BODY_PREVIEW_CHARS {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rest_issue() -> Value {
        json!({
            "id": 1, "number": 42, "title": "Crash", "body": "It crashes",
            "state": "open", "html_url": "https://github.com/octo/hello/issues/42",
            "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-02T00:00:00Z",
            "comments": 3,
            "labels": [{"name": "bug", "color": "d73a4a"}],
            "user": {"login": "alice"},
            "assignee": null,
            "assignees": [{"login": "bob"}],
            "milestone": {"number": 2, "title": "v1", "state": "open", "due_on": null},
            "locked": false
        })
    }

    #[test]
    fn issues_are_flattened() {
        let flat = issue(&rest_issue());
        assert_eq!(flat["number"], 42);
        assert_eq!(flat["labels"], json!(["bug"]));
        assert_eq!(flat["assignees"], json!(["bob"]));
        assert_eq!(flat["author"], "alice");
        assert_eq!(flat["assignee"], Value::Null);
        assert_eq!(flat["comments_count"], 3);
        assert_eq!(flat["milestone"], json!({"number": 2, "title": "v1", "state": "open"}));
    }

    #[test]
    fn long_bodies_are_truncated_on_char_boundaries() {
        let mut raw = rest_issue();
        raw["body"] = json!("é".repeat(600));
        let body = issue(&raw)["body"].as_str().unwrap().to_string();
        assert_eq!(body.chars().count(), BODY_PREVIEW_CHARS + 3);
        assert!(body.ends_with("..."));
    }

    #[test]
    fn lists_are_wrapped_by_kind() {
        let shaped = shape(&ResponseShape::LabelList, &json!([{"name": "bug", "id": 7}]));
        assert_eq!(shaped["labels"][0]["name"], "bug");
        assert_eq!(shaped["labels"][0]["default"], false);

        let shaped = shape(&ResponseShape::CommentList, &Value::Null);
        assert_eq!(shaped, json!({"comments": []}));
    }

    #[test]
    fn bodiless_responses_report_their_message() {
        let shaped = shape(
            &ResponseShape::Message("Issue 1 locked successfully".into()),
            &Value::Null,
        );
        assert_eq!(shaped, json!({"message": "Issue 1 locked successfully"}));
    }

    #[test]
    fn graph_issues_match_the_rest_shape() {
        let node = json!({
            "number": 5, "title": "Slow", "body": "", "state": "OPEN",
            "url": "https://github.com/octo/hello/issues/5",
            "comments": {"totalCount": 0},
            "labels": {"nodes": [{"name": "perf"}]},
            "assignees": {"nodes": []},
            "author": {"login": "carol"},
            "repository": {"nameWithOwner": "octo/hello"}
        });
        let flat = graph_issue(&node);
        assert_eq!(flat["state"], "open");
        assert_eq!(flat["labels"], json!(["perf"]));
        assert_eq!(flat["repository"], "octo/hello");
        assert_eq!(flat["milestone"], Value::Null);
    }
}
