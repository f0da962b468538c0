//! GraphQL issue search.

use agent::ToolFailure;
use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::shapes;

/// Search query; `nodes` that are not issues (pull requests) come back empty
/// and are skipped.
pub(crate) const SEARCH_ISSUES: &str = r#"
query SearchIssues($query: String!, $first: Int!) {
  search(query: $query, type: ISSUE, first: $first) {
    issueCount
    nodes {
      ... on Issue {
        id
        number
        title
        body
        state
        createdAt
        updatedAt
        closedAt
        url
        author { login }
        assignees(first: 10) { nodes { login } }
        labels(first: 20) { nodes { name } }
        milestone { number title state }
        comments { totalCount }
        locked
        activeLockReason
        repository { nameWithOwner }
      }
    }
  }
}
"#;

/// Builds the GitHub search string for issues in `owner/repo` created after
/// `since`, optionally matching title and body terms.
pub(crate) fn search_terms(
    owner: &str,
    repo: &str,
    title: Option<&str>,
    body: Option<&str>,
    since: NaiveDate,
) -> String {
    let mut terms = vec![
        format!("repo:{owner}/{repo}"),
        "is:issue".to_string(),
        format!("created:>{}", since.format("%Y-%m-%d")),
    ];
    if let Some(title) = title {
        terms.push(format!("{title} in:title"));
    }
    if let Some(body) = body {
        terms.push(format!("{body} in:body"));
    }
    terms.join(" ")
}

/// The request payload for [`SEARCH_ISSUES`].
pub(crate) fn search_payload(query: &str, first: u32) -> Value {
    json!({
        "query": SEARCH_ISSUES,
        "variables": { "query": query, "first": first },
    })
}

/// Decodes a search response into `{ total_count, issues }`.
///
/// A response carrying `errors` fails with [`ToolFailure::GraphQuery`] even
/// when the HTTP status was 200.
pub(crate) fn decode_search(response: &Value) -> Result<Value, ToolFailure> {
    if let Some(errors) = response["errors"].as_array().filter(|e| !e.is_empty()) {
        let messages = errors
            .iter()
            .map(|error| {
                error["message"]
                    .as_str()
                    .unwrap_or("Unknown error")
                    .to_string()
            })
            .collect();
        return Err(ToolFailure::GraphQuery { messages });
    }

    let search = &response["data"]["search"];
    if !search.is_object() {
        return Err(ToolFailure::unexpected(
            "GraphQL response carried no search data",
        ));
    }
    let issues: Vec<Value> = search["nodes"]
        .as_array()
        .map(|nodes| {
            nodes
                .iter()
                .filter(|node| node.get("number").is_some())
                .map(shapes::graph_issue)
                .collect()
        })
        .unwrap_or_default();

    Ok(json!({
        "total_count": search["issueCount"],
        "issues": issues,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_scope_to_the_repository() {
        let since = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(
            search_terms("octo", "hello", Some("panic"), None, since),
            "repo:octo/hello is:issue created:>2024-01-15 panic in:title"
        );
    }

    #[test]
    fn payload_carries_variables() {
        let payload = search_payload("repo:octo/hello", 15);
        assert_eq!(payload["variables"]["first"], 15);
        assert!(payload["query"].as_str().unwrap().contains("search("));
    }

    #[test]
    fn errors_become_graph_query_failures() {
        let response = json!({
            "data": null,
            "errors": [
                {"message": "Could not resolve to a Repository"},
                {"type": "INTERNAL"}
            ]
        });
        assert_eq!(
            decode_search(&response).unwrap_err(),
            ToolFailure::GraphQuery {
                messages: vec![
                    "Could not resolve to a Repository".into(),
                    "Unknown error".into()
                ]
            }
        );
    }

    #[test]
    fn results_skip_non_issue_nodes() {
        let response = json!({
            "data": {"search": {
                "issueCount": 2,
                "nodes": [
                    {"number": 1, "title": "A", "state": "CLOSED"},
                    {}
                ]
            }}
        });
        let decoded = decode_search(&response).unwrap();
        assert_eq!(decoded["total_count"], 2);
        assert_eq!(decoded["issues"].as_array().unwrap().len(), 1);
        assert_eq!(decoded["issues"][0]["state"], "closed");
    }

    #[test]
    fn missing_data_is_unexpected() {
        assert!(matches!(
            decode_search(&json!({})),
            Err(ToolFailure::Unexpected { .. })
        ));
    }
}
