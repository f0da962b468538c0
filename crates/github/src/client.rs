use std::time::Duration;

use agent::{Platform, ResourceApi, TaskContext, ToolFailure, ToolName};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::operation::{self, Operation, RestRequest};
use crate::{graphql, shapes};

/// Connection settings for the GitHub API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// REST API root.
    pub api_base_url: String,
    /// GraphQL endpoint.
    pub graphql_url: String,
    /// `User-Agent` sent with every request (GitHub rejects requests without
    /// one).
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            graphql_url: "https://api.github.com/graphql".to_string(),
            user_agent: "warden".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Failure to construct a [`GitHubApi`].
#[derive(Debug, Error)]
pub enum GitHubSetupError {
    /// A configured URL does not parse or cannot carry a path.
    #[error("Invalid GitHub URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A configured header value is not valid HTTP.
    #[error("Invalid GitHub header value: {0}")]
    InvalidHeader(String),

    /// The HTTP client could not be built.
    #[error("Failed to build GitHub HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// [`ResourceApi`] over the GitHub REST and GraphQL APIs.
///
/// The credential is taken from each call's [`TaskContext`]; one client serves
/// any number of runs and repositories.
pub struct GitHubApi {
    http: reqwest::Client,
    api_base: Url,
    graphql_url: Url,
}

impl GitHubApi {
    /// Builds a client from `config`.
    pub fn new(config: &GitHubConfig) -> Result<Self, GitHubSetupError> {
        let api_base = parse_url(&config.api_base_url)?;
        if api_base.cannot_be_a_base() {
            return Err(GitHubSetupError::InvalidUrl {
                url: config.api_base_url.clone(),
                reason: "cannot be used as a base URL".to_string(),
            });
        }
        let graphql_url = parse_url(&config.graphql_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| GitHubSetupError::InvalidHeader(e.to_string()))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            http,
            api_base,
            graphql_url,
        })
    }

    async fn send_rest(
        &self,
        context: &TaskContext,
        request: RestRequest,
    ) -> Result<Value, ToolFailure> {
        let url = endpoint(&self.api_base, &request.path)?;
        debug!(method = %request.method, path = url.path(), "GitHub REST request");

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .bearer_auth(context.credential().expose());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(request_failed)?;
        let body = read_body(response).await?;
        Ok(shapes::shape(&request.response, &body))
    }

    async fn send_search(
        &self,
        context: &TaskContext,
        query: &str,
        first: u32,
    ) -> Result<Value, ToolFailure> {
        debug!(query, "GitHub GraphQL search");
        let response = self
            .http
            .post(self.graphql_url.clone())
            .bearer_auth(context.credential().expose())
            .json(&graphql::search_payload(query, first))
            .send()
            .await
            .map_err(request_failed)?;
        let body = read_body(response).await?;
        graphql::decode_search(&body)
    }
}

#[async_trait]
impl ResourceApi for GitHubApi {
    #[instrument(skip_all, fields(tool = %tool, owner = %context.owner(), repo = %context.collection()))]
    async fn execute(
        &self,
        context: &TaskContext,
        tool: &ToolName,
        arguments: &Value,
    ) -> Result<Value, ToolFailure> {
        if *context.platform() != Platform::GitHub {
            return Err(ToolFailure::unexpected(format!(
                "platform '{}' is not served by the GitHub API",
                context.platform()
            )));
        }

        let operation = operation::plan(
            tool.as_str(),
            context.owner().as_str(),
            context.collection().as_str(),
            arguments,
            Utc::now().date_naive(),
        )?;
        match operation {
            Operation::Rest(request) => self.send_rest(context, request).await,
            Operation::Search { query, first } => self.send_search(context, &query, first).await,
        }
    }
}

fn parse_url(raw: &str) -> Result<Url, GitHubSetupError> {
    Url::parse(raw).map_err(|e| GitHubSetupError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Appends `segments` to `base`, percent-encoding each one.
pub(crate) fn endpoint(base: &Url, segments: &[String]) -> Result<Url, ToolFailure> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ToolFailure::unexpected(format!("'{base}' cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Reads a response, turning non-success statuses into
/// [`ToolFailure::Transport`]. An empty success body decodes to `null`.
async fn read_body(response: Response) -> Result<Value, ToolFailure> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ToolFailure::unexpected(format!("failed to read GitHub response: {e}")))?;

    if !status.is_success() {
        return Err(ToolFailure::Transport {
            status_code: status.as_u16(),
            message: error_message(status.as_u16(), &text),
        });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text)
        .map_err(|e| ToolFailure::unexpected(format!("GitHub returned invalid JSON: {e}")))
}

/// The `message` field of a GitHub error body, or a generic fallback.
pub(crate) fn error_message(status_code: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {status_code} error"))
}

fn request_failed(error: reqwest::Error) -> ToolFailure {
    ToolFailure::unexpected(format!("GitHub request failed: {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_the_body_message() {
        assert_eq!(
            error_message(404, r#"{"message":"Not Found","documentation_url":"x"}"#),
            "Not Found"
        );
        assert_eq!(error_message(502, "<html>bad gateway</html>"), "HTTP 502 error");
        assert_eq!(error_message(500, ""), "HTTP 500 error");
    }

    #[test]
    fn endpoint_encodes_each_segment() {
        let base = Url::parse("https://api.github.com/").unwrap();
        let url = endpoint(
            &base,
            &[
                "repos".to_string(),
                "octo".to_string(),
                "hello".to_string(),
                "labels".to_string(),
                "good first issue".to_string(),
            ],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/octo/hello/labels/good%20first%20issue"
        );
    }

    #[test]
    fn endpoint_keeps_an_enterprise_prefix() {
        let base = Url::parse("https://ghe.example.com/api/v3").unwrap();
        let url = endpoint(&base, &["issues".to_string()]).unwrap();
        assert_eq!(url.as_str(), "https://ghe.example.com/api/v3/issues");
    }

    #[test]
    fn default_config_targets_public_github() {
        let api = GitHubApi::new(&GitHubConfig::default()).unwrap();
        assert_eq!(api.api_base.as_str(), "https://api.github.com/");
        assert_eq!(api.graphql_url.path(), "/graphql");
    }

    #[test]
    fn invalid_urls_are_rejected() {
        let config = GitHubConfig {
            api_base_url: "not a url".into(),
            ..GitHubConfig::default()
        };
        assert!(matches!(
            GitHubApi::new(&config),
            Err(GitHubSetupError::InvalidUrl { .. })
        ));
    }
}
