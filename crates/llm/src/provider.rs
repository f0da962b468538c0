use std::time::Duration;

use agent::{Credential, ModelError, ModelProvider, ModelRequest, ModelResponse, RetryPolicy};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::wire::{self, ChatResponse};

/// Settings for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API root; `/chat/completions` is appended.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Retries after the first attempt for retryable failures.
    pub max_retries: u32,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// First back-off delay when the provider gives no `Retry-After`; doubles
    /// on each retry.
    pub retry_base_delay_ms: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_retries: 3,
            timeout_secs: 60,
            retry_base_delay_ms: 500,
        }
    }
}

/// Failure to construct an [`OpenAiProvider`].
#[derive(Debug, Error)]
pub enum LlmSetupError {
    /// The HTTP client could not be built.
    #[error("Failed to build LLM HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// [`ModelProvider`] over an OpenAI-compatible chat-completions API.
///
/// Rate-limit (429) and server (5xx) responses and connection failures are
/// retried up to [`OpenAiConfig::max_retries`] times, honouring
/// `Retry-After` when the provider sends one.
pub struct OpenAiProvider {
    http: reqwest::Client,
    config: OpenAiConfig,
    api_key: Credential,
    endpoint: String,
}

impl OpenAiProvider {
    /// Builds a provider authenticating with `api_key`.
    pub fn new(config: OpenAiConfig, api_key: Credential) -> Result<Self, LlmSetupError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        Ok(Self {
            http,
            config,
            api_key,
            endpoint,
        })
    }

    /// The configured model identifier.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn attempt(&self, body: &wire::ChatRequest) -> Result<ModelResponse, ModelError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let after = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            let status_code = status.as_u16();
            return Err(ModelError::Status {
                status_code,
                message: wire::error_message(status_code, &text),
                retry: retry_policy(status_code, after),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::MalformedResponse(e.to_string()))?;
        wire::model_response(parsed)
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    #[instrument(skip_all, fields(model = %self.config.model, messages = request.messages.len()))]
    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        let body = wire::chat_request(&self.config.model, request);
        let mut retries = 0u32;
        loop {
            match self.attempt(&body).await {
                Ok(response) => {
                    debug!(retries, "Model turn completed");
                    return Ok(response);
                }
                Err(error) => {
                    let RetryPolicy::Retryable { after } = error.retry_policy() else {
                        return Err(error);
                    };
                    if retries >= self.config.max_retries {
                        return Err(error);
                    }
                    retries += 1;
                    let delay = retry_delay(after, self.config.retry_base_delay_ms, retries);
                    warn!(
                        error = %error,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying model request"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Rate limits and server errors may be retried; everything else may not.
fn retry_policy(status_code: u16, after: Option<Duration>) -> RetryPolicy {
    if status_code == 429 || status_code >= 500 {
        RetryPolicy::Retryable { after }
    } else {
        RetryPolicy::NonRetryable
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Longest wait between two attempts, whoever asked for it.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// The provider's `Retry-After` when it sent one, otherwise [`backoff`];
/// never more than [`MAX_RETRY_DELAY`].
fn retry_delay(after: Option<Duration>, base_delay_ms: u64, retry: u32) -> Duration {
    after
        .unwrap_or_else(|| backoff(base_delay_ms, retry))
        .min(MAX_RETRY_DELAY)
}

/// Exponential back-off: `base`, `2 * base`, `4 * base`, … capped at
/// [`MAX_RETRY_DELAY`].
fn backoff(base_delay_ms: u64, retry: u32) -> Duration {
    let exponent = retry.saturating_sub(1).min(10);
    let scaled = base_delay_ms
        .max(1)
        .saturating_mul(2_u64.saturating_pow(exponent));
    Duration::from_millis(scaled).min(MAX_RETRY_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn rate_limits_and_server_errors_are_retryable() {
        assert_eq!(
            retry_policy(429, Some(Duration::from_secs(2))),
            RetryPolicy::Retryable {
                after: Some(Duration::from_secs(2))
            }
        );
        assert_eq!(retry_policy(503, None), RetryPolicy::Retryable { after: None });
        assert_eq!(retry_policy(401, None), RetryPolicy::NonRetryable);
        assert_eq!(retry_policy(400, None), RetryPolicy::NonRetryable);
    }

    #[test]
    fn retry_after_reads_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, HeaderValue::from_static(" 7 "));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert(
            reqwest::header::RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff(500, 1), Duration::from_millis(500));
        assert_eq!(backoff(500, 2), Duration::from_millis(1000));
        assert_eq!(backoff(500, 3), Duration::from_millis(2000));
        assert_eq!(backoff(500, 30), Duration::from_secs(30));
    }

    #[test]
    fn retry_after_is_honoured_up_to_the_ceiling() {
        assert_eq!(
            retry_delay(Some(Duration::from_secs(4)), 500, 1),
            Duration::from_secs(4)
        );
        assert_eq!(
            retry_delay(Some(Duration::from_secs(86_400)), 500, 1),
            Duration::from_secs(30)
        );
        assert_eq!(retry_delay(None, 500, 2), Duration::from_millis(1000));
    }

    #[test]
    fn endpoint_appends_chat_completions() {
        let provider = OpenAiProvider::new(
            OpenAiConfig {
                base_url: "http://localhost:8080/v1/".into(),
                ..OpenAiConfig::default()
            },
            Credential::new("sk-test").unwrap(),
        )
        .unwrap();
        assert_eq!(provider.endpoint, "http://localhost:8080/v1/chat/completions");
        assert_eq!(provider.model(), "gpt-4o-mini");
    }
}
