//! Capability adapter: configures every model request for the run's platform
//! and the sub-agent's domain.

use agent::{CapabilityRegistry, Domain, ModelRequest, TaskContext};
use tracing::debug;

/// Substitutes the tool set, system instructions and state shape of a model
/// request with the canonical ones for the context's platform.
///
/// [`CapabilityAdapter::adapt`] is a pure function of `(request, context)`:
/// applying it twice gives the same request as applying it once. A platform
/// with no registered profile leaves the request untouched.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityAdapter {
    domain: Domain,
}

impl CapabilityAdapter {
    /// Creates an adapter exposing `domain`'s tools.
    pub fn new(domain: Domain) -> Self {
        Self { domain }
    }

    /// The domain whose tools this adapter installs.
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Returns `request` configured for `context`.
    pub fn adapt(&self, request: ModelRequest, context: &TaskContext) -> ModelRequest {
        let Some(profile) = CapabilityRegistry::profile(context.platform()) else {
            debug!(
                platform = %context.platform(),
                "No capability profile for platform; passing request through"
            );
            return request;
        };

        ModelRequest {
            system_instructions: profile.system_instructions().to_string(),
            messages: request.messages,
            tools: profile.tools_for(self.domain),
            state_shape: Some(profile.state_shape()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent::{ContextParams, Message, ToolSpec};
    use serde_json::json;

    fn context(platform: &str) -> TaskContext {
        TaskContext::from_params(ContextParams {
            platform: Some(platform.into()),
            credential: Some("token".into()),
            owner: Some("octo".into()),
            collection: Some("hello".into()),
            system_instructions: Some("caller instructions".into()),
        })
        .unwrap()
    }

    fn request() -> ModelRequest {
        ModelRequest {
            system_instructions: "caller instructions".into(),
            messages: vec![Message::user("list open bugs")],
            tools: vec![ToolSpec {
                name: "shell".into(),
                description: "not allowed".into(),
                parameters: json!({"type": "object"}),
            }],
            state_shape: None,
        }
    }

    #[test]
    fn adapt_installs_domain_tools_and_platform_instructions() {
        let ctx = context("github");
        let adapted = CapabilityAdapter::new(Domain::Comment).adapt(request(), &ctx);
        let names: Vec<&str> = adapted.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "get_issue_comments",
                "add_comment_to_issue",
                "update_comment",
                "delete_comment"
            ]
        );
        assert_ne!(adapted.system_instructions, "caller instructions");
        assert_eq!(adapted.state_shape.unwrap().name, "issue_state");
        assert_eq!(adapted.messages, vec![Message::user("list open bugs")]);
    }

    #[test]
    fn adapt_is_idempotent() {
        let ctx = context("github");
        let adapter = CapabilityAdapter::new(Domain::Label);
        let once = adapter.adapt(request(), &ctx);
        let twice = adapter.adapt(once.clone(), &ctx);
        assert_eq!(once, twice);
    }

    #[test]
    fn unknown_platform_passes_through() {
        let ctx = context("gitlab");
        let adapted = CapabilityAdapter::new(Domain::Issue).adapt(request(), &ctx);
        assert_eq!(adapted, request());
    }
}
