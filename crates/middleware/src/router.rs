//! Sub-agent router.

use agent::{Domain, Task, TaskContext};
use tracing::debug;

use crate::SubAgent;

/// Dispatches tasks to the issue, comment or label sub-agent.
///
/// Routing follows the caller-declared intent of the task; the router does
/// not classify instruction text. It owns one immutable [`SubAgent`] per
/// domain and has no side effects.
#[derive(Debug, Clone)]
pub struct SubAgentRouter {
    issue: SubAgent,
    comment: SubAgent,
    label: SubAgent,
}

impl Default for SubAgentRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl SubAgentRouter {
    /// Builds one sub-agent per domain.
    pub fn new() -> Self {
        Self {
            issue: SubAgent::for_domain(Domain::Issue),
            comment: SubAgent::for_domain(Domain::Comment),
            label: SubAgent::for_domain(Domain::Label),
        }
    }

    /// Selects the domain that handles `task`.
    pub fn route(&self, task: &Task, context: &TaskContext) -> Domain {
        debug!(
            intent = %task.intent,
            platform = %context.platform(),
            "Routing task to sub-agent"
        );
        task.intent
    }

    /// The sub-agent serving `domain`.
    pub fn agent(&self, domain: Domain) -> &SubAgent {
        match domain {
            Domain::Issue => &self.issue,
            Domain::Comment => &self.comment,
            Domain::Label => &self.label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent::ContextParams;

    fn context() -> TaskContext {
        TaskContext::from_params(ContextParams {
            platform: Some("github".into()),
            credential: Some("token".into()),
            owner: Some("octo".into()),
            collection: Some("hello".into()),
            system_instructions: None,
        })
        .unwrap()
    }

    #[test]
    fn routes_by_declared_intent() {
        let router = SubAgentRouter::new();
        for domain in Domain::ALL {
            let task = Task {
                intent: domain,
                instruction: "please delete every label".into(),
            };
            assert_eq!(router.route(&task, &context()), domain);
        }
    }

    #[test]
    fn each_domain_has_its_own_policy() {
        let router = SubAgentRouter::new();
        let issue = router.agent(Domain::Issue);
        let label = router.agent(Domain::Label);
        assert_eq!(issue.name(), "issue_agent");
        assert!(issue.gate().policy().contains("create_issue"));
        assert!(!label.gate().policy().contains("create_issue"));
        assert!(label.gate().policy().requires_approval("create_issue"));
    }
}
