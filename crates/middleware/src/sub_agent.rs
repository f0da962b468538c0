//! Domain sub-agents.

use agent::{CapabilityRegistry, Domain};

use crate::{ApprovalGate, CapabilityAdapter, ErrorGuard};

/// One self-contained domain agent: its own capability adapter, approval gate
/// (over the domain's registry subset) and error guard.
///
/// Sub-agents hold no mutable state and share none with each other.
#[derive(Debug, Clone, Copy)]
pub struct SubAgent {
    domain: Domain,
    adapter: CapabilityAdapter,
    gate: ApprovalGate,
    guard: ErrorGuard,
}

impl SubAgent {
    /// Builds the sub-agent for `domain` from the capability registry.
    pub fn for_domain(domain: Domain) -> Self {
        Self {
            domain,
            adapter: CapabilityAdapter::new(domain),
            gate: ApprovalGate::new(CapabilityRegistry::policy(domain)),
            guard: ErrorGuard::new(),
        }
    }

    /// The domain this agent serves.
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Name of the agent (e.g. `"issue_agent"`).
    pub fn name(&self) -> &'static str {
        self.domain.agent_name()
    }

    /// The agent's capability adapter.
    pub fn adapter(&self) -> &CapabilityAdapter {
        &self.adapter
    }

    /// The agent's approval gate.
    pub fn gate(&self) -> &ApprovalGate {
        &self.gate
    }

    /// The agent's error guard.
    pub fn guard(&self) -> &ErrorGuard {
        &self.guard
    }
}
