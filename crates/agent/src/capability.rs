//! Capability registry: which tools each domain exposes and which of them need
//! human approval.
//!
//! The tables in this module are the only source of approval policy. They are
//! `'static` and never change at runtime. A tool that is absent from a domain's
//! table is treated as gated: approval is denied by default, never granted by
//! default.
//!
//! Platform-level descriptors ([`PlatformProfile`]) are resolved by a plain
//! `match` on [`Platform`]; there is no runtime lookup by string.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::catalog;
use crate::{Platform, StateShape, ToolSpec};

// ---------------------------------------------------------------------------
// Domains
// ---------------------------------------------------------------------------

/// A functional area served by its own sub-agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Issue search, inspection, creation, editing and locking.
    Issue,
    /// Issue comments.
    Comment,
    /// Repository labels and issue labelling.
    Label,
}

impl Domain {
    /// Every domain, in routing order.
    pub const ALL: [Domain; 3] = [Domain::Issue, Domain::Comment, Domain::Label];

    /// Short lowercase name (`"issue"`, `"comment"`, `"label"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Comment => "comment",
            Self::Label => "label",
        }
    }

    /// Name of the sub-agent serving this domain.
    pub fn agent_name(self) -> &'static str {
        match self {
            Self::Issue => "issue_agent",
            Self::Comment => "comment_agent",
            Self::Label => "label_agent",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Capability descriptors
// ---------------------------------------------------------------------------

/// One tool of a domain and whether invoking it requires approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    /// Tool name as exposed to the model.
    pub tool_name: &'static str,
    /// `true` if the run must suspend for approval before the tool executes.
    pub requires_approval: bool,
}

const fn open(tool_name: &'static str) -> CapabilityDescriptor {
    CapabilityDescriptor {
        tool_name,
        requires_approval: false,
    }
}

const fn gated(tool_name: &'static str) -> CapabilityDescriptor {
    CapabilityDescriptor {
        tool_name,
        requires_approval: true,
    }
}

const ISSUE_CAPABILITIES: &[CapabilityDescriptor] = &[
    open("search_issues"),
    open("get_issue"),
    open("list_repository_issues"),
    open("list_assigned_issues"),
    gated("create_issue"),
    gated("update_issue"),
    gated("lock_issue"),
    gated("unlock_issue"),
];

const COMMENT_CAPABILITIES: &[CapabilityDescriptor] = &[
    open("get_issue_comments"),
    gated("add_comment_to_issue"),
    gated("update_comment"),
    gated("delete_comment"),
];

const LABEL_CAPABILITIES: &[CapabilityDescriptor] = &[
    open("list_issue_labels"),
    open("get_repository_labels"),
    open("get_label_by_name"),
    gated("add_labels_to_issue"),
    gated("set_issue_labels"),
    gated("clear_labels_from_issue"),
    gated("remove_label_from_issue"),
    gated("create_label"),
    gated("update_label"),
    gated("delete_label"),
];

/// The capability subset and approval policy of one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainPolicy {
    domain: Domain,
    capabilities: &'static [CapabilityDescriptor],
}

impl DomainPolicy {
    /// Returns the static policy table for `domain`.
    pub fn for_domain(domain: Domain) -> Self {
        let capabilities = match domain {
            Domain::Issue => ISSUE_CAPABILITIES,
            Domain::Comment => COMMENT_CAPABILITIES,
            Domain::Label => LABEL_CAPABILITIES,
        };
        Self {
            domain,
            capabilities,
        }
    }

    /// The domain this policy belongs to.
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Every capability of the domain, in declaration order.
    pub fn capabilities(&self) -> &'static [CapabilityDescriptor] {
        self.capabilities
    }

    /// Returns `true` if the domain lists `tool_name`.
    pub fn contains(&self, tool_name: &str) -> bool {
        self.descriptor(tool_name).is_some()
    }

    /// Returns `true` if invoking `tool_name` requires approval.
    ///
    /// Tools the domain does not list always require approval.
    pub fn requires_approval(&self, tool_name: &str) -> bool {
        self.descriptor(tool_name)
            .map_or(true, |descriptor| descriptor.requires_approval)
    }

    fn descriptor(&self, tool_name: &str) -> Option<&'static CapabilityDescriptor> {
        self.capabilities
            .iter()
            .find(|descriptor| descriptor.tool_name == tool_name)
    }
}

// ---------------------------------------------------------------------------
// Platform profiles
// ---------------------------------------------------------------------------

/// Canonical model-facing configuration for one platform: its instructions,
/// its conversation-state schema, and its tool definitions.
#[derive(Debug)]
pub struct PlatformProfile {
    platform: Platform,
    system_instructions: &'static str,
    state_shape: fn() -> StateShape,
}

impl PlatformProfile {
    /// The platform this profile describes.
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Canonical system instructions for the platform.
    pub fn system_instructions(&self) -> &'static str {
        self.system_instructions
    }

    /// Canonical conversation-state schema for the platform.
    pub fn state_shape(&self) -> StateShape {
        (self.state_shape)()
    }

    /// Tool definitions for `domain`, in the domain's declaration order.
    ///
    /// Only tools with a catalog entry are returned.
    pub fn tools_for(&self, domain: Domain) -> Vec<ToolSpec> {
        DomainPolicy::for_domain(domain)
            .capabilities()
            .iter()
            .filter_map(|descriptor| catalog::tool_spec(descriptor.tool_name))
            .collect()
    }
}

const GITHUB_SYSTEM_INSTRUCTIONS: &str = "You are a helpful assistant that can investigate, \
create, modify, and delete GitHub issues, comments, and labels. Use the provided tools to \
read before you write. State-changing tools may be declined by a human reviewer; when a \
tool result says an action was declined, do not retry it unchanged.";

fn github_issue_state() -> StateShape {
    StateShape {
        name: "issue_state".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "issue_number": { "type": "integer" },
                "title": { "type": "string" },
                "body": { "type": "string" },
                "state": { "type": "string" },
                "created_at": { "type": "string" },
                "updated_at": { "type": "string" },
                "comments_count": { "type": "integer" },
                "milestone": { "type": "object" },
                "labels": { "type": "array", "items": { "type": "string" } },
                "assignees": { "type": "array", "items": { "type": "string" } },
                "repository": { "type": "string" },
                "linked_branches": { "type": "array", "items": { "type": "object" } },
                "closed_by_pull_requests": { "type": "array", "items": { "type": "object" } },
                "tracked_issues": { "type": "object" },
                "tracked_in_issues": { "type": "object" },
                "sub_issues": { "type": "object" },
                "parent_issue": { "type": "object" }
            }
        }),
    }
}

static GITHUB_PROFILE: PlatformProfile = PlatformProfile {
    platform: Platform::GitHub,
    system_instructions: GITHUB_SYSTEM_INSTRUCTIONS,
    state_shape: github_issue_state,
};

/// Process-wide, read-only lookup of platform profiles.
pub struct CapabilityRegistry;

impl CapabilityRegistry {
    /// Returns the profile registered for `platform`, if any.
    pub fn profile(platform: &Platform) -> Option<&'static PlatformProfile> {
        match platform {
            Platform::GitHub => Some(&GITHUB_PROFILE),
            Platform::Other(_) => None,
        }
    }

    /// Returns the approval policy of `domain`.
    pub fn policy(domain: Domain) -> DomainPolicy {
        DomainPolicy::for_domain(domain)
    }
}
