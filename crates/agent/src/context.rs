//! The per-run context carrier.
//!
//! A [`TaskContext`] is built once, at run start, from caller-supplied
//! [`ContextParams`] and then threaded read-only through every model step and
//! tool call of the run. Nothing mutates it afterwards.

use serde::{Deserialize, Serialize};

use crate::{AgentError, CollectionName, Credential, OwnerName, Platform};

/// Raw, unvalidated caller input for a [`TaskContext`].
///
/// Every field is optional here so that absence can be reported as a
/// [`AgentError::Configuration`] rather than a deserialisation failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextParams {
    /// Platform identifier (e.g. `"github"`).
    pub platform: Option<String>,
    /// Access token for the platform. Not serialised.
    #[serde(skip)]
    pub credential: Option<String>,
    /// Owner of the resource collection.
    pub owner: Option<String>,
    /// Name of the resource collection.
    pub collection: Option<String>,
    /// Caller-supplied system instructions. Optional: platforms with a
    /// registered profile replace them with their canonical instructions.
    pub system_instructions: Option<String>,
}

/// Immutable per-run context.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskContext {
    platform: Platform,
    credential: Credential,
    owner: OwnerName,
    collection: CollectionName,
    system_instructions: String,
}

impl TaskContext {
    /// Validates caller input into a context.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Configuration`] naming the first missing or
    /// blank required field (`platform`, `credential`, `owner`, `collection`).
    pub fn from_params(params: ContextParams) -> Result<Self, AgentError> {
        let platform = params
            .platform
            .as_deref()
            .and_then(Platform::parse)
            .ok_or_else(|| missing("platform"))?;
        let credential = params
            .credential
            .and_then(Credential::new)
            .ok_or_else(|| missing("credential"))?;
        let owner = params
            .owner
            .and_then(OwnerName::new)
            .ok_or_else(|| missing("owner"))?;
        let collection = params
            .collection
            .and_then(CollectionName::new)
            .ok_or_else(|| missing("collection"))?;

        Ok(Self {
            platform,
            credential,
            owner,
            collection,
            system_instructions: params.system_instructions.unwrap_or_default(),
        })
    }

    /// The platform this run operates against.
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// The access token for [`Self::platform`].
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Owner of the resource collection.
    pub fn owner(&self) -> &OwnerName {
        &self.owner
    }

    /// Name of the resource collection.
    pub fn collection(&self) -> &CollectionName {
        &self.collection
    }

    /// Caller-supplied system instructions (possibly empty).
    pub fn system_instructions(&self) -> &str {
        &self.system_instructions
    }
}

fn missing(field: &str) -> AgentError {
    AgentError::configuration(format!("required context field '{field}' is missing"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_params() -> ContextParams {
        ContextParams {
            platform: Some("github".into()),
            credential: Some("ghp_token".into()),
            owner: Some("octo".into()),
            collection: Some("hello-world".into()),
            system_instructions: None,
        }
    }

    #[test]
    fn from_params_accepts_complete_input() {
        let ctx = TaskContext::from_params(full_params()).unwrap();
        assert_eq!(ctx.platform(), &Platform::GitHub);
        assert_eq!(ctx.owner().as_str(), "octo");
        assert_eq!(ctx.collection().as_str(), "hello-world");
        assert_eq!(ctx.system_instructions(), "");
    }

    #[test]
    fn from_params_names_the_missing_field() {
        let params = ContextParams {
            credential: Some("  ".into()),
            ..full_params()
        };
        let err = TaskContext::from_params(params).unwrap_err();
        assert!(matches!(err, AgentError::Configuration { .. }));
        assert!(err.to_string().contains("'credential'"));
    }

    #[test]
    fn from_params_rejects_missing_collection() {
        let params = ContextParams {
            collection: None,
            ..full_params()
        };
        let err = TaskContext::from_params(params).unwrap_err();
        assert!(err.to_string().contains("'collection'"));
    }
}
