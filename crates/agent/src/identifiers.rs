//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example,
//! a [`RunId`] with a [`ToolCallId`] even though both are strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty
            /// or consists only of whitespace.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Run identity
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies one run: an end-to-end agent task from the initial request to
    /// its terminal answer, possibly spanning several suspend/resume cycles.
    ///
    /// Run IDs are the checkpoint key. Freshly created runs use a random UUID;
    /// runs loaded from a checkpoint keep whatever ID they were saved under.
    RunId
}

impl RunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

// ---------------------------------------------------------------------------
// Tool identity
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a tool exposed to the model (e.g. `"create_issue"`).
    ToolName
}

string_id! {
    /// Identifies one tool call proposed by the model.
    ///
    /// The model provider assigns these; the tool result message echoes the
    /// same ID so the provider can pair call and result.
    ToolCallId
}

impl ToolCallId {
    /// Generates a random call ID for providers that do not assign one.
    pub fn new_random() -> Self {
        Self(format!("call_{}", Uuid::new_v4().simple()))
    }
}

// ---------------------------------------------------------------------------
// Remote resource location
// ---------------------------------------------------------------------------

string_id! {
    /// The account or organisation that owns the remote resource collection
    /// (the `owner` in `owner/repo`).
    OwnerName
}

string_id! {
    /// The name of the remote resource collection (the `repo` in `owner/repo`).
    CollectionName
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_ids_reject_blank_values() {
        assert!(ToolName::new("").is_none());
        assert!(OwnerName::new("   ").is_none());
        assert_eq!(
            CollectionName::new("warden").map(|c| c.to_string()),
            Some("warden".to_string())
        );
    }

    #[test]
    fn random_run_ids_are_distinct() {
        assert_ne!(RunId::new_random(), RunId::new_random());
    }

    #[test]
    fn run_id_serialises_as_plain_string() {
        let id = RunId::new("run-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"run-1\"");
    }
}
