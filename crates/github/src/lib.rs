//! Warden GitHub infrastructure adapter.
//!
//! Implements the [`agent::ResourceApi`] trait for GitHub: every issue,
//! comment and label tool maps onto one REST call, except `search_issues`,
//! which runs a GraphQL search.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. All GitHub
//! API details (URLs, headers, authentication, payload shapes) are handled
//! here; the [`agent`] crate never sees them.
//!
//! ## Failure mapping
//!
//! | GitHub outcome | [`agent::ToolFailure`] |
//! |----------------|------------------------|
//! | non-2xx status | `Transport { status_code, message }`, where `message` is the body's `message` field or `"HTTP <code> error"` |
//! | GraphQL `errors` | `GraphQuery { messages }` |
//! | connection error, bad arguments, undecodable body | `Unexpected { message }` |
//!
//! Successful responses are flattened to compact issue, comment and label
//! objects before they reach the model.

mod client;
mod graphql;
mod operation;
mod shapes;

pub use client::{GitHubApi, GitHubConfig, GitHubSetupError};
