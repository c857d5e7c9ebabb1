//! In-memory adapters for tests, dry runs and cacheless setups.

mod context_store;
mod issue_link_store;
mod issue_tracker;

pub use context_store::InMemoryContextStore;
pub use issue_link_store::InMemoryIssueLinkStore;
pub use issue_tracker::{InMemoryIssueTracker, RemoteIssue};
