//! Infrastructure adapters for external systems.

pub mod executors;
pub mod github_issues;
pub mod memory;
pub mod sqlite;
