//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - IssueTracker: remote issue tracker operations
//! - ContextStore: fingerprint-keyed outcome storage
//! - IssueLinkStore: durable task to issue mapping
//! - LogArchive: durable audit trail
//! - AgentExecutor: opaque agent execution
//!
//! These traits keep the orchestration core independent of any specific
//! storage backend or tracker.

pub mod agent_executor;
pub mod context_store;
pub mod issue_link_store;
pub mod issue_tracker;
pub mod log_archive;

pub use agent_executor::{AgentExecutor, AgentJournal, ExecutionContext};
pub use context_store::{CachedOutcome, ContextStore};
pub use issue_link_store::{IssueLinkSink, IssueLinkStore};
pub use issue_tracker::{IssueState, IssueTracker, TrackerError, TrackerResult};
pub use log_archive::{AuditRecord, LogArchive};
