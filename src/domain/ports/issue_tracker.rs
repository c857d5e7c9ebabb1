//! Issue tracker port.
//!
//! The core reaches the remote tracker only through this trait. Adapters
//! classify every failure as transient (worth retrying) or permanent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::models::IssueRef;

/// Remote issue state as the tracker sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// Network failure, timeout, 5xx or rate limiting
    #[error("Transient tracker error: {0}")]
    Transient(String),

    /// Rejected request (4xx other than rate limiting)
    #[error("Permanent tracker error: {0}")]
    Permanent(String),
}

impl TrackerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;

#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn create_issue(&self, title: &str, body: &str) -> TrackerResult<IssueRef>;

    /// Replace the issue's state and labels.
    async fn update_issue(
        &self,
        external_id: &str,
        state: IssueState,
        labels: &[String],
    ) -> TrackerResult<()>;

    async fn add_comment(&self, external_id: &str, body: &str) -> TrackerResult<()>;

    async fn get_issue(&self, external_id: &str) -> TrackerResult<IssueState>;
}
