use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::IssueRef;

/// Durable task → issue mapping. Survives restarts so an issue is never
/// created twice for the same task.
#[async_trait]
pub trait IssueLinkStore: Send + Sync {
    async fn get(&self, task_id: Uuid) -> DomainResult<Option<IssueRef>>;

    async fn put(&self, task_id: Uuid, issue: &IssueRef) -> DomainResult<()>;
}

/// Receives newly created links so they can be written back onto the task.
#[async_trait]
pub trait IssueLinkSink: Send + Sync {
    async fn link_issue(&self, task_id: Uuid, issue: IssueRef);
}
