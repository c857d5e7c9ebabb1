use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::IssueRef;
use crate::domain::ports::IssueLinkStore;

#[derive(Debug, Default)]
pub struct InMemoryIssueLinkStore {
    links: RwLock<HashMap<Uuid, IssueRef>>,
}

impl InMemoryIssueLinkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IssueLinkStore for InMemoryIssueLinkStore {
    async fn get(&self, task_id: Uuid) -> DomainResult<Option<IssueRef>> {
        Ok(self.links.read().await.get(&task_id).cloned())
    }

    async fn put(&self, task_id: Uuid, issue: &IssueRef) -> DomainResult<()> {
        self.links.write().await.insert(task_id, issue.clone());
        Ok(())
    }
}
