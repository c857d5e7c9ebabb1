use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::errors::DomainResult;
use crate::domain::ports::{CachedOutcome, ContextStore};

#[derive(Debug, Default)]
pub struct InMemoryContextStore {
    entries: RwLock<HashMap<String, CachedOutcome>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn get(&self, fingerprint: &str) -> DomainResult<Option<CachedOutcome>> {
        Ok(self.entries.read().await.get(fingerprint).cloned())
    }

    async fn put(&self, entry: CachedOutcome) -> DomainResult<()> {
        self.entries
            .write()
            .await
            .insert(entry.fingerprint.clone(), entry);
        Ok(())
    }
}
