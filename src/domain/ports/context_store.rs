use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::TaskOutcome;

/// An outcome recorded under a fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedOutcome {
    pub fingerprint: String,
    pub outcome: TaskOutcome,
    pub recorded_at: DateTime<Utc>,
}

/// Content-addressed outcome store. `put` on an existing fingerprint
/// overwrites it.
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn get(&self, fingerprint: &str) -> DomainResult<Option<CachedOutcome>>;

    async fn put(&self, entry: CachedOutcome) -> DomainResult<()>;
}
