use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::{ChainOfThoughtEntry, LogEntry};

/// Anything the execution log can mirror to durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    Log(LogEntry),
    Thought(ChainOfThoughtEntry),
}

/// Durable sink for the audit trail. Writes are best effort: the in-memory
/// log stays authoritative when persisting fails.
#[async_trait]
pub trait LogArchive: Send + Sync {
    async fn persist(&self, record: &AuditRecord) -> DomainResult<()>;
}
