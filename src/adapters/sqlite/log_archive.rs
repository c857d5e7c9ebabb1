//! SQLite archive for the execution log.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::ports::{AuditRecord, LogArchive};

#[derive(Clone)]
pub struct SqliteLogArchive {
    pool: SqlitePool,
}

impl SqliteLogArchive {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Archived records for one task, oldest first.
    pub async fn records_for(&self, task_id: Uuid) -> DomainResult<Vec<AuditRecord>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT payload FROM audit_log WHERE task_id = ? ORDER BY id")
                .bind(task_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(payload,)| serde_json::from_str(&payload).map_err(Into::into))
            .collect()
    }

    pub async fn count(&self) -> DomainResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl LogArchive for SqliteLogArchive {
    async fn persist(&self, record: &AuditRecord) -> DomainResult<()> {
        let (seq, kind, task_id, at) = match record {
            AuditRecord::Log(entry) => (entry.seq, "log", entry.task_id, entry.timestamp),
            AuditRecord::Thought(thought) => (
                thought.seq,
                "thought",
                Some(thought.task_id),
                thought.recorded_at,
            ),
        };
        let payload = serde_json::to_string(record)?;
        sqlx::query(
            "INSERT INTO audit_log (seq, kind, task_id, payload, recorded_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(i64::try_from(seq).unwrap_or(i64::MAX))
        .bind(kind)
        .bind(task_id.map(|id| id.to_string()))
        .bind(&payload)
        .bind(at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::{ChainOfThoughtEntry, LogEntry, LogLevel};
    use crate::services::ExecutionLog;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_execution_log_mirrors_to_archive() {
        let archive = Arc::new(SqliteLogArchive::new(
            create_migrated_test_pool().await.unwrap(),
        ));
        let log = ExecutionLog::new().with_archive(archive.clone());
        let task = Uuid::new_v4();

        log.append(LogEntry::new(LogLevel::Info, "started").with_task(task))
            .await;
        log.record_thought(ChainOfThoughtEntry::new(task, "checking schema"))
            .await;
        log.log(LogLevel::Warning, "fleet-wide", None, Some("issue_sync"))
            .await;

        assert_eq!(archive.count().await.unwrap(), 3);
        let records = archive.records_for(task).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(matches!(&records[0], AuditRecord::Log(e) if e.message == "started"));
        assert!(matches!(&records[1], AuditRecord::Thought(t) if t.content == "checking schema"));
    }
}
