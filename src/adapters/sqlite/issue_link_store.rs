//! SQLite implementation of the IssueLinkStore.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::IssueRef;
use crate::domain::ports::IssueLinkStore;

#[derive(Clone)]
pub struct SqliteIssueLinkStore {
    pool: SqlitePool,
}

impl SqliteIssueLinkStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IssueLinkStore for SqliteIssueLinkStore {
    async fn get(&self, task_id: Uuid) -> DomainResult<Option<IssueRef>> {
        let row: Option<LinkRow> = sqlx::query_as(
            "SELECT external_id, url, linked_at FROM issue_links WHERE task_id = ?",
        )
        .bind(task_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn put(&self, task_id: Uuid, issue: &IssueRef) -> DomainResult<()> {
        sqlx::query(
            r"INSERT INTO issue_links (task_id, external_id, url, linked_at) VALUES (?, ?, ?, ?)
              ON CONFLICT(task_id) DO UPDATE SET external_id = excluded.external_id,
                                                 url = excluded.url,
                                                 linked_at = excluded.linked_at",
        )
        .bind(task_id.to_string())
        .bind(&issue.external_id)
        .bind(&issue.url)
        .bind(issue.linked_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    external_id: String,
    url: Option<String>,
    linked_at: String,
}

impl TryFrom<LinkRow> for IssueRef {
    type Error = OrchestrationError;

    fn try_from(row: LinkRow) -> Result<Self, Self::Error> {
        Ok(Self {
            external_id: row.external_id,
            url: row.url,
            linked_at: super::parse_datetime(&row.linked_at)?,
        })
    }
}
