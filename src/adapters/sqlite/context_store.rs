//! SQLite implementation of the ContextStore.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::ports::{CachedOutcome, ContextStore};

#[derive(Clone)]
pub struct SqliteContextStore {
    pool: SqlitePool,
}

impl SqliteContextStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContextStore for SqliteContextStore {
    async fn get(&self, fingerprint: &str) -> DomainResult<Option<CachedOutcome>> {
        let row: Option<OutcomeRow> = sqlx::query_as(
            "SELECT fingerprint, outcome, recorded_at FROM context_outcomes WHERE fingerprint = ?",
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn put(&self, entry: CachedOutcome) -> DomainResult<()> {
        let outcome_json = serde_json::to_string(&entry.outcome)?;
        sqlx::query(
            r"INSERT INTO context_outcomes (fingerprint, outcome, recorded_at) VALUES (?, ?, ?)
              ON CONFLICT(fingerprint) DO UPDATE SET outcome = excluded.outcome,
                                                     recorded_at = excluded.recorded_at",
        )
        .bind(&entry.fingerprint)
        .bind(&outcome_json)
        .bind(entry.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct OutcomeRow {
    fingerprint: String,
    outcome: String,
    recorded_at: String,
}

impl TryFrom<OutcomeRow> for CachedOutcome {
    type Error = OrchestrationError;

    fn try_from(row: OutcomeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            fingerprint: row.fingerprint,
            outcome: serde_json::from_str(&row.outcome)?,
            recorded_at: super::parse_datetime(&row.recorded_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::{Artifact, ArtifactKind, TaskOutcome};
    use chrono::Utc;

    async fn setup_test_store() -> SqliteContextStore {
        SqliteContextStore::new(create_migrated_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = setup_test_store().await;
        assert!(store.get("abc").await.unwrap().is_none());

        let outcome =
            TaskOutcome::success(vec![Artifact::new("api.rs", ArtifactKind::Code, 2048)]);
        store
            .put(CachedOutcome {
                fingerprint: "abc".into(),
                outcome: outcome.clone(),
                recorded_at: Utc::now(),
            })
            .await
            .unwrap();

        let cached = store.get("abc").await.unwrap().unwrap();
        assert_eq!(cached.outcome, outcome);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = setup_test_store().await;
        for size in [1, 2] {
            store
                .put(CachedOutcome {
                    fingerprint: "fp".into(),
                    outcome: TaskOutcome::success(vec![Artifact::new(
                        "out",
                        ArtifactKind::File,
                        size,
                    )]),
                    recorded_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let cached = store.get("fp").await.unwrap().unwrap();
        match cached.outcome {
            TaskOutcome::Success { artifacts } => assert_eq!(artifacts[0].size_bytes, 2),
            TaskOutcome::Failure { .. } => panic!("expected success"),
        }
    }
}
