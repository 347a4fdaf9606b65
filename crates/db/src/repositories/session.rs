use chrono::{DateTime, Utc};
use sqlx::Row;

use leadflow_core::domain::lead::LeadId;
use leadflow_core::scheduling::SlotSnapshot;

use super::{RepositoryError, SchedulingStateRepository};
use crate::DbPool;

/// SQL-backed scheduling context. One row per lead; writes replace the
/// previous snapshot so stale offers can never be selected.
pub struct SqlSchedulingStateRepository {
    pool: DbPool,
}

impl SqlSchedulingStateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SchedulingStateRepository for SqlSchedulingStateRepository {
    async fn put(&self, id: &LeadId, snapshot: &SlotSnapshot) -> Result<(), RepositoryError> {
        let payload = serde_json::to_string(snapshot)
            .map_err(|error| RepositoryError::Decode(format!("snapshot encode failed: {error}")))?;

        sqlx::query(
            "INSERT INTO scheduling_context (lead_phone, payload_json, created_at, expires_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(lead_phone) DO UPDATE SET
                payload_json = excluded.payload_json,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at",
        )
        .bind(&id.0)
        .bind(payload)
        .bind(snapshot.created_at)
        .bind(snapshot.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(
        &self,
        id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<Option<SlotSnapshot>, RepositoryError> {
        let row = sqlx::query(
            "SELECT payload_json FROM scheduling_context WHERE lead_phone = ? AND expires_at > ?",
        )
        .bind(&id.0)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            serde_json::from_str(&row.get::<String, _>("payload_json"))
                .map_err(|error| RepositoryError::Decode(format!("snapshot decode failed: {error}")))
        })
        .transpose()
    }

    async fn clear(&self, id: &LeadId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM scheduling_context WHERE lead_phone = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
