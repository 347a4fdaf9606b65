use sqlx::{sqlite::SqliteRow, Row};
use tracing::warn;

use leadflow_core::domain::lead::LeadId;
use leadflow_core::domain::turn::{ConversationTurn, TurnRole, TurnTag};

use super::{RepositoryError, TurnRepository};
use crate::DbPool;

pub struct SqlTurnRepository {
    pool: DbPool,
}

impl SqlTurnRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TurnRepository for SqlTurnRepository {
    async fn append(&self, id: &LeadId, turn: ConversationTurn) -> Result<(), RepositoryError> {
        let tag_code = turn.tag.as_ref().map(TurnTag::code);
        let intent_code = turn.tag.as_ref().and_then(TurnTag::intent).map(|intent| intent.code());

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO conversation_turns (lead_phone, role, message, tag, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id.0)
        .bind(turn.role.as_str())
        .bind(&turn.text)
        .bind(&tag_code)
        .bind(turn.timestamp)
        .execute(&mut *tx)
        .await?;

        if let Some(intent_code) = intent_code {
            sqlx::query(
                "UPDATE leads SET last_interaction = ?, last_intent = ? WHERE phone = ?",
            )
            .bind(turn.timestamp)
            .bind(intent_code)
            .bind(&id.0)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query("UPDATE leads SET last_interaction = ? WHERE phone = ?")
                .bind(turn.timestamp)
                .bind(&id.0)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn recent(
        &self,
        id: &LeadId,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT role, message, tag, created_at
             FROM conversation_turns
             WHERE lead_phone = ?
             ORDER BY id DESC
             LIMIT ?",
        )
        .bind(&id.0)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        // Newest-first from the query; decode what we can and hand back the
        // successfully read prefix in chronological order.
        let mut turns = Vec::with_capacity(rows.len());
        for row in rows {
            match turn_from_row(row) {
                Ok(turn) => turns.push(turn),
                Err(error) => {
                    warn!(lead_id = %id, error = %error, "stopping at undecodable turn");
                    break;
                }
            }
        }
        turns.reverse();
        Ok(turns)
    }
}

fn turn_from_row(row: SqliteRow) -> Result<ConversationTurn, RepositoryError> {
    let role_raw: String = row.get("role");
    let role = TurnRole::parse(&role_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown turn role `{role_raw}`")))?;

    let tag = match row.get::<Option<String>, _>("tag") {
        Some(code) => Some(
            TurnTag::from_code(&code)
                .ok_or_else(|| RepositoryError::Decode(format!("unknown turn tag `{code}`")))?,
        ),
        None => None,
    };

    Ok(ConversationTurn { role, text: row.get("message"), tag, timestamp: row.get("created_at") })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use leadflow_core::domain::lead::LeadId;
    use leadflow_core::domain::turn::{ConversationTurn, TurnTag};
    use leadflow_core::intent::{FeedbackKind, Intent};

    use crate::repositories::{
        LeadRepository, NewLead, SqlLeadRepository, SqlTurnRepository, TurnRepository,
    };
    use crate::{connect_with_settings, migrations, DbPool};

    async fn pool_with_lead(phone: &str) -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SqlLeadRepository::new(pool.clone())
            .create_if_absent(
                NewLead {
                    id: LeadId(phone.to_owned()),
                    display_name: "Maria".to_owned(),
                    email: None,
                    source: "post_seminar".to_owned(),
                },
                Utc::now(),
            )
            .await
            .expect("create lead");
        pool
    }

    #[tokio::test]
    async fn append_and_recent_keep_chronological_order() {
        let id = LeadId("5547999990000".to_owned());
        let pool = pool_with_lead(&id.0).await;
        let repo = SqlTurnRepository::new(pool);

        let base = Utc::now();
        for (offset, text) in ["oi", "olá!", "quero saber mais"].iter().enumerate() {
            repo.append(&id, ConversationTurn::user(*text, base + Duration::seconds(offset as i64)))
                .await
                .expect("append");
        }

        let turns = repo.recent(&id, 10).await.expect("recent");
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].text, "oi");
        assert_eq!(turns[2].text, "quero saber mais");
    }

    #[tokio::test]
    async fn recent_bounds_the_window_to_the_newest_turns() {
        let id = LeadId("5547999990001".to_owned());
        let pool = pool_with_lead(&id.0).await;
        let repo = SqlTurnRepository::new(pool);

        let base = Utc::now();
        for index in 0..8 {
            repo.append(
                &id,
                ConversationTurn::user(format!("m{index}"), base + Duration::seconds(index)),
            )
            .await
            .expect("append");
        }

        let turns = repo.recent(&id, 3).await.expect("recent");
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].text, "m5");
        assert_eq!(turns[2].text, "m7");
    }

    #[tokio::test]
    async fn intent_tags_round_trip_and_update_last_intent() {
        let id = LeadId("5547999990002".to_owned());
        let pool = pool_with_lead(&id.0).await;
        let repo = SqlTurnRepository::new(pool.clone());

        repo.append(
            &id,
            ConversationTurn::user("Gostei muito!", Utc::now())
                .tagged(TurnTag::Intent(Intent::Feedback(FeedbackKind::Positive))),
        )
        .await
        .expect("append");

        let turns = repo.recent(&id, 10).await.expect("recent");
        assert_eq!(
            turns[0].tag,
            Some(TurnTag::Intent(Intent::Feedback(FeedbackKind::Positive)))
        );

        let lead = SqlLeadRepository::new(pool).find(&id).await.expect("find").expect("present");
        assert_eq!(lead.last_intent.as_deref(), Some("feedback_positive"));
    }

    #[tokio::test]
    async fn undecodable_rows_yield_the_successful_prefix() {
        let id = LeadId("5547999990003".to_owned());
        let pool = pool_with_lead(&id.0).await;
        let repo = SqlTurnRepository::new(pool.clone());

        let base = Utc::now();
        repo.append(&id, ConversationTurn::user("boa", base)).await.expect("append");

        // Simulate a row written by a newer schema revision.
        sqlx::query(
            "INSERT INTO conversation_turns (lead_phone, role, message, tag, created_at)
             VALUES (?, 'hologram', 'future role', NULL, ?)",
        )
        .bind(&id.0)
        .bind(base + Duration::seconds(1))
        .execute(&pool)
        .await
        .expect("raw insert");

        repo.append(&id, ConversationTurn::user("depois", base + Duration::seconds(2)))
            .await
            .expect("append");

        let turns = repo.recent(&id, 10).await.expect("recent");
        assert_eq!(turns.len(), 1, "decoding stops at the bad row");
        assert_eq!(turns[0].text, "depois");
    }
}
