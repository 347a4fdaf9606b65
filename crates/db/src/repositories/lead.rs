use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use leadflow_core::domain::lead::{FunnelStatus, Lead, LeadId};

use super::{ConversionStats, LeadRepository, NewLead, RepositoryError};
use crate::DbPool;

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LeadRepository for SqlLeadRepository {
    async fn create_if_absent(
        &self,
        lead: NewLead,
        at: DateTime<Utc>,
    ) -> Result<Lead, RepositoryError> {
        sqlx::query(
            "INSERT INTO leads (phone, display_name, email, source, status, first_contact, last_interaction)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(phone) DO NOTHING",
        )
        .bind(&lead.id.0)
        .bind(&lead.display_name)
        .bind(&lead.email)
        .bind(&lead.source)
        .bind(FunnelStatus::New.as_str())
        .bind(at)
        .bind(at)
        .execute(&self.pool)
        .await?;

        self.find(&lead.id).await?.ok_or_else(|| {
            RepositoryError::Decode(format!("lead {} vanished after idempotent create", lead.id))
        })
    }

    async fn find(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query(
            "SELECT phone, display_name, email, source, status, last_intent,
                    first_contact, last_interaction
             FROM leads
             WHERE phone = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(lead_from_row).transpose()
    }

    async fn update_status(
        &self,
        id: &LeadId,
        status: FunnelStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE leads SET status = ?, last_interaction = ? WHERE phone = ?",
        )
        .bind(status.as_str())
        .bind(at)
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_email(
        &self,
        id: &LeadId,
        email: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE leads SET email = ?, last_interaction = ? WHERE phone = ?")
            .bind(email)
            .bind(at)
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn conversion_stats(&self) -> Result<ConversionStats, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) AS total_leads,
                SUM(CASE WHEN status <> 'new' THEN 1 ELSE 0 END) AS contacted,
                SUM(CASE WHEN status = 'qualified' THEN 1 ELSE 0 END) AS qualified,
                SUM(CASE WHEN status = 'scheduled' THEN 1 ELSE 0 END) AS scheduled,
                SUM(CASE WHEN status = 'converted' THEN 1 ELSE 0 END) AS converted
             FROM leads",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(ConversionStats {
            total_leads: row.get::<i64, _>("total_leads"),
            contacted: row.get::<Option<i64>, _>("contacted").unwrap_or(0),
            qualified: row.get::<Option<i64>, _>("qualified").unwrap_or(0),
            scheduled: row.get::<Option<i64>, _>("scheduled").unwrap_or(0),
            converted: row.get::<Option<i64>, _>("converted").unwrap_or(0),
        })
    }
}

fn lead_from_row(row: SqliteRow) -> Result<Lead, RepositoryError> {
    let status_raw: String = row.get("status");
    let status = FunnelStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown funnel status `{status_raw}`")))?;

    Ok(Lead {
        id: LeadId(row.get("phone")),
        display_name: row.get("display_name"),
        email: row.get("email"),
        source: row.get("source"),
        status,
        last_intent: row.get("last_intent"),
        first_contact: row.get("first_contact"),
        last_interaction: row.get("last_interaction"),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use leadflow_core::domain::lead::{FunnelStatus, LeadId};

    use crate::repositories::{LeadRepository, NewLead, SqlLeadRepository};
    use crate::{connect_with_settings, migrations};

    async fn repo() -> SqlLeadRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SqlLeadRepository::new(pool)
    }

    fn new_lead(phone: &str) -> NewLead {
        NewLead {
            id: LeadId(phone.to_owned()),
            display_name: "Maria Souza".to_owned(),
            email: None,
            source: "post_seminar".to_owned(),
        }
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let repo = repo().await;
        let created = repo.create_if_absent(new_lead("5547999990000"), Utc::now()).await.expect("create");
        assert_eq!(created.status, FunnelStatus::New);

        let mut second = new_lead("5547999990000");
        second.display_name = "Someone Else".to_owned();
        let existing = repo.create_if_absent(second, Utc::now()).await.expect("re-create");

        assert_eq!(existing.display_name, "Maria Souza", "existing lead is returned unchanged");
    }

    #[tokio::test]
    async fn status_and_email_updates_round_trip() {
        let repo = repo().await;
        let id = LeadId("5547999990001".to_owned());
        repo.create_if_absent(new_lead(&id.0), Utc::now()).await.expect("create");

        assert!(repo.update_status(&id, FunnelStatus::Interested, Utc::now()).await.expect("update"));
        assert!(repo.set_email(&id, "maria@exemplo.com.br", Utc::now()).await.expect("email"));

        let found = repo.find(&id).await.expect("find").expect("present");
        assert_eq!(found.status, FunnelStatus::Interested);
        assert_eq!(found.email.as_deref(), Some("maria@exemplo.com.br"));
    }

    #[tokio::test]
    async fn updates_on_unknown_lead_report_false() {
        let repo = repo().await;
        let id = LeadId("0000000000000".to_owned());
        assert!(!repo.update_status(&id, FunnelStatus::Lost, Utc::now()).await.expect("update"));
        assert!(!repo.set_email(&id, "x@y.zz", Utc::now()).await.expect("email"));
    }

    #[tokio::test]
    async fn stats_aggregate_the_funnel() {
        let repo = repo().await;
        for (index, status) in [
            FunnelStatus::New,
            FunnelStatus::Contacted,
            FunnelStatus::Qualified,
            FunnelStatus::Scheduled,
        ]
        .iter()
        .enumerate()
        {
            let id = LeadId(format!("55479999910{index:02}"));
            repo.create_if_absent(new_lead(&id.0), Utc::now()).await.expect("create");
            repo.update_status(&id, *status, Utc::now()).await.expect("status");
        }

        let stats = repo.conversion_stats().await.expect("stats");
        assert_eq!(stats.total_leads, 4);
        assert_eq!(stats.contacted, 3);
        assert_eq!(stats.qualified, 1);
        assert_eq!(stats.scheduled, 1);
        assert_eq!(stats.converted, 0);
        assert!((stats.contact_rate() - 75.0).abs() < f64::EPSILON);
    }
}
