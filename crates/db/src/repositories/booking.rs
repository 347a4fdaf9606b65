use chrono::NaiveDateTime;
use sqlx::{sqlite::SqliteRow, Row};

use leadflow_core::domain::booking::BookedMeeting;
use leadflow_core::domain::lead::LeadId;

use super::{BookingRepository, RepositoryError};
use crate::DbPool;

pub struct SqlBookingRepository {
    pool: DbPool,
}

impl SqlBookingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BookingRepository for SqlBookingRepository {
    async fn save(&self, booking: BookedMeeting) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO booked_meetings
                (lead_phone, reference_id, title, start_time, end_time, attendee_email, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&booking.lead_id.0)
        .bind(&booking.reference_id)
        .bind(&booking.title)
        .bind(booking.start)
        .bind(booking.end)
        .bind(&booking.attendee_email)
        .bind(booking.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_lead_and_start(
        &self,
        id: &LeadId,
        start: NaiveDateTime,
    ) -> Result<Option<BookedMeeting>, RepositoryError> {
        let row = sqlx::query(
            "SELECT lead_phone, reference_id, title, start_time, end_time, attendee_email, created_at
             FROM booked_meetings
             WHERE lead_phone = ? AND start_time = ?",
        )
        .bind(&id.0)
        .bind(start)
        .fetch_optional(&self.pool)
        .await?;

        row.map(booking_from_row).transpose()
    }

    async fn list_for_lead(&self, id: &LeadId) -> Result<Vec<BookedMeeting>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT lead_phone, reference_id, title, start_time, end_time, attendee_email, created_at
             FROM booked_meetings
             WHERE lead_phone = ?
             ORDER BY start_time ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(booking_from_row).collect()
    }
}

fn booking_from_row(row: SqliteRow) -> Result<BookedMeeting, RepositoryError> {
    Ok(BookedMeeting {
        reference_id: row.get("reference_id"),
        lead_id: LeadId(row.get("lead_phone")),
        title: row.get("title"),
        start: row.get("start_time"),
        end: row.get("end_time"),
        attendee_email: row.get("attendee_email"),
        created_at: row.get("created_at"),
    })
}
