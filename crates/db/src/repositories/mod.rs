use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use leadflow_core::domain::booking::BookedMeeting;
use leadflow_core::domain::lead::{FunnelStatus, Lead, LeadId};
use leadflow_core::domain::turn::ConversationTurn;
use leadflow_core::scheduling::SlotSnapshot;

pub mod booking;
pub mod lead;
pub mod memory;
pub mod session;
pub mod turn;

pub use booking::SqlBookingRepository;
pub use lead::SqlLeadRepository;
pub use memory::{
    InMemoryBookingRepository, InMemoryLeadRepository, InMemorySchedulingStateRepository,
    InMemoryTurnRepository,
};
pub use session::SqlSchedulingStateRepository;
pub use turn::SqlTurnRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Clone, Debug)]
pub struct NewLead {
    pub id: LeadId,
    pub display_name: String,
    pub email: Option<String>,
    pub source: String,
}

/// Funnel totals for operator reporting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversionStats {
    pub total_leads: i64,
    pub contacted: i64,
    pub qualified: i64,
    pub scheduled: i64,
    pub converted: i64,
}

impl ConversionStats {
    pub fn contact_rate(&self) -> f64 {
        percentage(self.contacted, self.total_leads)
    }

    pub fn conversion_rate(&self) -> f64 {
        percentage(self.converted, self.total_leads)
    }
}

fn percentage(part: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Idempotent create: an existing lead with the same id is returned
    /// unchanged, never duplicated.
    async fn create_if_absent(
        &self,
        lead: NewLead,
        at: DateTime<Utc>,
    ) -> Result<Lead, RepositoryError>;

    async fn find(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError>;

    async fn update_status(
        &self,
        id: &LeadId,
        status: FunnelStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn set_email(
        &self,
        id: &LeadId,
        email: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn conversion_stats(&self) -> Result<ConversionStats, RepositoryError>;
}

#[async_trait]
pub trait TurnRepository: Send + Sync {
    /// Appends an immutable turn and refreshes the lead's last-interaction
    /// timestamp (and last-intent tag when present).
    async fn append(&self, id: &LeadId, turn: ConversationTurn) -> Result<(), RepositoryError>;

    /// The last `limit` turns in chronological order, materialized as plain
    /// owned values. A history that can only partially be decoded yields
    /// the prefix that succeeded.
    async fn recent(
        &self,
        id: &LeadId,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, RepositoryError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn save(&self, booking: BookedMeeting) -> Result<(), RepositoryError>;

    async fn find_by_lead_and_start(
        &self,
        id: &LeadId,
        start: NaiveDateTime,
    ) -> Result<Option<BookedMeeting>, RepositoryError>;

    async fn list_for_lead(&self, id: &LeadId) -> Result<Vec<BookedMeeting>, RepositoryError>;
}

/// Ephemeral per-lead scheduling context with explicit expiry. The offered
/// slot list lives here between the proposal message and the reply that
/// selects from it.
#[async_trait]
pub trait SchedulingStateRepository: Send + Sync {
    async fn put(&self, id: &LeadId, snapshot: &SlotSnapshot) -> Result<(), RepositoryError>;

    /// `None` when absent or expired at `now`.
    async fn get(
        &self,
        id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<Option<SlotSnapshot>, RepositoryError>;

    async fn clear(&self, id: &LeadId) -> Result<(), RepositoryError>;
}
