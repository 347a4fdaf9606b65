use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::sync::RwLock;

use leadflow_core::domain::booking::BookedMeeting;
use leadflow_core::domain::lead::{FunnelStatus, Lead, LeadId};
use leadflow_core::domain::turn::{ConversationTurn, TurnTag};
use leadflow_core::scheduling::SlotSnapshot;

use super::{
    BookingRepository, ConversionStats, LeadRepository, NewLead, RepositoryError,
    SchedulingStateRepository, TurnRepository,
};

#[derive(Default)]
pub struct InMemoryLeadRepository {
    leads: RwLock<HashMap<String, Lead>>,
}

#[async_trait::async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn create_if_absent(
        &self,
        lead: NewLead,
        at: DateTime<Utc>,
    ) -> Result<Lead, RepositoryError> {
        let mut leads = self.leads.write().await;
        let entry = leads.entry(lead.id.0.clone()).or_insert_with(|| {
            let mut created = Lead::new(lead.id.clone(), lead.display_name, lead.source, at);
            created.email = lead.email;
            created
        });
        Ok(entry.clone())
    }

    async fn find(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let leads = self.leads.read().await;
        Ok(leads.get(&id.0).cloned())
    }

    async fn update_status(
        &self,
        id: &LeadId,
        status: FunnelStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut leads = self.leads.write().await;
        Ok(leads
            .get_mut(&id.0)
            .map(|lead| {
                lead.status = status;
                lead.last_interaction = at;
            })
            .is_some())
    }

    async fn set_email(
        &self,
        id: &LeadId,
        email: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut leads = self.leads.write().await;
        Ok(leads
            .get_mut(&id.0)
            .map(|lead| {
                lead.email = Some(email.to_owned());
                lead.last_interaction = at;
            })
            .is_some())
    }

    async fn conversion_stats(&self) -> Result<ConversionStats, RepositoryError> {
        let leads = self.leads.read().await;
        let mut stats = ConversionStats { total_leads: leads.len() as i64, ..Default::default() };
        for lead in leads.values() {
            if lead.status != FunnelStatus::New {
                stats.contacted += 1;
            }
            match lead.status {
                FunnelStatus::Qualified => stats.qualified += 1,
                FunnelStatus::Scheduled => stats.scheduled += 1,
                FunnelStatus::Converted => stats.converted += 1,
                _ => {}
            }
        }
        Ok(stats)
    }
}

#[derive(Default)]
pub struct InMemoryTurnRepository {
    turns: RwLock<HashMap<String, Vec<ConversationTurn>>>,
}

impl InMemoryTurnRepository {
    pub async fn all(&self, id: &LeadId) -> Vec<ConversationTurn> {
        self.turns.read().await.get(&id.0).cloned().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl TurnRepository for InMemoryTurnRepository {
    async fn append(&self, id: &LeadId, turn: ConversationTurn) -> Result<(), RepositoryError> {
        let mut turns = self.turns.write().await;
        turns.entry(id.0.clone()).or_default().push(turn);
        Ok(())
    }

    async fn recent(
        &self,
        id: &LeadId,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let turns = self.turns.read().await;
        let all = turns.get(&id.0).cloned().unwrap_or_default();
        let skip = all.len().saturating_sub(limit);
        Ok(all.into_iter().skip(skip).collect())
    }
}

#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: RwLock<Vec<BookedMeeting>>,
}

impl InMemoryBookingRepository {
    pub async fn count(&self) -> usize {
        self.bookings.read().await.len()
    }
}

#[async_trait::async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn save(&self, booking: BookedMeeting) -> Result<(), RepositoryError> {
        let mut bookings = self.bookings.write().await;
        let duplicate = bookings
            .iter()
            .any(|existing| existing.lead_id == booking.lead_id && existing.start == booking.start);
        if duplicate {
            return Err(RepositoryError::Decode(
                "UNIQUE constraint violated: booking already exists for this start time".to_owned(),
            ));
        }
        bookings.push(booking);
        Ok(())
    }

    async fn find_by_lead_and_start(
        &self,
        id: &LeadId,
        start: NaiveDateTime,
    ) -> Result<Option<BookedMeeting>, RepositoryError> {
        let bookings = self.bookings.read().await;
        Ok(bookings
            .iter()
            .find(|booking| booking.lead_id == *id && booking.start == start)
            .cloned())
    }

    async fn list_for_lead(&self, id: &LeadId) -> Result<Vec<BookedMeeting>, RepositoryError> {
        let bookings = self.bookings.read().await;
        let mut matching: Vec<BookedMeeting> =
            bookings.iter().filter(|booking| booking.lead_id == *id).cloned().collect();
        matching.sort_by_key(|booking| booking.start);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemorySchedulingStateRepository {
    snapshots: RwLock<HashMap<String, SlotSnapshot>>,
}

#[async_trait::async_trait]
impl SchedulingStateRepository for InMemorySchedulingStateRepository {
    async fn put(&self, id: &LeadId, snapshot: &SlotSnapshot) -> Result<(), RepositoryError> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(id.0.clone(), snapshot.clone());
        Ok(())
    }

    async fn get(
        &self,
        id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<Option<SlotSnapshot>, RepositoryError> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(&id.0).filter(|snapshot| !snapshot.is_expired(now)).cloned())
    }

    async fn clear(&self, id: &LeadId) -> Result<(), RepositoryError> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.remove(&id.0);
        Ok(())
    }
}
