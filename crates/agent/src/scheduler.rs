use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use leadflow_core::domain::booking::BookedMeeting;
use leadflow_core::domain::lead::Lead;
use leadflow_core::errors::ApplicationError;
use leadflow_core::scheduling::{BookingRequest, CalendarClient, CandidateSlot, Clock};
use leadflow_db::repositories::{BookingRepository, RepositoryError, SchedulingStateRepository};

#[derive(Clone, Debug, PartialEq)]
pub enum SelectionOutcome {
    Booked { slot: CandidateSlot, reference_id: String },
    AlreadyScheduled { slot: CandidateSlot },
    /// No (unexpired) snapshot: the offer went stale or was never made.
    SnapshotMissing,
    /// The prospect picked an ordinal past the offered list. User error,
    /// not a fault.
    OrdinalOutOfRange { offered: usize },
    /// The external booking call failed or was not confirmed. Recoverable:
    /// lead status is untouched and the caller asks the prospect to retry.
    BookingFailed,
}

/// Validates a slot selection against the persisted snapshot and drives the
/// external booking capability.
pub struct SchedulingCoordinator {
    sessions: Arc<dyn SchedulingStateRepository>,
    bookings: Arc<dyn BookingRepository>,
    calendar: Arc<dyn CalendarClient>,
    clock: Arc<dyn Clock>,
    call_timeout: Duration,
}

impl SchedulingCoordinator {
    pub fn new(
        sessions: Arc<dyn SchedulingStateRepository>,
        bookings: Arc<dyn BookingRepository>,
        calendar: Arc<dyn CalendarClient>,
        clock: Arc<dyn Clock>,
        call_timeout: Duration,
    ) -> Self {
        Self { sessions, bookings, calendar, clock, call_timeout }
    }

    pub async fn select_slot(
        &self,
        lead: &Lead,
        ordinal: u8,
    ) -> Result<SelectionOutcome, ApplicationError> {
        let now = self.clock.now_utc();

        let Some(snapshot) =
            self.sessions.get(&lead.id, now).await.map_err(persistence)?
        else {
            return Ok(SelectionOutcome::SnapshotMissing);
        };

        let Some(slot) = snapshot.slot(ordinal).cloned() else {
            return Ok(SelectionOutcome::OrdinalOutOfRange { offered: snapshot.len() });
        };

        // Re-submitting an already-booked slot must never create a second
        // meeting; the unique index backs this check up.
        if let Some(existing) = self
            .bookings
            .find_by_lead_and_start(&lead.id, slot.start)
            .await
            .map_err(persistence)?
        {
            info!(lead_id = %lead.id, reference_id = %existing.reference_id,
                "slot re-selected; meeting already booked");
            return Ok(SelectionOutcome::AlreadyScheduled { slot });
        }

        let request = BookingRequest {
            title: format!("Reunião Comercial - {}", lead.display_name),
            description: format!(
                "Reunião comercial com lead do seminário.\n\nLead: {}\nTelefone: {}",
                lead.display_name, lead.id
            ),
            start: slot.start,
            end: slot.end,
            attendee_email: lead.email.clone(),
        };

        let confirmation =
            match tokio::time::timeout(self.call_timeout, self.calendar.book(request)).await {
                Ok(Ok(confirmation)) => confirmation,
                Ok(Err(error)) => {
                    warn!(lead_id = %lead.id, error = %error, "booking call failed");
                    return Ok(SelectionOutcome::BookingFailed);
                }
                Err(_elapsed) => {
                    warn!(lead_id = %lead.id, "booking call timed out");
                    return Ok(SelectionOutcome::BookingFailed);
                }
            };

        self.bookings
            .save(BookedMeeting {
                reference_id: confirmation.event_id.clone(),
                lead_id: lead.id.clone(),
                title: format!("Reunião - {}", lead.display_name),
                start: slot.start,
                end: slot.end,
                attendee_email: lead.email.clone(),
                created_at: now,
            })
            .await
            .map_err(persistence)?;

        info!(lead_id = %lead.id, reference_id = %confirmation.event_id, slot = %slot.label,
            "meeting booked");
        Ok(SelectionOutcome::Booked { slot, reference_id: confirmation.event_id })
    }
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use tokio::sync::Mutex;

    use leadflow_core::domain::lead::{Lead, LeadId};
    use leadflow_core::scheduling::{
        BookingConfirmation, BookingRequest, BusyInterval, CalendarClient, CalendarError,
        CandidateSlot, Clock, DayRange, FixedClock, SlotSnapshot, SNAPSHOT_CAP,
    };
    use leadflow_db::repositories::{
        BookingRepository, InMemoryBookingRepository, InMemorySchedulingStateRepository,
        SchedulingStateRepository,
    };

    use super::{SchedulingCoordinator, SelectionOutcome};

    struct ScriptedCalendar {
        bookings: Mutex<Vec<Result<BookingConfirmation, CalendarError>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedCalendar {
        fn with_results(results: Vec<Result<BookingConfirmation, CalendarError>>) -> Self {
            Self { bookings: Mutex::new(results), calls: Mutex::new(0) }
        }

        async fn booking_calls(&self) -> usize {
            *self.calls.lock().await
        }
    }

    #[async_trait]
    impl CalendarClient for ScriptedCalendar {
        async fn busy_intervals(
            &self,
            _range: DayRange,
        ) -> Result<Vec<BusyInterval>, CalendarError> {
            Ok(Vec::new())
        }

        async fn book(
            &self,
            _request: BookingRequest,
        ) -> Result<BookingConfirmation, CalendarError> {
            *self.calls.lock().await += 1;
            self.bookings
                .lock()
                .await
                .pop()
                .unwrap_or(Err(CalendarError::Transport("exhausted".to_owned())))
        }
    }

    fn slots(count: usize) -> Vec<CandidateSlot> {
        let day = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        (0..count)
            .map(|i| {
                let start = day.and_hms_opt(9 + i as u32, 0, 0).unwrap();
                CandidateSlot {
                    start,
                    end: day.and_hms_opt(9 + i as u32, 30, 0).unwrap(),
                    duration_minutes: 30,
                    label: start.format("%d/%m/%Y às %H:%M").to_string(),
                }
            })
            .collect()
    }

    fn lead() -> Lead {
        Lead::new(LeadId("5547999990000".to_owned()), "Maria Souza", "post_seminar", Utc::now())
    }

    struct Fixture {
        coordinator: SchedulingCoordinator,
        sessions: Arc<InMemorySchedulingStateRepository>,
        bookings: Arc<InMemoryBookingRepository>,
        calendar: Arc<ScriptedCalendar>,
    }

    fn fixture(results: Vec<Result<BookingConfirmation, CalendarError>>) -> Fixture {
        let sessions = Arc::new(InMemorySchedulingStateRepository::default());
        let bookings = Arc::new(InMemoryBookingRepository::default());
        let calendar = Arc::new(ScriptedCalendar::with_results(results));
        let clock = Arc::new(FixedClock::at(
            NaiveDate::from_ymd_opt(2026, 8, 6).unwrap().and_hms_opt(12, 0, 0).unwrap(),
        ));
        let coordinator = SchedulingCoordinator::new(
            sessions.clone(),
            bookings.clone(),
            calendar.clone(),
            clock,
            Duration::from_secs(5),
        );
        Fixture { coordinator, sessions, bookings, calendar }
    }

    async fn store_snapshot(fixture: &Fixture, lead: &Lead, count: usize) {
        let snapshot = SlotSnapshot::capture(
            slots(count),
            SNAPSHOT_CAP,
            fixture.coordinator.clock.now_utc(),
            chrono::Duration::hours(4),
        );
        fixture.sessions.put(&lead.id, &snapshot).await.expect("put snapshot");
    }

    #[tokio::test]
    async fn booking_success_persists_exactly_one_meeting() {
        let fixture = fixture(vec![Ok(BookingConfirmation {
            event_id: "evt-1".to_owned(),
            meet_link: None,
        })]);
        let lead = lead();
        store_snapshot(&fixture, &lead, 5).await;

        let outcome = fixture.coordinator.select_slot(&lead, 3).await.expect("select");
        let SelectionOutcome::Booked { slot, reference_id } = outcome else {
            panic!("expected a booking, got {outcome:?}");
        };

        assert_eq!(reference_id, "evt-1");
        assert_eq!(slot.start, slots(5)[2].start, "ordinal 3 resolves to index 2");
        assert_eq!(fixture.bookings.count().await, 1);
    }

    #[tokio::test]
    async fn ordinal_past_the_snapshot_is_a_user_error() {
        let fixture = fixture(vec![]);
        let lead = lead();
        store_snapshot(&fixture, &lead, 5).await;

        let outcome = fixture.coordinator.select_slot(&lead, 6).await.expect("select");
        assert_eq!(outcome, SelectionOutcome::OrdinalOutOfRange { offered: 5 });
        assert_eq!(fixture.calendar.booking_calls().await, 0, "no external call is made");
    }

    #[tokio::test]
    async fn missing_snapshot_is_reported() {
        let fixture = fixture(vec![]);
        let outcome = fixture.coordinator.select_slot(&lead(), 1).await.expect("select");
        assert_eq!(outcome, SelectionOutcome::SnapshotMissing);
    }

    #[tokio::test]
    async fn reselecting_a_booked_slot_does_not_duplicate_the_meeting() {
        let fixture = fixture(vec![Ok(BookingConfirmation {
            event_id: "evt-1".to_owned(),
            meet_link: None,
        })]);
        let lead = lead();
        store_snapshot(&fixture, &lead, 5).await;

        let first = fixture.coordinator.select_slot(&lead, 2).await.expect("first select");
        assert!(matches!(first, SelectionOutcome::Booked { .. }));

        let second = fixture.coordinator.select_slot(&lead, 2).await.expect("second select");
        assert!(matches!(second, SelectionOutcome::AlreadyScheduled { .. }));

        assert_eq!(fixture.bookings.count().await, 1, "idempotent re-selection");
        assert_eq!(fixture.calendar.booking_calls().await, 1);
    }

    #[tokio::test]
    async fn booking_failure_is_recoverable() {
        let fixture =
            fixture(vec![Err(CalendarError::Transport("calendar 502".to_owned()))]);
        let lead = lead();
        store_snapshot(&fixture, &lead, 3).await;

        let outcome = fixture.coordinator.select_slot(&lead, 1).await.expect("select");
        assert_eq!(outcome, SelectionOutcome::BookingFailed);
        assert_eq!(fixture.bookings.count().await, 0);
    }
}
