//! End-to-end dialogue scenarios against in-memory collaborators.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use leadflow_agent::llm::{LlmClient, LlmError};
use leadflow_agent::{Collaborators, DialogueOrchestrator, DialogueSettings, DisabledLlm, KnowledgeBase};
use leadflow_channel::{ChoiceList, Notifier, NotifyError};
use leadflow_core::domain::lead::{FunnelStatus, LeadId};
use leadflow_core::scheduling::{
    AvailabilityEngine, BookingConfirmation, BookingRequest, BusyInterval, CalendarClient,
    CalendarError, Clock, DayRange, FixedClock,
};
use leadflow_db::repositories::{
    BookingRepository, InMemoryBookingRepository, InMemoryLeadRepository,
    InMemorySchedulingStateRepository, InMemoryTurnRepository, LeadRepository,
    SchedulingStateRepository,
};

#[derive(Default)]
struct RecordingNotifier {
    texts: Mutex<Vec<(String, String)>>,
    lists: Mutex<Vec<(String, ChoiceList)>>,
}

impl RecordingNotifier {
    async fn sent_texts(&self) -> Vec<String> {
        self.texts.lock().await.iter().map(|(_, text)| text.clone()).collect()
    }

    async fn sent_lists(&self) -> Vec<ChoiceList> {
        self.lists.lock().await.iter().map(|(_, list)| list.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, to: &LeadId, text: &str) -> Result<(), NotifyError> {
        self.texts.lock().await.push((to.0.clone(), text.to_owned()));
        Ok(())
    }

    async fn send_choice_list(&self, to: &LeadId, list: &ChoiceList) -> Result<(), NotifyError> {
        self.lists.lock().await.push((to.0.clone(), list.clone()));
        Ok(())
    }
}

struct ScriptedCalendar {
    busy: Mutex<VecDeque<Result<Vec<BusyInterval>, CalendarError>>>,
    bookings: Mutex<VecDeque<Result<BookingConfirmation, CalendarError>>>,
    booking_calls: Mutex<usize>,
}

impl ScriptedCalendar {
    fn accommodating() -> Self {
        Self {
            busy: Mutex::new(VecDeque::new()),
            bookings: Mutex::new(VecDeque::new()),
            booking_calls: Mutex::new(0),
        }
    }

    async fn push_busy(&self, result: Result<Vec<BusyInterval>, CalendarError>) {
        self.busy.lock().await.push_back(result);
    }

    async fn push_booking(&self, result: Result<BookingConfirmation, CalendarError>) {
        self.bookings.lock().await.push_back(result);
    }

    async fn booking_calls(&self) -> usize {
        *self.booking_calls.lock().await
    }
}

#[async_trait]
impl CalendarClient for ScriptedCalendar {
    async fn busy_intervals(&self, _range: DayRange) -> Result<Vec<BusyInterval>, CalendarError> {
        self.busy.lock().await.pop_front().unwrap_or(Ok(Vec::new()))
    }

    async fn book(&self, _request: BookingRequest) -> Result<BookingConfirmation, CalendarError> {
        let mut calls = self.booking_calls.lock().await;
        *calls += 1;
        let ordinal = *calls;
        self.bookings.lock().await.pop_front().unwrap_or(Ok(BookingConfirmation {
            event_id: format!("evt-{ordinal}"),
            meet_link: None,
        }))
    }
}

struct SlowLlm {
    delay: Duration,
}

#[async_trait]
impl LlmClient for SlowLlm {
    async fn generate_reply(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        tokio::time::sleep(self.delay).await;
        Ok("resposta que chegou tarde demais".to_owned())
    }
}

struct World {
    orchestrator: DialogueOrchestrator,
    leads: Arc<InMemoryLeadRepository>,
    bookings: Arc<InMemoryBookingRepository>,
    sessions: Arc<InMemorySchedulingStateRepository>,
    notifier: Arc<RecordingNotifier>,
    calendar: Arc<ScriptedCalendar>,
    clock: Arc<FixedClock>,
}

fn world_with(llm: Arc<dyn LlmClient>, settings: DialogueSettings) -> World {
    let leads = Arc::new(InMemoryLeadRepository::default());
    let turns = Arc::new(InMemoryTurnRepository::default());
    let bookings = Arc::new(InMemoryBookingRepository::default());
    let sessions = Arc::new(InMemorySchedulingStateRepository::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let calendar = Arc::new(ScriptedCalendar::accommodating());

    // Thursday noon: "tomorrow" (Friday 2026-08-07) is a business day.
    let clock = Arc::new(FixedClock::at(
        NaiveDate::from_ymd_opt(2026, 8, 6).unwrap().and_hms_opt(12, 0, 0).unwrap(),
    ));

    let orchestrator = DialogueOrchestrator::new(
        Collaborators {
            leads: leads.clone(),
            turns: turns.clone(),
            bookings: bookings.clone(),
            sessions: sessions.clone(),
            calendar: calendar.clone(),
            notifier: notifier.clone(),
            llm,
            clock: clock.clone(),
        },
        AvailabilityEngine::default(),
        KnowledgeBase::from_content("## SEMINARIOS\nData: em breve\n"),
        settings,
    );

    World { orchestrator, leads, bookings, sessions, notifier, calendar, clock }
}

fn world() -> World {
    world_with(Arc::new(DisabledLlm), DialogueSettings::default())
}

fn lead_id() -> LeadId {
    LeadId("5547999990000".to_owned())
}

async fn status_of(world: &World, id: &LeadId) -> FunnelStatus {
    world.leads.find(id).await.expect("find").expect("lead exists").status
}

#[tokio::test]
async fn positive_feedback_on_first_contact_offers_interest_and_marks_interested() {
    let world = world();
    let id = lead_id();

    let reply = world.orchestrator.handle_message(&id, "Gostei muito!!", "Maria Souza").await;

    let reply = reply.expect("a reply is produced");
    assert!(reply.contains("desconto"), "reply should pitch the discount: {reply}");

    let lists = world.notifier.sent_lists().await;
    assert_eq!(lists.len(), 1);
    assert_eq!(
        lists[0].row_ids(),
        vec!["interest_high", "interest_medium", "interest_future", "no_interest"]
    );

    assert_eq!(status_of(&world, &id).await, FunnelStatus::Interested);
}

#[tokio::test]
async fn accepting_a_meeting_offers_snapshotted_slots() {
    let world = world();
    let id = lead_id();

    world.orchestrator.handle_button(&id, "accept_meeting", "Maria Souza").await;

    let lists = world.notifier.sent_lists().await;
    assert_eq!(lists.len(), 1);
    let row_ids = lists[0].row_ids();
    assert_eq!(row_ids.len(), 5, "the offer is capped at the snapshot size");
    assert_eq!(row_ids[0], "slot_1");

    let snapshot = world
        .sessions
        .get(&id, world.clock.now_utc())
        .await
        .expect("session read")
        .expect("snapshot persisted");
    assert_eq!(snapshot.len(), 5);
}

#[tokio::test]
async fn email_after_meeting_acceptance_diverts_to_the_slot_offer() {
    let world = world();
    let id = lead_id();

    // First availability attempt fails: the acceptance marker is recorded
    // but no slots could be offered yet.
    world.calendar.push_busy(Err(CalendarError::Transport("calendar 502".to_owned()))).await;
    world.orchestrator.handle_button(&id, "accept_meeting", "Maria Souza").await;
    assert!(world.notifier.sent_lists().await.is_empty());

    let reply = world.orchestrator.handle_message(&id, "joao@example.com", "Maria Souza").await;
    assert!(reply.is_some());

    let lists = world.notifier.sent_lists().await;
    assert_eq!(lists.len(), 1, "the provided email unblocks the slot offer");
    assert_eq!(lists[0].row_ids()[0], "slot_1");

    let lead = world.leads.find(&id).await.expect("find").expect("lead");
    assert_eq!(lead.email.as_deref(), Some("joao@example.com"));

    let snapshot = world.sessions.get(&id, world.clock.now_utc()).await.expect("read");
    assert!(snapshot.is_some(), "candidate slots are snapshotted");
}

#[tokio::test]
async fn bare_ordinal_after_snapshot_books_the_meeting() {
    let world = world();
    let id = lead_id();

    world.orchestrator.handle_button(&id, "accept_meeting", "Maria Souza").await;
    let reply = world.orchestrator.handle_message(&id, "3", "Maria Souza").await.expect("reply");

    assert!(reply.contains("Agendado para"), "confirmation names the slot: {reply}");
    assert_eq!(world.bookings.count().await, 1, "exactly one meeting row exists");
    assert_eq!(status_of(&world, &id).await, FunnelStatus::Scheduled);

    let snapshot = world
        .sessions
        .get(&id, world.clock.now_utc())
        .await
        .expect("read")
        .expect("snapshot");
    let booked = world
        .bookings
        .find_by_lead_and_start(&id, snapshot.slot(3).expect("slot 3").start)
        .await
        .expect("lookup");
    assert!(booked.is_some(), "ordinal 3 resolved against the snapshot");
}

#[tokio::test]
async fn ordinal_beyond_the_snapshot_is_a_corrective_reply_not_a_fault() {
    let world = world();
    let id = lead_id();

    world.orchestrator.handle_button(&id, "accept_meeting", "Maria Souza").await;
    let reply = world.orchestrator.handle_message(&id, "6", "Maria Souza").await.expect("reply");

    assert!(reply.contains("não está mais disponível"), "corrective copy: {reply}");
    assert_eq!(world.bookings.count().await, 0);
    assert_eq!(world.calendar.booking_calls().await, 0);
    assert_ne!(status_of(&world, &id).await, FunnelStatus::Scheduled);
}

#[tokio::test]
async fn reselecting_a_booked_ordinal_does_not_duplicate_the_meeting() {
    let world = world();
    let id = lead_id();

    world.orchestrator.handle_button(&id, "accept_meeting", "Maria Souza").await;
    world.orchestrator.handle_message(&id, "2", "Maria Souza").await.expect("first booking");

    let reply = world.orchestrator.handle_message(&id, "2", "Maria Souza").await.expect("reply");
    assert!(reply.contains("já está garantido"), "idempotent copy: {reply}");
    assert_eq!(world.bookings.count().await, 1);
    assert_eq!(world.calendar.booking_calls().await, 1);
}

#[tokio::test]
async fn booking_failure_leaves_status_unchanged_and_asks_to_retry() {
    let world = world();
    let id = lead_id();

    world.orchestrator.handle_button(&id, "accept_meeting", "Maria Souza").await;
    let before = status_of(&world, &id).await;

    world.calendar.push_booking(Err(CalendarError::Transport("calendar 503".to_owned()))).await;
    let reply = world.orchestrator.handle_message(&id, "1", "Maria Souza").await.expect("reply");

    assert!(reply.contains("probleminha para agendar"), "retry copy: {reply}");
    assert_eq!(world.bookings.count().await, 0);
    assert_eq!(status_of(&world, &id).await, before);
}

#[tokio::test]
async fn slot_selection_without_a_snapshot_reoffers_verification() {
    let world = world();
    let id = lead_id();

    let reply = world.orchestrator.handle_message(&id, "2", "Maria Souza").await.expect("reply");
    assert!(reply.contains("verificar os horários"), "stale-offer copy: {reply}");
    assert_eq!(world.bookings.count().await, 0);
}

#[tokio::test]
async fn fully_busy_horizon_degrades_to_the_no_availability_script() {
    let world = world();
    let id = lead_id();

    // Every business day of the horizon is blocked end to end.
    let mut busy = Vec::new();
    for offset in 0..14 {
        let day = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap() + chrono::Duration::days(offset);
        busy.push(BusyInterval {
            start: day.and_hms_opt(0, 0, 0).unwrap(),
            end: day.and_hms_opt(23, 59, 59).unwrap(),
        });
    }
    world.calendar.push_busy(Ok(busy)).await;

    let reply =
        world.orchestrator.handle_button(&id, "accept_meeting", "Maria Souza").await.expect("reply");

    assert!(reply.contains("verificar nossa agenda"), "no-availability copy: {reply}");
    assert!(world.notifier.sent_lists().await.is_empty());
    assert!(world.sessions.get(&id, world.clock.now_utc()).await.expect("read").is_none());
}

#[tokio::test]
async fn campaign_start_sends_feedback_prompt_and_advances_to_contacted() {
    let world = world();
    let id = lead_id();

    let started =
        world.orchestrator.start_campaign(&id, "Maria Souza", Some("Direitos Humanos")).await;
    assert!(started);

    let lists = world.notifier.sent_lists().await;
    assert_eq!(lists.len(), 1);
    assert!(lists[0].row_ids().contains(&"feedback_positive"));
    assert_eq!(status_of(&world, &id).await, FunnelStatus::Contacted);

    // A follow-up question lands in the unanswered-feedback-prompt stage,
    // whose scripted fallback pitches the discount.
    let reply =
        world.orchestrator.handle_message(&id, "tem gravação do evento?", "Maria Souza").await;
    assert_eq!(
        reply.as_deref(),
        Some("Perfeito! Quer que eu te mostre as opções com desconto?")
    );
}

#[tokio::test]
async fn generative_timeout_degrades_to_the_stage_script() {
    let mut settings = DialogueSettings::default();
    settings.llm_timeout = Duration::from_millis(50);
    let world = world_with(Arc::new(SlowLlm { delay: Duration::from_secs(5) }), settings);
    let id = lead_id();

    let reply = world
        .orchestrator
        .handle_message(&id, "qual o valor da mensalidade?", "Maria Souza")
        .await
        .expect("reply");

    assert_eq!(reply, "Entendi. Posso te passar as opções e garantir um descontinho?");
    let texts = world.notifier.sent_texts().await;
    assert_eq!(texts, vec![reply]);
}

#[tokio::test]
async fn negative_feedback_gets_the_alternative_script_without_status_change() {
    let world = world();
    let id = lead_id();

    let reply = world
        .orchestrator
        .handle_message(&id, "NÃO GOSTEI 😠", "Maria Souza")
        .await
        .expect("reply");

    assert!(reply.contains("material resumido"), "alternative copy: {reply}");
    assert_eq!(status_of(&world, &id).await, FunnelStatus::New);
    assert!(world.notifier.sent_lists().await.is_empty());
}

#[tokio::test]
async fn empty_inbound_payloads_are_deliberate_noops() {
    let world = world();
    let id = lead_id();

    assert_eq!(world.orchestrator.handle_message(&id, "   ", "Maria Souza").await, None);
    assert!(world.notifier.sent_texts().await.is_empty());
    assert!(world.leads.find(&id).await.expect("find").is_none(), "no lead is created");
}

#[tokio::test]
async fn unknown_button_codes_route_to_free_conversation() {
    let world = world();
    let id = lead_id();

    let reply = world
        .orchestrator
        .handle_button(&id, "prefer_carrier_pigeon", "Maria Souza")
        .await
        .expect("reply");

    // LLM is disabled, so the free-conversation stage script answers.
    assert_eq!(reply, "Entendi. Posso te passar as opções e garantir um descontinho?");
}

#[tokio::test]
async fn interest_future_and_none_settle_the_funnel() {
    let world = world();
    let first = LeadId("5547999990001".to_owned());
    world.orchestrator.handle_button(&first, "interest_future", "Ana Lima").await;
    assert_eq!(status_of(&world, &first).await, FunnelStatus::FutureInterest);

    let second = LeadId("5547999990002".to_owned());
    world.orchestrator.handle_button(&second, "no_interest", "João Reis").await;
    assert_eq!(status_of(&world, &second).await, FunnelStatus::Lost);
}

#[tokio::test]
async fn qualified_lead_is_not_regressed_by_a_late_feedback_tap() {
    let world = world();
    let id = lead_id();

    world.orchestrator.handle_button(&id, "interest_high", "Maria Souza").await;
    assert_eq!(status_of(&world, &id).await, FunnelStatus::Qualified);

    // A stale feedback button press must not pull the lead backwards.
    world.orchestrator.handle_button(&id, "feedback_positive", "Maria Souza").await;
    assert_eq!(status_of(&world, &id).await, FunnelStatus::Qualified);
}
