use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tracing::{debug, error, info, warn};

use leadflow_channel::{ChoiceList, Notifier};
use leadflow_core::config::AppConfig;
use leadflow_core::domain::lead::{FunnelStatus, Lead, LeadId};
use leadflow_core::domain::turn::{ConversationTurn, TurnRole, TurnTag};
use leadflow_core::errors::ApplicationError;
use leadflow_core::intent::{has_code_prefix, FeedbackKind, Intent, InterestKind, MeetingPreference};
use leadflow_core::scheduling::{AvailabilityEngine, CalendarClient, Clock, DayRange, SlotSnapshot};
use leadflow_core::stage::StageClassifier;
use leadflow_core::IntentMapper;
use leadflow_db::repositories::{
    BookingRepository, LeadRepository, NewLead, RepositoryError, SchedulingStateRepository,
    TurnRepository,
};

use crate::knowledge::KnowledgeBase;
use crate::llm::LlmClient;
use crate::locks::LeadLocks;
use crate::replies;
use crate::scheduler::{SchedulingCoordinator, SelectionOutcome};

/// Tunables lifted from [`AppConfig`] so the orchestrator can be built
/// without a full config in tests.
#[derive(Clone, Debug)]
pub struct DialogueSettings {
    pub history_window: usize,
    pub campaign_source: String,
    pub llm_timeout: Duration,
    pub calendar_timeout: Duration,
    pub horizon_days: u32,
    pub meeting_duration_minutes: u32,
    pub snapshot_cap: usize,
    pub snapshot_ttl_minutes: u32,
}

impl Default for DialogueSettings {
    fn default() -> Self {
        Self {
            history_window: 6,
            campaign_source: "post_seminar".to_owned(),
            llm_timeout: Duration::from_secs(10),
            calendar_timeout: Duration::from_secs(15),
            horizon_days: 7,
            meeting_duration_minutes: 30,
            snapshot_cap: 5,
            snapshot_ttl_minutes: 240,
        }
    }
}

impl DialogueSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            history_window: config.dialogue.history_window,
            campaign_source: config.dialogue.campaign_source.clone(),
            llm_timeout: Duration::from_secs(config.llm.timeout_secs),
            calendar_timeout: Duration::from_secs(15),
            horizon_days: config.scheduling.horizon_days,
            meeting_duration_minutes: config.scheduling.meeting_duration_minutes,
            snapshot_cap: config.scheduling.snapshot_cap,
            snapshot_ttl_minutes: config.scheduling.snapshot_ttl_minutes,
        }
    }
}

/// Everything the orchestrator talks to, injected at construction so tests
/// substitute in-memory fakes.
pub struct Collaborators {
    pub leads: Arc<dyn LeadRepository>,
    pub turns: Arc<dyn TurnRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub sessions: Arc<dyn SchedulingStateRepository>,
    pub calendar: Arc<dyn CalendarClient>,
    pub notifier: Arc<dyn Notifier>,
    pub llm: Arc<dyn LlmClient>,
    pub clock: Arc<dyn Clock>,
}

/// Top-level dialogue driver: resolves each inbound message to an intent or
/// stage, emits the scripted or generated reply, and coordinates
/// scheduling. Holds no cross-request state beyond the per-lead locks.
pub struct DialogueOrchestrator {
    leads: Arc<dyn LeadRepository>,
    turns: Arc<dyn TurnRepository>,
    sessions: Arc<dyn SchedulingStateRepository>,
    calendar: Arc<dyn CalendarClient>,
    notifier: Arc<dyn Notifier>,
    llm: Arc<dyn LlmClient>,
    clock: Arc<dyn Clock>,
    coordinator: SchedulingCoordinator,
    availability: AvailabilityEngine,
    knowledge: KnowledgeBase,
    mapper: IntentMapper,
    classifier: StageClassifier,
    locks: LeadLocks,
    settings: DialogueSettings,
}

impl DialogueOrchestrator {
    pub fn new(
        collaborators: Collaborators,
        availability: AvailabilityEngine,
        knowledge: KnowledgeBase,
        settings: DialogueSettings,
    ) -> Self {
        let coordinator = SchedulingCoordinator::new(
            Arc::clone(&collaborators.sessions),
            Arc::clone(&collaborators.bookings),
            Arc::clone(&collaborators.calendar),
            Arc::clone(&collaborators.clock),
            settings.calendar_timeout,
        );

        Self {
            leads: collaborators.leads,
            turns: collaborators.turns,
            sessions: collaborators.sessions,
            calendar: collaborators.calendar,
            notifier: collaborators.notifier,
            llm: collaborators.llm,
            clock: collaborators.clock,
            coordinator,
            availability,
            knowledge,
            mapper: IntentMapper::new(),
            classifier: StageClassifier::new(),
            locks: LeadLocks::new(),
            settings,
        }
    }

    /// Handles one inbound message. `None` is the deliberate no-op for
    /// unusable input; every other path returns the reply that was sent.
    pub async fn handle_message(
        &self,
        lead_id: &LeadId,
        text: &str,
        display_name: &str,
    ) -> Option<String> {
        let raw = text.trim();
        if raw.is_empty() {
            debug!(lead_id = %lead_id, "ignoring empty inbound payload");
            return None;
        }

        let _guard = self.locks.acquire(&lead_id.0).await;
        match self.dispatch(lead_id, raw, display_name).await {
            Ok(reply) => Some(reply),
            Err(error) => Some(self.recover(lead_id, error).await),
        }
    }

    /// Handles a structured button/list selection delivered out of band.
    pub async fn handle_button(
        &self,
        lead_id: &LeadId,
        intent_code: &str,
        display_name: &str,
    ) -> Option<String> {
        let code = intent_code.trim();
        if code.is_empty() {
            return None;
        }

        let _guard = self.locks.acquire(&lead_id.0).await;
        let result = match Intent::from_code(code) {
            Some(intent) => self.handle_intent(lead_id, code, display_name, intent).await,
            None => {
                self.free_conversation(lead_id, &replies::free_selection_note(code), display_name)
                    .await
            }
        };

        match result {
            Ok(reply) => Some(reply),
            Err(error) => Some(self.recover(lead_id, error).await),
        }
    }

    /// Opens the funnel for a lead with the feedback question.
    pub async fn start_campaign(
        &self,
        lead_id: &LeadId,
        display_name: &str,
        topic: Option<&str>,
    ) -> bool {
        let _guard = self.locks.acquire(&lead_id.0).await;
        match self.try_start_campaign(lead_id, display_name, topic).await {
            Ok(started) => started,
            Err(error) => {
                error!(lead_id = %lead_id, error = %error, "campaign start failed");
                false
            }
        }
    }

    async fn try_start_campaign(
        &self,
        lead_id: &LeadId,
        display_name: &str,
        topic: Option<&str>,
    ) -> Result<bool, ApplicationError> {
        let lead = self.ensure_lead(lead_id, display_name).await?;
        let list = replies::feedback_question(&lead.display_name, topic);

        if let Err(send_error) = self.notifier.send_choice_list(&lead.id, &list).await {
            warn!(lead_id = %lead.id, error = %send_error, "campaign opening was not delivered");
            return Ok(false);
        }

        self.append_assistant_turn(&lead.id, &list.body, Some(TurnTag::FeedbackPrompt)).await?;
        self.apply_status(&lead, FunnelStatus::Contacted).await?;
        info!(lead_id = %lead.id, "campaign started");
        Ok(true)
    }

    async fn dispatch(
        &self,
        lead_id: &LeadId,
        raw: &str,
        display_name: &str,
    ) -> Result<String, ApplicationError> {
        // Structured codes straight from button payloads.
        if has_code_prefix(raw) {
            return match Intent::from_code(raw) {
                Some(intent) => self.handle_intent(lead_id, raw, display_name, intent).await,
                None => {
                    self.free_conversation(
                        lead_id,
                        &replies::free_selection_note(raw),
                        display_name,
                    )
                    .await
                }
            };
        }

        if let Some(intent) = self.mapper.map(raw) {
            info!(lead_id = %lead_id, intent = %intent.code(), "intent resolved from text");
            return self.handle_intent(lead_id, raw, display_name, intent).await;
        }

        self.free_conversation(lead_id, raw, display_name).await
    }

    async fn handle_intent(
        &self,
        lead_id: &LeadId,
        raw: &str,
        display_name: &str,
        intent: Intent,
    ) -> Result<String, ApplicationError> {
        let lead = self.ensure_lead(lead_id, display_name).await?;
        self.append_user_turn(&lead.id, raw, Some(TurnTag::Intent(intent.clone()))).await?;

        match intent {
            Intent::Feedback(kind) => self.handle_feedback(&lead, kind).await,
            Intent::Interest(kind) => self.handle_interest(&lead, kind).await,
            Intent::MeetingPreference(preference) => {
                self.handle_meeting_preference(&lead, preference).await
            }
            Intent::SlotSelection(ordinal) => self.handle_slot_selection(&lead, ordinal).await,
            Intent::EmailProvided(address) => self.handle_email(&lead, &address).await,
        }
    }

    async fn handle_feedback(
        &self,
        lead: &Lead,
        kind: FeedbackKind,
    ) -> Result<String, ApplicationError> {
        if kind == FeedbackKind::Negative {
            let reply = replies::negative_feedback_reply(lead.first_name());
            self.send_text_reply(lead, &reply).await?;
            return Ok(reply);
        }

        let list = replies::interest_offer(lead.first_name());
        self.send_choice_list_reply(lead, &list, None).await?;
        self.apply_status(lead, FunnelStatus::Interested).await?;
        Ok(list.body)
    }

    async fn handle_interest(
        &self,
        lead: &Lead,
        kind: InterestKind,
    ) -> Result<String, ApplicationError> {
        match kind {
            InterestKind::High | InterestKind::Medium => {
                let list = replies::meeting_proposal(lead.first_name());
                self.send_choice_list_reply(lead, &list, None).await?;
                self.apply_status(lead, FunnelStatus::Qualified).await?;
                Ok(list.body)
            }
            InterestKind::Future => {
                let reply = replies::future_interest_reply(lead.first_name());
                self.send_text_reply(lead, &reply).await?;
                self.apply_status(lead, FunnelStatus::FutureInterest).await?;
                Ok(reply)
            }
            InterestKind::None => {
                let reply = replies::no_interest_reply(lead.first_name());
                self.send_text_reply(lead, &reply).await?;
                self.apply_status(lead, FunnelStatus::Lost).await?;
                Ok(reply)
            }
        }
    }

    async fn handle_meeting_preference(
        &self,
        lead: &Lead,
        preference: MeetingPreference,
    ) -> Result<String, ApplicationError> {
        match preference {
            MeetingPreference::Accept => self.offer_available_slots(lead).await,
            MeetingPreference::Channel => {
                let reply = replies::channel_preference_reply(lead.first_name());
                self.send_text_reply(lead, &reply).await?;
                self.apply_status(lead, FunnelStatus::ChannelHandoff).await?;
                Ok(reply)
            }
            MeetingPreference::Email => {
                let reply = replies::email_request_reply();
                self.send_text_reply(lead, &reply).await?;
                self.apply_status(lead, FunnelStatus::AwaitingEmail).await?;
                Ok(reply)
            }
            MeetingPreference::NoTime => {
                let reply = replies::no_time_reply();
                self.send_text_reply(lead, &reply).await?;
                self.apply_status(lead, FunnelStatus::MeetingDeferred).await?;
                Ok(reply)
            }
        }
    }

    /// Fetches busy intervals, computes the free grid, freezes the offer
    /// as a snapshot, and sends the choice list. "No availability" and
    /// "calendar unreachable" take distinct scripted paths.
    async fn offer_available_slots(&self, lead: &Lead) -> Result<String, ApplicationError> {
        let today = self.clock.now_local().date();
        let Some(first_day) = today.succ_opt() else {
            return Err(ApplicationError::Integration("calendar horizon overflow".to_owned()));
        };
        let horizon = self.settings.horizon_days.max(1);
        let range = DayRange {
            from: first_day,
            to: first_day + ChronoDuration::days(i64::from(horizon) - 1),
        };

        let busy = match tokio::time::timeout(
            self.settings.calendar_timeout,
            self.calendar.busy_intervals(range),
        )
        .await
        {
            Ok(Ok(busy)) => busy,
            Ok(Err(calendar_error)) => {
                warn!(lead_id = %lead.id, error = %calendar_error, "busy-interval fetch failed");
                let reply = replies::availability_error_reply();
                self.send_text_reply(lead, &reply).await?;
                return Ok(reply);
            }
            Err(_elapsed) => {
                warn!(lead_id = %lead.id, "busy-interval fetch timed out");
                let reply = replies::availability_error_reply();
                self.send_text_reply(lead, &reply).await?;
                return Ok(reply);
            }
        };

        let slots = self.availability.free_slots(
            first_day,
            horizon,
            ChronoDuration::minutes(i64::from(self.settings.meeting_duration_minutes)),
            &busy,
        );

        if slots.is_empty() {
            let reply = replies::no_availability_reply(lead.first_name());
            self.send_text_reply(lead, &reply).await?;
            return Ok(reply);
        }

        let snapshot = SlotSnapshot::capture(
            slots,
            self.settings.snapshot_cap,
            self.clock.now_utc(),
            ChronoDuration::minutes(i64::from(self.settings.snapshot_ttl_minutes)),
        );
        let list = replies::slot_list(lead.first_name(), &snapshot.slots);

        let delivered =
            self.send_choice_list_reply(lead, &list, Some(TurnTag::SlotsOffered)).await?;
        if delivered {
            self.sessions.put(&lead.id, &snapshot).await.map_err(persistence)?;
            info!(lead_id = %lead.id, offered = snapshot.len(), "candidate slots offered");
        }

        Ok(list.body)
    }

    async fn handle_email(&self, lead: &Lead, address: &str) -> Result<String, ApplicationError> {
        self.leads.set_email(&lead.id, address, self.clock.now_utc()).await.map_err(persistence)?;
        let mut lead = lead.clone();
        lead.email = Some(address.to_owned());

        // The email may be the missing piece for a meeting the prospect
        // already accepted; in that case go straight to availability.
        let history = self.recent_history(&lead.id).await?;
        let meeting_accepted = history.iter().any(|turn| {
            turn.role == TurnRole::User
                && matches!(
                    turn.tag.as_ref().and_then(TurnTag::intent),
                    Some(Intent::MeetingPreference(MeetingPreference::Accept))
                )
        });
        if meeting_accepted {
            return self.offer_available_slots(&lead).await;
        }

        let reply = replies::email_received_reply(lead.first_name());
        self.send_text_reply(&lead, &reply).await?;
        Ok(reply)
    }

    async fn handle_slot_selection(
        &self,
        lead: &Lead,
        ordinal: u8,
    ) -> Result<String, ApplicationError> {
        let outcome = self.coordinator.select_slot(lead, ordinal).await?;

        let reply = match outcome {
            SelectionOutcome::Booked { slot, .. } => {
                self.apply_status(lead, FunnelStatus::Scheduled).await?;
                replies::booking_confirmed_reply(&slot.label)
            }
            SelectionOutcome::AlreadyScheduled { slot } => {
                replies::already_scheduled_reply(&slot.label)
            }
            SelectionOutcome::SnapshotMissing => replies::snapshot_missing_reply(),
            SelectionOutcome::OrdinalOutOfRange { offered } => {
                info!(lead_id = %lead.id, ordinal, offered, "slot ordinal out of range");
                replies::slot_unavailable_reply()
            }
            SelectionOutcome::BookingFailed => replies::booking_failed_reply(),
        };

        self.send_text_reply(lead, &reply).await?;
        Ok(reply)
    }

    async fn free_conversation(
        &self,
        lead_id: &LeadId,
        raw: &str,
        display_name: &str,
    ) -> Result<String, ApplicationError> {
        let lead = self.ensure_lead(lead_id, display_name).await?;
        self.append_user_turn(&lead.id, raw, None).await?;

        let history = self.recent_history(&lead.id).await?;
        let stage = self.classifier.classify(&history, raw);
        debug!(lead_id = %lead.id, stage = stage.as_str(), "conversation stage classified");

        let knowledge_context =
            self.knowledge.search_context(&format!("{raw} {}", stage.as_str()));
        let system =
            replies::system_context(stage, &lead.display_name, &knowledge_context, &history);

        let reply = match tokio::time::timeout(
            self.settings.llm_timeout,
            self.llm.generate_reply(&system, raw),
        )
        .await
        {
            Ok(Ok(text)) if !text.trim().is_empty() => text,
            Ok(Ok(_)) => {
                warn!(lead_id = %lead.id, "generative reply was empty; using scripted fallback");
                replies::fallback_for_stage(stage, lead.first_name())
            }
            Ok(Err(llm_error)) => {
                warn!(lead_id = %lead.id, error = %llm_error, "generative call failed; using scripted fallback");
                replies::fallback_for_stage(stage, lead.first_name())
            }
            Err(_elapsed) => {
                warn!(lead_id = %lead.id, "generative call timed out; using scripted fallback");
                replies::fallback_for_stage(stage, lead.first_name())
            }
        };

        self.send_text_reply(&lead, &reply).await?;
        Ok(reply)
    }

    async fn ensure_lead(
        &self,
        lead_id: &LeadId,
        display_name: &str,
    ) -> Result<Lead, ApplicationError> {
        self.leads
            .create_if_absent(
                NewLead {
                    id: lead_id.clone(),
                    display_name: display_name.to_owned(),
                    email: None,
                    source: self.settings.campaign_source.clone(),
                },
                self.clock.now_utc(),
            )
            .await
            .map_err(persistence)
    }

    async fn recent_history(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<ConversationTurn>, ApplicationError> {
        self.turns.recent(lead_id, self.settings.history_window).await.map_err(persistence)
    }

    async fn append_user_turn(
        &self,
        lead_id: &LeadId,
        text: &str,
        tag: Option<TurnTag>,
    ) -> Result<(), ApplicationError> {
        let mut turn = ConversationTurn::user(text, self.clock.now_utc());
        turn.tag = tag;
        self.turns.append(lead_id, turn).await.map_err(persistence)
    }

    async fn append_assistant_turn(
        &self,
        lead_id: &LeadId,
        text: &str,
        tag: Option<TurnTag>,
    ) -> Result<(), ApplicationError> {
        let mut turn = ConversationTurn::assistant(text, self.clock.now_utc());
        turn.tag = tag;
        self.turns.append(lead_id, turn).await.map_err(persistence)
    }

    /// Sends a text reply (best effort) and records it as an assistant
    /// turn. Transport failures are logged, never surfaced to the lead.
    async fn send_text_reply(&self, lead: &Lead, text: &str) -> Result<(), ApplicationError> {
        if let Err(send_error) = self.notifier.send_text(&lead.id, text).await {
            warn!(lead_id = %lead.id, error = %send_error, "outbound text was not delivered");
        }
        self.append_assistant_turn(&lead.id, text, None).await
    }

    /// Sends a choice list; the assistant turn is only recorded when the
    /// list was actually delivered. Returns whether it was.
    async fn send_choice_list_reply(
        &self,
        lead: &Lead,
        list: &ChoiceList,
        tag: Option<TurnTag>,
    ) -> Result<bool, ApplicationError> {
        match self.notifier.send_choice_list(&lead.id, list).await {
            Ok(()) => {
                self.append_assistant_turn(&lead.id, &list.body, tag).await?;
                Ok(true)
            }
            Err(send_error) => {
                warn!(lead_id = %lead.id, error = %send_error, "choice list was not delivered");
                Ok(false)
            }
        }
    }

    /// Regressive or lateral transitions are logged and ignored; the
    /// funnel only moves forward.
    async fn apply_status(
        &self,
        lead: &Lead,
        next: FunnelStatus,
    ) -> Result<(), ApplicationError> {
        let mut projected = lead.clone();
        match projected.advance_to(next) {
            Ok(()) => {
                if projected.status != lead.status {
                    self.leads
                        .update_status(&lead.id, next, self.clock.now_utc())
                        .await
                        .map_err(persistence)?;
                    info!(lead_id = %lead.id, from = lead.status.as_str(), to = next.as_str(),
                        "funnel status advanced");
                }
                Ok(())
            }
            Err(transition_error) => {
                warn!(lead_id = %lead.id, error = %transition_error,
                    "ignoring funnel transition");
                Ok(())
            }
        }
    }

    async fn recover(&self, lead_id: &LeadId, error: ApplicationError) -> String {
        error!(lead_id = %lead_id, error = %error, "message handling failed; scripted fallback");
        let fallback = replies::generic_fallback_reply();
        if let Err(send_error) = self.notifier.send_text(lead_id, &fallback).await {
            warn!(lead_id = %lead_id, error = %send_error, "fallback delivery failed");
        }
        fallback
    }
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}
