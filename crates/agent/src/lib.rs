//! Dialogue orchestration for the lead-conversion agent: intent dispatch,
//! stage-driven replies, availability offers, and meeting booking, with
//! every external capability injected behind a trait.

pub mod calendar_http;
pub mod knowledge;
pub mod llm;
pub mod locks;
pub mod orchestrator;
pub mod replies;
pub mod scheduler;

pub use calendar_http::HttpCalendarClient;
pub use knowledge::KnowledgeBase;
pub use llm::{DisabledLlm, HttpLlmClient, LlmClient, LlmError};
pub use locks::LeadLocks;
pub use orchestrator::{Collaborators, DialogueOrchestrator, DialogueSettings};
pub use scheduler::{SchedulingCoordinator, SelectionOutcome};
