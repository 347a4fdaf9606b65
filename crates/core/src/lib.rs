pub mod config;
pub mod domain;
pub mod errors;
pub mod intent;
pub mod normalize;
pub mod scheduling;
pub mod stage;

pub use domain::booking::BookedMeeting;
pub use domain::lead::{FunnelStatus, Lead, LeadId};
pub use domain::turn::{ConversationTurn, TurnRole, TurnTag};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use intent::{
    email_address, FeedbackKind, Intent, IntentMapper, InterestKind, MeetingPreference,
};
pub use normalize::normalize;
pub use scheduling::{
    AvailabilityEngine, BookingConfirmation, BookingRequest, BusinessHours, BusyInterval,
    CalendarClient, CalendarError, CandidateSlot, Clock, DayRange, FixedClock, SlotSnapshot,
    SystemClock,
};
pub use stage::{Stage, StageClassifier};
