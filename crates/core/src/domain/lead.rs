use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Channel address of a prospect (phone digits). This is the identity key
/// for everything the engine persists.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub String);

impl std::fmt::Display for LeadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStatus {
    New,
    Contacted,
    Interested,
    Qualified,
    FutureInterest,
    Lost,
    ChannelHandoff,
    AwaitingEmail,
    MeetingDeferred,
    Scheduled,
    Converted,
}

impl FunnelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Interested => "interested",
            Self::Qualified => "qualified",
            Self::FutureInterest => "future_interest",
            Self::Lost => "lost",
            Self::ChannelHandoff => "channel_handoff",
            Self::AwaitingEmail => "awaiting_email",
            Self::MeetingDeferred => "meeting_deferred",
            Self::Scheduled => "scheduled",
            Self::Converted => "converted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::New),
            "contacted" => Some(Self::Contacted),
            "interested" => Some(Self::Interested),
            "qualified" => Some(Self::Qualified),
            "future_interest" => Some(Self::FutureInterest),
            "lost" => Some(Self::Lost),
            "channel_handoff" => Some(Self::ChannelHandoff),
            "awaiting_email" => Some(Self::AwaitingEmail),
            "meeting_deferred" => Some(Self::MeetingDeferred),
            "scheduled" => Some(Self::Scheduled),
            "converted" => Some(Self::Converted),
            _ => None,
        }
    }

    /// Funnel depth. Outcome statuses reached from qualification share a
    /// rank: moving between them would need a funnel restart, which is
    /// outside this engine.
    fn rank(&self) -> u8 {
        match self {
            Self::New => 0,
            Self::Contacted => 1,
            Self::Interested => 2,
            Self::Qualified => 3,
            Self::FutureInterest
            | Self::Lost
            | Self::ChannelHandoff
            | Self::AwaitingEmail
            | Self::MeetingDeferred => 4,
            Self::Scheduled => 5,
            Self::Converted => 6,
        }
    }

    pub fn can_advance_to(&self, next: FunnelStatus) -> bool {
        if next == Self::Converted {
            return *self == Self::Scheduled;
        }
        next.rank() > self.rank()
    }
}

/// A prospect tracked by channel address. Status only ever moves forward
/// through the funnel; regressions are rejected as domain errors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub display_name: String,
    pub email: Option<String>,
    pub source: String,
    pub status: FunnelStatus,
    pub last_intent: Option<String>,
    pub first_contact: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
}

impl Lead {
    pub fn new(id: LeadId, display_name: impl Into<String>, source: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            email: None,
            source: source.into(),
            status: FunnelStatus::New,
            last_intent: None,
            first_contact: at,
            last_interaction: at,
        }
    }

    pub fn first_name(&self) -> &str {
        self.display_name.split_whitespace().next().unwrap_or("Você")
    }

    /// Re-asserting the current status is a no-op; regressions and lateral
    /// moves between outcome statuses are rejected.
    pub fn advance_to(&mut self, next: FunnelStatus) -> Result<(), DomainError> {
        if self.status == next {
            return Ok(());
        }
        if self.status.can_advance_to(next) {
            self.status = next;
            return Ok(());
        }
        Err(DomainError::InvalidStatusTransition { from: self.status, to: next })
    }
}
