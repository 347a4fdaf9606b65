use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intent::Intent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Structured metadata on a turn. Markers live here, never as sentinel
/// strings inside the message body, so nothing internal can leak into a
/// rendered transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TurnTag {
    Intent(Intent),
    /// The feedback-elicitation question was delivered to the prospect.
    FeedbackPrompt,
    /// A candidate-slot choice list was delivered to the prospect.
    SlotsOffered,
}

impl TurnTag {
    pub fn code(&self) -> String {
        match self {
            Self::Intent(intent) => intent.code(),
            Self::FeedbackPrompt => "feedback_prompt".to_owned(),
            Self::SlotsOffered => "slots_offered".to_owned(),
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "feedback_prompt" => Some(Self::FeedbackPrompt),
            "slots_offered" => Some(Self::SlotsOffered),
            other => Intent::from_code(other).map(Self::Intent),
        }
    }

    pub fn intent(&self) -> Option<&Intent> {
        match self {
            Self::Intent(intent) => Some(intent),
            _ => None,
        }
    }
}

/// One immutable message in a lead's conversation. Ownership: a lead owns
/// its ordered sequence of turns; insertion order is significant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub text: String,
    pub tag: Option<TurnTag>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self { role: TurnRole::User, text: text.into(), tag: None, timestamp: at }
    }

    pub fn assistant(text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self { role: TurnRole::Assistant, text: text.into(), tag: None, timestamp: at }
    }

    pub fn tagged(mut self, tag: TurnTag) -> Self {
        self.tag = Some(tag);
        self
    }
}
