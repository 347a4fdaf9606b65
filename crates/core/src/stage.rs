use serde::{Deserialize, Serialize};

use crate::domain::turn::{ConversationTurn, TurnRole, TurnTag};
use crate::intent::{email_address, Intent, MeetingPreference};

/// Funnel position inferred from recent conversation history. Drives which
/// scripted reply or generation context is used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initial,
    PostFeedbackPrompt,
    PostFeedback,
    PostInterest,
    PostMeetingPref,
    PostMeetingAccept,
    EmailProvided,
    PostEmail,
    FreeConversation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::PostFeedbackPrompt => "post_feedback_prompt",
            Self::PostFeedback => "post_feedback",
            Self::PostInterest => "post_interest",
            Self::PostMeetingPref => "post_meeting_pref",
            Self::PostMeetingAccept => "post_meeting_accept",
            Self::EmailProvided => "email_provided",
            Self::PostEmail => "post_email",
            Self::FreeConversation => "free_conversation",
        }
    }
}

/// Deterministic stage inference over a bounded history window. Rules are
/// priority-ordered; the first matching rule wins.
#[derive(Clone, Debug, Default)]
pub struct StageClassifier;

impl StageClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, history: &[ConversationTurn], current_text: &str) -> Stage {
        if history.is_empty() {
            return Stage::Initial;
        }

        if email_address(current_text).is_some() {
            return Stage::EmailProvided;
        }

        if self.feedback_prompt_unanswered(history) {
            return Stage::PostFeedbackPrompt;
        }

        for turn in history.iter().rev() {
            if turn.role != TurnRole::User {
                continue;
            }
            let Some(intent) = turn.tag.as_ref().and_then(TurnTag::intent) else {
                continue;
            };
            match intent {
                Intent::EmailProvided(_) => return Stage::PostEmail,
                Intent::MeetingPreference(MeetingPreference::Accept) => {
                    return Stage::PostMeetingAccept;
                }
                Intent::MeetingPreference(_) => return Stage::PostMeetingPref,
                Intent::Interest(_) => return Stage::PostInterest,
                Intent::Feedback(_) => return Stage::PostFeedback,
                Intent::SlotSelection(_) => continue,
            }
        }

        Stage::FreeConversation
    }

    /// The feedback question went out and no user turn after it carries a
    /// feedback tag.
    fn feedback_prompt_unanswered(&self, history: &[ConversationTurn]) -> bool {
        let Some(prompt_index) = history.iter().rposition(|turn| {
            turn.role == TurnRole::Assistant && matches!(turn.tag, Some(TurnTag::FeedbackPrompt))
        }) else {
            return false;
        };

        !history[prompt_index + 1..].iter().any(|turn| {
            turn.role == TurnRole::User
                && turn.tag.as_ref().and_then(TurnTag::intent).is_some_and(Intent::is_feedback)
        })
    }
}
