use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::normalize::normalize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Positive,
    Good,
    Neutral,
    Negative,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestKind {
    High,
    Medium,
    Future,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingPreference {
    Accept,
    Channel,
    Email,
    NoTime,
}

/// Canonical classification of what an inbound message means for the funnel.
///
/// Every variant has a stable wire code so intents survive round-trips
/// through button payloads and persisted turn tags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    Feedback(FeedbackKind),
    Interest(InterestKind),
    MeetingPreference(MeetingPreference),
    /// 1-based ordinal into the most recently offered slot snapshot.
    SlotSelection(u8),
    EmailProvided(String),
}

impl Intent {
    pub fn code(&self) -> String {
        match self {
            Self::Feedback(FeedbackKind::Positive) => "feedback_positive".to_owned(),
            Self::Feedback(FeedbackKind::Good) => "feedback_good".to_owned(),
            Self::Feedback(FeedbackKind::Neutral) => "feedback_neutral".to_owned(),
            Self::Feedback(FeedbackKind::Negative) => "feedback_negative".to_owned(),
            Self::Interest(InterestKind::High) => "interest_high".to_owned(),
            Self::Interest(InterestKind::Medium) => "interest_medium".to_owned(),
            Self::Interest(InterestKind::Future) => "interest_future".to_owned(),
            Self::Interest(InterestKind::None) => "no_interest".to_owned(),
            Self::MeetingPreference(MeetingPreference::Accept) => "accept_meeting".to_owned(),
            Self::MeetingPreference(MeetingPreference::Channel) => "prefer_channel".to_owned(),
            Self::MeetingPreference(MeetingPreference::Email) => "prefer_email".to_owned(),
            Self::MeetingPreference(MeetingPreference::NoTime) => "no_time".to_owned(),
            Self::SlotSelection(ordinal) => format!("slot_{ordinal}"),
            Self::EmailProvided(address) => format!("email:{address}"),
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        if let Some(ordinal) = code.strip_prefix("slot_") {
            return ordinal.parse::<u8>().ok().filter(|n| *n >= 1).map(Self::SlotSelection);
        }
        if let Some(address) = code.strip_prefix("email:") {
            return Some(Self::EmailProvided(address.to_owned()));
        }
        match code {
            "feedback_positive" => Some(Self::Feedback(FeedbackKind::Positive)),
            "feedback_good" => Some(Self::Feedback(FeedbackKind::Good)),
            "feedback_neutral" => Some(Self::Feedback(FeedbackKind::Neutral)),
            "feedback_negative" => Some(Self::Feedback(FeedbackKind::Negative)),
            "interest_high" => Some(Self::Interest(InterestKind::High)),
            "interest_medium" => Some(Self::Interest(InterestKind::Medium)),
            "interest_future" => Some(Self::Interest(InterestKind::Future)),
            "no_interest" => Some(Self::Interest(InterestKind::None)),
            "accept_meeting" => Some(Self::MeetingPreference(MeetingPreference::Accept)),
            "prefer_channel" => Some(Self::MeetingPreference(MeetingPreference::Channel)),
            "prefer_email" => Some(Self::MeetingPreference(MeetingPreference::Email)),
            "no_time" => Some(Self::MeetingPreference(MeetingPreference::NoTime)),
            _ => None,
        }
    }

    pub fn is_feedback(&self) -> bool {
        matches!(self, Self::Feedback(_))
    }

    pub fn is_interest(&self) -> bool {
        matches!(self, Self::Interest(_))
    }

    pub fn is_meeting_preference(&self) -> bool {
        matches!(self, Self::MeetingPreference(_))
    }
}

/// Prefixes that mark raw text as a structured intent code coming straight
/// from a button payload. Recognized ahead of any phrase matching.
const CODE_PREFIXES: &[&str] = &["feedback_", "interest_", "accept_", "prefer_", "no_", "slot_"];

pub fn has_code_prefix(raw: &str) -> bool {
    CODE_PREFIXES.iter().any(|prefix| raw.trim().starts_with(prefix))
}

pub const PHRASE_TABLE_VERSION: &str = "v1";

/// Curated button-label phrases, keyed by their normalized form.
///
/// Declaration order is the tiebreak for the substring pass, so negated
/// phrases must precede the positive phrases they contain ("nao gostei"
/// before "gostei", "nao tenho interesse" before "tenho interesse").
const PHRASE_TABLE_V1: &[(&str, Intent)] = &[
    ("nao gostei", Intent::Feedback(FeedbackKind::Negative)),
    ("ruim", Intent::Feedback(FeedbackKind::Negative)),
    ("gostei muito", Intent::Feedback(FeedbackKind::Positive)),
    ("amei", Intent::Feedback(FeedbackKind::Positive)),
    ("muito bom", Intent::Feedback(FeedbackKind::Positive)),
    ("gostei", Intent::Feedback(FeedbackKind::Good)),
    ("foi ok", Intent::Feedback(FeedbackKind::Neutral)),
    ("ok", Intent::Feedback(FeedbackKind::Neutral)),
    ("legal", Intent::Feedback(FeedbackKind::Neutral)),
    ("mais ou menos", Intent::Feedback(FeedbackKind::Neutral)),
    ("nao tenho interesse", Intent::Interest(InterestKind::None)),
    ("tenho muito interesse", Intent::Interest(InterestKind::High)),
    ("tenho interesse", Intent::Interest(InterestKind::Medium)),
    ("talvez futuramente", Intent::Interest(InterestKind::Future)),
    ("sim quero uma reuniao", Intent::MeetingPreference(MeetingPreference::Accept)),
    ("agendar 15 min", Intent::MeetingPreference(MeetingPreference::Accept)),
    ("prefiro whatsapp", Intent::MeetingPreference(MeetingPreference::Channel)),
    ("falo por whatsapp", Intent::MeetingPreference(MeetingPreference::Channel)),
    ("enviem por email", Intent::MeetingPreference(MeetingPreference::Email)),
    ("prefiro email", Intent::MeetingPreference(MeetingPreference::Email)),
    ("sem tempo agora", Intent::MeetingPreference(MeetingPreference::NoTime)),
];

const POSITIVE_KEYWORDS: &[&str] =
    &["gostei", "otimo", "excelente", "amei", "muito bom", "maravilho", "aprendi"];
const NEGATIVE_KEYWORDS: &[&str] = &["nao gostei", "ruim", "horrivel", "pessimo", "decepcion"];
const NEUTRAL_KEYWORDS: &[&str] = &["ok", "legal", "bom", "interessante", "mais ou menos", "neutro"];

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email pattern")
    })
}

/// Returns the email address when the whole (trimmed) input is one.
pub fn email_address(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    email_regex().is_match(trimmed).then_some(trimmed)
}

/// Maps raw inbound text to an intent. Absence of a match is not an error;
/// the caller falls through to free conversation.
#[derive(Clone, Debug, Default)]
pub struct IntentMapper;

impl IntentMapper {
    pub fn new() -> Self {
        Self
    }

    pub fn map(&self, raw: &str) -> Option<Intent> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        // Structured codes from button payloads win over everything.
        if has_code_prefix(trimmed) {
            if let Some(intent) = Intent::from_code(trimmed) {
                return Some(intent);
            }
        }

        // A provided email unblocks scheduling; it outranks sentiment.
        if let Some(address) = email_address(trimmed) {
            return Some(Intent::EmailProvided(address.to_owned()));
        }

        let key = normalize(trimmed);
        if key.is_empty() {
            return None;
        }

        // A bare small ordinal replies to the most recent slot offer
        // ("2" picks slot 2); validation against the snapshot happens at
        // selection time.
        if let Ok(ordinal) = key.parse::<u8>() {
            if (1..=9).contains(&ordinal) {
                return Some(Intent::SlotSelection(ordinal));
            }
        }

        if let Some((_, intent)) = PHRASE_TABLE_V1.iter().find(|(phrase, _)| *phrase == key) {
            return Some(intent.clone());
        }

        if let Some((_, intent)) = PHRASE_TABLE_V1
            .iter()
            .find(|(phrase, _)| key.contains(phrase) || phrase.contains(key.as_str()))
        {
            return Some(intent.clone());
        }

        self.infer_sentiment(&key)
    }

    fn infer_sentiment(&self, normalized: &str) -> Option<Intent> {
        if POSITIVE_KEYWORDS.iter().any(|kw| normalized.contains(kw)) {
            return Some(Intent::Feedback(FeedbackKind::Positive));
        }
        if NEGATIVE_KEYWORDS.iter().any(|kw| normalized.contains(kw)) {
            return Some(Intent::Feedback(FeedbackKind::Negative));
        }
        if NEUTRAL_KEYWORDS.iter().any(|kw| normalized.contains(kw)) {
            return Some(Intent::Feedback(FeedbackKind::Neutral));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{
        email_address, has_code_prefix, FeedbackKind, Intent, IntentMapper, InterestKind,
        MeetingPreference, PHRASE_TABLE_V1,
    };
    use crate::normalize::normalize;

    #[test]
    fn every_table_phrase_maps_to_its_declared_intent() {
        let mapper = IntentMapper::new();
        for (phrase, expected) in PHRASE_TABLE_V1 {
            assert_eq!(
                mapper.map(phrase).as_ref(),
                Some(expected),
                "phrase {phrase:?} must resolve to its table entry"
            );
        }
    }

    #[test]
    fn table_keys_are_normalized_and_unique() {
        for (index, (phrase, _)) in PHRASE_TABLE_V1.iter().enumerate() {
            assert_eq!(*phrase, normalize(phrase), "table keys must be stored normalized");
            assert!(
                PHRASE_TABLE_V1[..index].iter().all(|(other, _)| other != phrase),
                "duplicate table key {phrase:?}"
            );
        }
    }

    #[test]
    fn negated_keys_precede_the_positive_keys_they_contain() {
        // Declaration order is the substring-pass tiebreak, so a key that
        // textually contains another key with a different intent must be
        // declared first or longer inputs would resolve to the wrong intent.
        for (index, (phrase, intent)) in PHRASE_TABLE_V1.iter().enumerate() {
            for (other, other_intent) in &PHRASE_TABLE_V1[index + 1..] {
                if phrase.contains(other) {
                    continue; // refinements like "nao gostei" > "gostei" are the point
                }
                assert!(
                    !other.contains(phrase) || other_intent == intent,
                    "{other:?} is shadowed by earlier shorter key {phrase:?}"
                );
            }
        }
    }

    #[test]
    fn accent_emoji_and_case_are_irrelevant() {
        let mapper = IntentMapper::new();
        assert_eq!(mapper.map("NÃO GOSTEI 😠"), mapper.map("nao gostei"));
        assert_eq!(
            mapper.map("😊 Gostei muito!"),
            Some(Intent::Feedback(FeedbackKind::Positive))
        );
    }

    #[test]
    fn negated_phrases_win_over_their_positive_substrings() {
        let mapper = IntentMapper::new();
        assert_eq!(
            mapper.map("nao gostei do seminario"),
            Some(Intent::Feedback(FeedbackKind::Negative))
        );
        assert_eq!(
            mapper.map("nao tenho interesse nenhum"),
            Some(Intent::Interest(InterestKind::None))
        );
    }

    #[test]
    fn structured_codes_are_accepted_verbatim() {
        let mapper = IntentMapper::new();
        assert_eq!(mapper.map("slot_3"), Some(Intent::SlotSelection(3)));
        assert_eq!(
            mapper.map("accept_meeting"),
            Some(Intent::MeetingPreference(MeetingPreference::Accept))
        );
        assert!(has_code_prefix("feedback_positive"));
        assert!(!has_code_prefix("gostei muito"));
    }

    #[test]
    fn slot_zero_is_not_a_valid_code() {
        assert_eq!(Intent::from_code("slot_0"), None);
        assert_eq!(Intent::from_code("slot_abc"), None);
    }

    #[test]
    fn bare_ordinals_select_slots() {
        let mapper = IntentMapper::new();
        assert_eq!(mapper.map("3"), Some(Intent::SlotSelection(3)));
        assert_eq!(mapper.map(" 2 "), Some(Intent::SlotSelection(2)));
        assert_eq!(mapper.map("0"), None);
        assert_eq!(mapper.map("42"), None, "large numbers are ordinary text");
    }

    #[test]
    fn email_detection_outranks_sentiment() {
        let mapper = IntentMapper::new();
        assert_eq!(
            mapper.map("  joao@example.com "),
            Some(Intent::EmailProvided("joao@example.com".to_owned()))
        );
        assert_eq!(email_address("not an email"), None);
        assert_eq!(email_address("a@b.c"), None, "single-letter TLD is rejected");
    }

    #[test]
    fn sentiment_fallback_orders_positive_before_negative_before_neutral() {
        let mapper = IntentMapper::new();
        assert_eq!(
            mapper.map("achei otimo o evento de ontem"),
            Some(Intent::Feedback(FeedbackKind::Positive))
        );
        assert_eq!(
            mapper.map("achei horrivel aquela parte"),
            Some(Intent::Feedback(FeedbackKind::Negative))
        );
        assert_eq!(
            mapper.map("achei interessante a proposta"),
            Some(Intent::Feedback(FeedbackKind::Neutral))
        );
    }

    #[test]
    fn unmatched_text_yields_no_intent() {
        let mapper = IntentMapper::new();
        assert_eq!(mapper.map("qual o valor da mensalidade?"), None);
        assert_eq!(mapper.map(""), None);
        assert_eq!(mapper.map("😀"), None);
    }

    #[test]
    fn codes_round_trip() {
        let intents = [
            Intent::Feedback(FeedbackKind::Negative),
            Intent::Interest(InterestKind::Future),
            Intent::MeetingPreference(MeetingPreference::NoTime),
            Intent::SlotSelection(5),
            Intent::EmailProvided("maria@exemplo.com.br".to_owned()),
        ];
        for intent in intents {
            assert_eq!(Intent::from_code(&intent.code()), Some(intent));
        }
    }
}
