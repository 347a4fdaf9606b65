use async_trait::async_trait;
use thiserror::Error;

use leadflow_core::domain::lead::LeadId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("message transport failure: {0}")]
    Transport(String),
    #[error("send throttled; retry in {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChoiceRow {
    pub id: String,
    pub title: String,
    pub description: String,
}

impl ChoiceRow {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self { id: id.into(), title: title.into(), description: description.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChoiceSection {
    pub title: String,
    pub rows: Vec<ChoiceRow>,
}

/// An interactive pick-one list. The row ids come back verbatim as the
/// selected-row payload of the reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChoiceList {
    pub title: String,
    pub body: String,
    pub button_label: String,
    pub footer: String,
    pub sections: Vec<ChoiceSection>,
}

impl ChoiceList {
    pub fn row_ids(&self) -> Vec<&str> {
        self.sections
            .iter()
            .flat_map(|section| section.rows.iter().map(|row| row.id.as_str()))
            .collect()
    }
}

/// Outbound message transport. Fire-and-forget from the engine's point of
/// view: the only signal back is whether delivery was accepted.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, to: &LeadId, text: &str) -> Result<(), NotifyError>;
    async fn send_choice_list(&self, to: &LeadId, list: &ChoiceList) -> Result<(), NotifyError>;
}

/// Accepts everything and delivers nothing. Default wiring for scaffolding
/// and tests that do not observe outbound traffic.
#[derive(Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send_text(&self, _to: &LeadId, _text: &str) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn send_choice_list(&self, _to: &LeadId, _list: &ChoiceList) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ChoiceList, ChoiceRow, ChoiceSection};

    #[test]
    fn row_ids_flatten_across_sections() {
        let list = ChoiceList {
            title: "Como foi sua experiência?".to_owned(),
            body: "Pode responder pelos botões.".to_owned(),
            button_label: "Avaliar".to_owned(),
            footer: "Sua opinião é muito importante!".to_owned(),
            sections: vec![
                ChoiceSection {
                    title: "Feedback".to_owned(),
                    rows: vec![
                        ChoiceRow::new("feedback_positive", "Gostei muito!", "Foi ótimo"),
                        ChoiceRow::new("feedback_good", "Gostei", "Atendeu"),
                    ],
                },
                ChoiceSection {
                    title: "Outros".to_owned(),
                    rows: vec![ChoiceRow::new("feedback_negative", "Não gostei", "Não atendeu")],
                },
            ],
        };

        assert_eq!(list.row_ids(), vec!["feedback_positive", "feedback_good", "feedback_negative"]);
    }
}
