use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use leadflow_core::config::GatewayConfig;
use leadflow_core::domain::lead::LeadId;

use crate::outbound::{ChoiceList, Notifier, NotifyError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for the messaging gateway's REST API. Applies a minimum
/// per-recipient send interval so campaign bursts cannot trip the
/// provider's flood protection.
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    api_token: SecretString,
    instance_id: String,
    min_interval: Duration,
    last_sent: Mutex<HashMap<String, Instant>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceStatus {
    pub connected: bool,
    pub user: Option<String>,
}

impl GatewayClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| NotifyError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_token: config.api_token.clone(),
            instance_id: config.instance_id.clone(),
            min_interval: Duration::from_secs(config.min_send_interval_secs),
            last_sent: Mutex::new(HashMap::new()),
        })
    }

    pub async fn instance_status(&self) -> Result<InstanceStatus, NotifyError> {
        let url = format!("{}/rest/instance/{}", self.base_url, self.instance_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.api_token.expose_secret())
            .send()
            .await
            .map_err(|error| NotifyError::Transport(error.to_string()))?
            .error_for_status()
            .map_err(|error| NotifyError::Transport(error.to_string()))?;

        let body: InstanceResponse =
            response.json().await.map_err(|error| NotifyError::Transport(error.to_string()))?;

        let user = body.instance.and_then(|instance| instance.user);
        Ok(InstanceStatus { connected: user.is_some(), user })
    }

    async fn throttle(&self, phone: &str) -> Result<(), NotifyError> {
        let last_sent = self.last_sent.lock().await;
        if let Some(last) = last_sent.get(phone) {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let retry_after_secs = (self.min_interval - elapsed).as_secs().max(1);
                return Err(NotifyError::Throttled { retry_after_secs });
            }
        }
        Ok(())
    }

    async fn mark_sent(&self, phone: &str) {
        let mut last_sent = self.last_sent.lock().await;
        last_sent.insert(phone.to_owned(), Instant::now());
    }

    async fn post(&self, endpoint: &str, body: &impl Serialize) -> Result<(), NotifyError> {
        let url =
            format!("{}/rest/sendMessage/{}/{endpoint}", self.base_url, self.instance_id);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|error| NotifyError::Transport(error.to_string()))?;

        if let Err(error) = response.error_for_status() {
            warn!(endpoint, error = %error, "gateway rejected outbound message");
            return Err(NotifyError::Transport(error.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for GatewayClient {
    async fn send_text(&self, to: &LeadId, text: &str) -> Result<(), NotifyError> {
        self.throttle(&to.0).await?;
        self.post("text", &TextPayload::new(&to.0, text)).await?;
        self.mark_sent(&to.0).await;
        info!(lead_id = %to, kind = "text", "outbound message delivered");
        Ok(())
    }

    async fn send_choice_list(&self, to: &LeadId, list: &ChoiceList) -> Result<(), NotifyError> {
        self.throttle(&to.0).await?;
        self.post("listMessage", &ListPayload::new(&to.0, list)).await?;
        self.mark_sent(&to.0).await;
        info!(lead_id = %to, kind = "choice_list", "outbound message delivered");
        Ok(())
    }
}

fn to_jid(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    format!("{digits}@s.whatsapp.net")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextPayload {
    message_data: TextMessageData,
}

#[derive(Debug, Serialize)]
struct TextMessageData {
    to: String,
    text: String,
}

impl TextPayload {
    fn new(phone: &str, text: &str) -> Self {
        Self { message_data: TextMessageData { to: to_jid(phone), text: text.to_owned() } }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListPayload {
    message_data: ListMessageData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListMessageData {
    to: String,
    button_text: String,
    text: String,
    title: String,
    description: String,
    sections: Vec<SectionPayload>,
}

#[derive(Debug, Serialize)]
struct SectionPayload {
    title: String,
    rows: Vec<RowPayload>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RowPayload {
    title: String,
    description: String,
    row_id: String,
}

impl ListPayload {
    fn new(phone: &str, list: &ChoiceList) -> Self {
        Self {
            message_data: ListMessageData {
                to: to_jid(phone),
                button_text: list.button_label.clone(),
                text: list.body.clone(),
                title: list.title.clone(),
                description: list.footer.clone(),
                sections: list
                    .sections
                    .iter()
                    .map(|section| SectionPayload {
                        title: section.title.clone(),
                        rows: section
                            .rows
                            .iter()
                            .map(|row| RowPayload {
                                title: row.title.clone(),
                                description: row.description.clone(),
                                row_id: row.id.clone(),
                            })
                            .collect(),
                    })
                    .collect(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct InstanceResponse {
    instance: Option<InstanceBody>,
}

#[derive(Debug, Deserialize)]
struct InstanceBody {
    user: Option<String>,
}

#[cfg(test)]
mod tests {
    use leadflow_core::config::GatewayConfig;
    use leadflow_core::domain::lead::LeadId;

    use super::{to_jid, GatewayClient, ListPayload, TextPayload};
    use crate::outbound::{ChoiceList, ChoiceRow, ChoiceSection, Notifier, NotifyError};

    fn config(min_interval: u64) -> GatewayConfig {
        GatewayConfig {
            // Unroutable loopback port: sends fail fast as transport errors.
            base_url: "http://127.0.0.1:9".to_owned(),
            api_token: "token".to_owned().into(),
            instance_id: "inst-1".to_owned(),
            min_send_interval_secs: min_interval,
        }
    }

    #[test]
    fn jid_strips_formatting() {
        assert_eq!(to_jid("+55 (47) 99999-0000"), "5547999990000@s.whatsapp.net");
    }

    #[test]
    fn text_payload_shape_matches_the_gateway_contract() {
        let value = serde_json::to_value(TextPayload::new("5547999990000", "Oi!")).expect("encode");
        assert_eq!(value["messageData"]["to"], "5547999990000@s.whatsapp.net");
        assert_eq!(value["messageData"]["text"], "Oi!");
    }

    #[test]
    fn list_payload_shape_matches_the_gateway_contract() {
        let list = ChoiceList {
            title: "Qual horário?".to_owned(),
            body: "Temos estes horários livres:".to_owned(),
            button_label: "Escolher Horário".to_owned(),
            footer: "Escolha o que funciona melhor".to_owned(),
            sections: vec![ChoiceSection {
                title: "🗓️ Horários disponíveis".to_owned(),
                rows: vec![ChoiceRow::new("slot_1", "📅 10/08/2026 às 09:00", "Reunião de 30 minutos")],
            }],
        };

        let value = serde_json::to_value(ListPayload::new("5547999990000", &list)).expect("encode");
        assert_eq!(value["messageData"]["buttonText"], "Escolher Horário");
        assert_eq!(value["messageData"]["sections"][0]["rows"][0]["rowId"], "slot_1");
    }

    #[tokio::test]
    async fn second_send_inside_the_interval_is_throttled() {
        let client = GatewayClient::new(&config(3600)).expect("client");
        let lead = LeadId("5547999990000".to_owned());

        // Delivery fails (nothing listens on the port), but marking only
        // happens on success, so simulate one by hand.
        client.mark_sent(&lead.0).await;

        let result = client.send_text(&lead, "oi").await;
        assert!(matches!(result, Err(NotifyError::Throttled { .. })));
    }

    #[tokio::test]
    async fn transport_failures_surface_as_notify_errors() {
        let client = GatewayClient::new(&config(0)).expect("client");
        let lead = LeadId("5547999990000".to_owned());

        let result = client.send_text(&lead, "oi").await;
        assert!(matches!(result, Err(NotifyError::Transport(_))));
    }
}
