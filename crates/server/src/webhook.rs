use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use leadflow_agent::DialogueOrchestrator;
use leadflow_channel::{parse_inbound, IgnoreReason, InboundEvent};
use leadflow_core::domain::lead::LeadId;
use leadflow_db::repositories::LeadRepository;

#[derive(Clone)]
pub struct WebhookState {
    pub orchestrator: Arc<DialogueOrchestrator>,
    pub leads: Arc<dyn LeadRepository>,
    pub ignore_own_messages: bool,
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/campaign", post(campaign))
        .route("/status", get(status))
        .with_state(state)
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

/// Gateway webhook: unusable payloads are acknowledged and dropped, never
/// rejected with an error the provider would retry forever.
pub async fn webhook(
    State(state): State<WebhookState>,
    Json(payload): Json<Value>,
) -> Json<WebhookResponse> {
    let message = match parse_inbound(&payload, state.ignore_own_messages) {
        InboundEvent::Message(message) => message,
        InboundEvent::Ignored(reason) => {
            let reason = ignore_label(reason);
            info!(event_name = "ingress.webhook.ignored", reason, "dropping unusable payload");
            return Json(WebhookResponse { status: "ignored", reason: Some(reason), reply: None });
        }
    };

    info!(
        event_name = "ingress.webhook.message",
        lead_id = %message.lead_id,
        "processing inbound message"
    );

    let reply = state
        .orchestrator
        .handle_message(&message.lead_id, &message.text, &message.display_name)
        .await;

    match reply {
        Some(reply) => Json(WebhookResponse { status: "processed", reason: None, reply: Some(reply) }),
        None => Json(WebhookResponse { status: "ignored", reason: Some("no_reply"), reply: None }),
    }
}

fn ignore_label(reason: IgnoreReason) -> &'static str {
    match reason {
        IgnoreReason::Ack => "ack",
        IgnoreReason::OwnMessage => "from_me",
        IgnoreReason::MissingPhone => "no_phone",
        IgnoreReason::EmptyText => "no_text",
    }
}

#[derive(Debug, Deserialize)]
pub struct CampaignRequest {
    pub phone: String,
    pub name: String,
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CampaignResponse {
    pub started: bool,
}

pub async fn campaign(
    State(state): State<WebhookState>,
    Json(request): Json<CampaignRequest>,
) -> Json<CampaignResponse> {
    let digits: String = request.phone.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        warn!(event_name = "ingress.campaign.rejected", "campaign request without a phone");
        return Json(CampaignResponse { started: false });
    }

    let started = state
        .orchestrator
        .start_campaign(&LeadId(digits), &request.name, request.topic.as_deref())
        .await;
    Json(CampaignResponse { started })
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub total_leads: i64,
    pub contacted: i64,
    pub qualified: i64,
    pub scheduled: i64,
    pub converted: i64,
    pub contact_rate: f64,
    pub conversion_rate: f64,
}

pub async fn status(State(state): State<WebhookState>) -> Json<StatusResponse> {
    let stats = state.leads.conversion_stats().await.unwrap_or_default();
    Json(StatusResponse {
        total_leads: stats.total_leads,
        contacted: stats.contacted,
        qualified: stats.qualified,
        scheduled: stats.scheduled,
        converted: stats.converted,
        contact_rate: stats.contact_rate(),
        conversion_rate: stats.conversion_rate(),
    })
}
