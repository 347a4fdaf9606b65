use serde_json::Value;

use leadflow_core::domain::lead::LeadId;

/// A usable inbound message extracted from a gateway webhook payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub lead_id: LeadId,
    pub display_name: String,
    /// Free text, or the selected row/button id when the payload is an
    /// interactive reply (row ids take priority over text bodies).
    pub text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    Ack,
    OwnMessage,
    MissingPhone,
    EmptyText,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Message(InboundMessage),
    Ignored(IgnoreReason),
}

/// Tolerant extraction over the gateway's payload shapes. Unusable payloads
/// are classified, never errors: the webhook logs and drops them.
pub fn parse_inbound(payload: &Value, ignore_own_messages: bool) -> InboundEvent {
    if message_type(payload) == Some("message.ack") {
        return InboundEvent::Ignored(IgnoreReason::Ack);
    }

    let from_me = payload
        .get("key")
        .and_then(|key| key.get("fromMe"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if from_me && ignore_own_messages {
        return InboundEvent::Ignored(IgnoreReason::OwnMessage);
    }

    let Some(phone) = extract_phone(payload) else {
        return InboundEvent::Ignored(IgnoreReason::MissingPhone);
    };

    let text = extract_text(payload);
    if text.is_empty() {
        return InboundEvent::Ignored(IgnoreReason::EmptyText);
    }

    InboundEvent::Message(InboundMessage {
        lead_id: LeadId(phone),
        display_name: extract_display_name(payload),
        text,
    })
}

fn message_type(payload: &Value) -> Option<&str> {
    payload
        .get("messageType")
        .and_then(Value::as_str)
        .or_else(|| payload.get("message").and_then(|m| m.get("type")).and_then(Value::as_str))
}

fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// The sender's phone hides in the JID, or in the interactive-reply
/// participant when the JID is absent.
fn extract_phone(payload: &Value) -> Option<String> {
    let jid = payload
        .get("jid")
        .and_then(Value::as_str)
        .or_else(|| {
            payload.get("key").and_then(|key| key.get("remoteJid")).and_then(Value::as_str)
        })
        .unwrap_or("");

    for suffix in ["@s.whatsapp.net", "@g.us"] {
        if let Some(stripped) = jid.strip_suffix(suffix) {
            let digits = digits_only(stripped);
            if !digits.is_empty() {
                return Some(digits);
            }
        }
    }

    let message = payload.get("message").cloned().unwrap_or(Value::Null);
    for container in ["listResponseMessage", "buttonsResponseMessage"] {
        let participant = message
            .get(container)
            .and_then(|m| m.get("contextInfo"))
            .and_then(|ctx| ctx.get("participant"))
            .and_then(Value::as_str);
        if let Some(participant) = participant {
            let digits = digits_only(participant.split('@').next().unwrap_or(""));
            if !digits.is_empty() {
                return Some(digits);
            }
        }
    }

    None
}

fn extract_display_name(payload: &Value) -> String {
    payload
        .get("pushName")
        .and_then(Value::as_str)
        .or_else(|| payload.get("senderName").and_then(Value::as_str))
        .unwrap_or("Cliente")
        .to_owned()
}

/// Selected row/button ids across the shapes different gateway versions
/// produce for interactive replies.
fn selected_row_id(message: &Value) -> Option<String> {
    let from_single_select = |container: &Value| {
        container
            .get("singleSelectReply")
            .map(|reply| {
                reply
                    .get("selectedRowId")
                    .or_else(|| reply.get("rowId"))
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            })
            .unwrap_or(None)
    };

    if let Some(lrm) = message.get("listResponseMessage") {
        if let Some(row_id) = from_single_select(lrm) {
            return Some(row_id);
        }
    }

    let irm = message.get("interactiveResponseMessage");
    if let Some(lrm) = irm.and_then(|m| m.get("listResponseMessage")) {
        if let Some(row_id) = from_single_select(lrm) {
            return Some(row_id);
        }
    }

    if let Some(button) = message.get("buttonReplyMessage") {
        let id = button
            .get("selectedButtonId")
            .or_else(|| button.get("id"))
            .and_then(Value::as_str);
        if let Some(id) = id {
            return Some(id.to_owned());
        }
    }

    if let Some(id) = message
        .get("buttonsResponseMessage")
        .and_then(|m| m.get("selectedButtonId"))
        .and_then(Value::as_str)
    {
        return Some(id.to_owned());
    }

    // Native-flow replies carry the selection as an embedded JSON string.
    if let Some(params) = irm
        .and_then(|m| m.get("nativeFlowResponseMessage"))
        .and_then(|m| m.get("paramsJson"))
        .and_then(Value::as_str)
    {
        if let Ok(data) = serde_json::from_str::<Value>(params) {
            for key in ["rowId", "selectedRowId", "id"] {
                if let Some(id) = data.get(key).and_then(Value::as_str) {
                    return Some(id.to_owned());
                }
            }
        }
    }

    None
}

fn extract_text(payload: &Value) -> String {
    let message = payload.get("message").cloned().unwrap_or(Value::Null);

    if let Some(row_id) = selected_row_id(&message) {
        return row_id;
    }

    match message_type(payload) {
        Some("conversation") => {
            return message.get("conversation").and_then(Value::as_str).unwrap_or("").to_owned();
        }
        Some("extendedTextMessage") => {
            return message
                .get("extendedTextMessage")
                .and_then(|m| m.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_owned();
        }
        _ => {}
    }

    for media in ["imageMessage", "videoMessage"] {
        if let Some(caption) =
            message.get(media).and_then(|m| m.get("caption")).and_then(Value::as_str)
        {
            return caption.to_owned();
        }
    }

    if let Some(body) = message
        .get("interactiveMessage")
        .and_then(|m| m.get("body"))
        .and_then(|b| b.get("text"))
        .and_then(Value::as_str)
    {
        return body.to_owned();
    }

    if let Some(text) = message.get("text").and_then(Value::as_str) {
        return text.to_owned();
    }

    // Last resort: a list reply sometimes only carries its row title.
    message
        .get("listResponseMessage")
        .and_then(|m| m.get("title"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_owned()
}
