//! Inbound webhook envelope → [`InboundEvent`]s.
//!
//! Envelope shape: `object → entry[] → changes[] → value.messages[]`.
//! Each message is decoded on its own so one odd message never hides its
//! siblings. Delivery receipts (`value.statuses[]`) are ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::conversation::{InboundEvent, InboundKind};
use crate::error::WebhookError;

/// `object` value for WhatsApp Business Account notifications.
pub const WHATSAPP_OBJECT: &str = "whatsapp_business_account";

// ── Envelope ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    object: String,
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    #[serde(default)]
    value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
struct ChangeValue {
    #[serde(default)]
    contacts: Vec<Contact>,
    /// Kept raw so each message can fail independently.
    #[serde(default)]
    messages: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Contact {
    wa_id: Option<String>,
    profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    name: Option<String>,
}

// ── Messages ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawMessage {
    from: String,
    id: String,
    timestamp: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    text: Option<RawText>,
    interactive: Option<RawInteractive>,
    /// Quick-reply button on a template message.
    button: Option<RawTemplateButton>,
}

#[derive(Debug, Deserialize)]
struct RawText {
    body: String,
}

#[derive(Debug, Deserialize)]
struct RawInteractive {
    #[serde(rename = "type")]
    kind: String,
    list_reply: Option<RawReply>,
    button_reply: Option<RawReply>,
}

#[derive(Debug, Deserialize)]
struct RawReply {
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct RawTemplateButton {
    payload: Option<String>,
    #[serde(default)]
    text: String,
}

/// Parse a webhook body into zero or more inbound events, in delivery order.
pub fn parse_envelope(body: &[u8]) -> Result<Vec<InboundEvent>, WebhookError> {
    let envelope: Envelope = serde_json::from_slice(body)?;
    if envelope.object != WHATSAPP_OBJECT {
        return Err(WebhookError::UnexpectedObject(envelope.object));
    }

    let mut events = Vec::new();
    for change in envelope.entry.into_iter().flat_map(|e| e.changes) {
        let contacts = change.value.contacts;
        for raw in change.value.messages {
            match serde_json::from_value::<RawMessage>(raw) {
                Ok(message) => {
                    if let Some(event) = to_event(message, &contacts) {
                        events.push(event);
                    }
                }
                Err(e) => debug!(error = %e, "Skipping undecodable webhook message"),
            }
        }
    }
    Ok(events)
}

fn to_event(message: RawMessage, contacts: &[Contact]) -> Option<InboundEvent> {
    if message.from.is_empty() || message.id.is_empty() {
        debug!("Skipping webhook message without sender or id");
        return None;
    }

    let kind = match message.kind.as_str() {
        "text" => match message.text {
            Some(text) => InboundKind::Text { body: text.body },
            None => unsupported("text"),
        },
        "interactive" => match message.interactive {
            Some(RawInteractive {
                list_reply: Some(reply),
                ..
            }) => InboundKind::ListReply {
                id: reply.id,
                title: reply.title,
            },
            Some(RawInteractive {
                button_reply: Some(reply),
                ..
            }) => InboundKind::ButtonReply {
                id: reply.id,
                title: reply.title,
            },
            Some(other) => unsupported(&format!("interactive:{}", other.kind)),
            None => unsupported("interactive"),
        },
        "button" => match message.button {
            Some(button) => InboundKind::ButtonReply {
                id: button.payload.unwrap_or_else(|| button.text.clone()),
                title: button.text,
            },
            None => unsupported("button"),
        },
        other => unsupported(other),
    };

    let sender_name = contacts
        .iter()
        .find(|c| c.wa_id.as_deref() == Some(message.from.as_str()))
        .or_else(|| contacts.first())
        .and_then(|c| c.profile.as_ref())
        .and_then(|p| p.name.clone())
        .filter(|n| !n.trim().is_empty());

    let timestamp = message
        .timestamp
        .as_deref()
        .and_then(|t| t.parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

    Some(InboundEvent {
        message_id: message.id,
        sender: message.from,
        sender_name,
        timestamp,
        kind,
    })
}

fn unsupported(kind: &str) -> InboundKind {
    InboundKind::Unsupported {
        kind: kind.to_string(),
    }
}
