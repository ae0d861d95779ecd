//! Inbound events and outbound messages exchanged with the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Inbound ─────────────────────────────────────────────────────────

/// Normalized inbound message from the webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Platform message id (`wamid.…`), used for de-duplication.
    pub message_id: String,
    /// Sender phone number.
    pub sender: String,
    /// Profile name from the envelope's contacts block, if present.
    pub sender_name: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub kind: InboundKind,
}

/// What the sender did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundKind {
    /// Tapped a row in a list message.
    ListReply { id: String, title: String },
    /// Tapped a reply button.
    ButtonReply { id: String, title: String },
    /// Typed free text.
    Text { body: String },
    /// Anything else (image, location, reaction…).
    Unsupported { kind: String },
}

impl InboundEvent {
    pub fn new(message_id: impl Into<String>, sender: impl Into<String>, kind: InboundKind) -> Self {
        Self {
            message_id: message_id.into(),
            sender: sender.into(),
            sender_name: None,
            timestamp: None,
            kind,
        }
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }
}

// ── Outbound ────────────────────────────────────────────────────────

/// A row in an interactive list message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A quick-reply button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyButton {
    pub id: String,
    pub title: String,
}

/// A message the bot wants delivered, independent of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    Text {
        body: String,
    },
    List {
        header: String,
        body: String,
        /// Label of the button that opens the list.
        button: String,
        rows: Vec<ListRow>,
    },
    Buttons {
        body: String,
        buttons: Vec<ReplyButton>,
    },
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::List { .. } => "list",
            Self::Buttons { .. } => "buttons",
        }
    }
}
