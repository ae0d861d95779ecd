//! Outbound sender — Graph API `/{phone_number_id}/messages`.
//!
//! Serializes [`OutboundMessage`] into the Cloud API JSON body and posts it
//! with the bearer token. Failures are returned to the caller; nothing here
//! retries.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::MAX_MENU_ENTRIES;
use crate::config::WhatsAppConfig;
use crate::conversation::{ListRow, OutboundMessage, ReplyButton};
use crate::error::ChannelError;

const CHANNEL_NAME: &str = "whatsapp";

// Platform limits for interactive messages.
const MAX_TEXT_BODY: usize = 4096;
const MAX_INTERACTIVE_BODY: usize = 1024;
const MAX_HEADER: usize = 60;
const MAX_LIST_BUTTON: usize = 20;
const MAX_LIST_ROWS: usize = MAX_MENU_ENTRIES;
const MAX_ROW_TITLE: usize = 24;
const MAX_ROW_DESCRIPTION: usize = 72;
const MAX_SECTION_TITLE: usize = 24;
const MAX_REPLY_BUTTONS: usize = 3;
const MAX_BUTTON_TITLE: usize = 20;

/// Delivers outbound messages to a recipient.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, to: &str, message: &OutboundMessage) -> Result<(), ChannelError>;
}

/// WhatsApp Cloud API sender.
pub struct WhatsAppSender {
    config: WhatsAppConfig,
    client: reqwest::Client,
}

impl WhatsAppSender {
    pub fn new(config: WhatsAppConfig) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(config.send_timeout)
            .build()
            .map_err(|e| ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { config, client })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.config.graph_url, self.config.api_version, self.config.phone_number_id
        )
    }
}

#[async_trait]
impl MessageSender for WhatsAppSender {
    async fn send(&self, to: &str, message: &OutboundMessage) -> Result<(), ChannelError> {
        let body = wire_body(to, message)?;

        let resp = self
            .client
            .post(self.messages_url())
            .bearer_auth(self.config.access_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason: if e.is_timeout() {
                    format!("request timed out after {:?}", self.config.send_timeout)
                } else {
                    e.to_string()
                },
            })?;

        let status = resp.status();
        if status.is_success() {
            info!(to = %to, kind = message.kind(), "WhatsApp message sent");
            return Ok(());
        }

        let detail = resp.text().await.unwrap_or_default();
        let detail: String = detail.chars().take(500).collect();
        warn!(status = %status, to = %to, kind = message.kind(), "WhatsApp send rejected");

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ChannelError::AuthFailed {
                name: CHANNEL_NAME.into(),
                reason: detail,
            },
            StatusCode::TOO_MANY_REQUESTS => ChannelError::RateLimited {
                name: CHANNEL_NAME.into(),
            },
            _ => ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason: format!("HTTP {status}: {detail}"),
            },
        })
    }
}

// ── Wire format ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(flatten)]
    payload: WirePayload,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePayload {
    Text { text: WireText },
    Interactive { interactive: WireInteractive },
}

#[derive(Debug, Serialize)]
struct WireText {
    preview_url: bool,
    body: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireInteractive {
    List {
        header: WireHeader,
        body: WireBody,
        action: WireListAction,
    },
    Button {
        body: WireBody,
        action: WireButtonAction,
    },
}

#[derive(Debug, Serialize)]
struct WireHeader {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

#[derive(Debug, Serialize)]
struct WireBody {
    text: String,
}

#[derive(Debug, Serialize)]
struct WireListAction {
    button: String,
    sections: Vec<WireSection>,
}

#[derive(Debug, Serialize)]
struct WireSection {
    title: String,
    rows: Vec<WireRow>,
}

#[derive(Debug, Serialize)]
struct WireRow {
    id: String,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireButtonAction {
    buttons: Vec<WireButton>,
}

#[derive(Debug, Serialize)]
struct WireButton {
    #[serde(rename = "type")]
    kind: &'static str,
    reply: WireReply,
}

#[derive(Debug, Serialize)]
struct WireReply {
    id: String,
    title: String,
}

/// Build the JSON request body for `message`, enforcing platform limits.
pub fn wire_body(to: &str, message: &OutboundMessage) -> Result<serde_json::Value, ChannelError> {
    let payload = match message {
        OutboundMessage::Text { body } => WirePayload::Text {
            text: WireText {
                preview_url: false,
                body: truncate(body, MAX_TEXT_BODY),
            },
        },
        OutboundMessage::List {
            header,
            body,
            button,
            rows,
        } => {
            if rows.is_empty() {
                return Err(ChannelError::InvalidMessage(
                    "list message needs at least one row".into(),
                ));
            }
            if rows.len() > MAX_LIST_ROWS {
                warn!(rows = rows.len(), max = MAX_LIST_ROWS, "Dropping list rows over limit");
            }
            WirePayload::Interactive {
                interactive: WireInteractive::List {
                    header: WireHeader {
                        kind: "text",
                        text: truncate(header, MAX_HEADER),
                    },
                    body: WireBody {
                        text: truncate(body, MAX_INTERACTIVE_BODY),
                    },
                    action: WireListAction {
                        button: truncate(button, MAX_LIST_BUTTON),
                        sections: vec![WireSection {
                            title: truncate(header, MAX_SECTION_TITLE),
                            rows: rows.iter().take(MAX_LIST_ROWS).map(wire_row).collect(),
                        }],
                    },
                },
            }
        }
        OutboundMessage::Buttons { body, buttons } => {
            if buttons.is_empty() {
                return Err(ChannelError::InvalidMessage(
                    "button message needs at least one button".into(),
                ));
            }
            if buttons.len() > MAX_REPLY_BUTTONS {
                warn!(
                    buttons = buttons.len(),
                    max = MAX_REPLY_BUTTONS,
                    "Dropping reply buttons over limit"
                );
            }
            WirePayload::Interactive {
                interactive: WireInteractive::Button {
                    body: WireBody {
                        text: truncate(body, MAX_INTERACTIVE_BODY),
                    },
                    action: WireButtonAction {
                        buttons: buttons
                            .iter()
                            .take(MAX_REPLY_BUTTONS)
                            .map(wire_button)
                            .collect(),
                    },
                },
            }
        }
    };

    let wire = WireMessage {
        messaging_product: "whatsapp",
        recipient_type: "individual",
        to,
        payload,
    };
    serde_json::to_value(&wire).map_err(|e| ChannelError::InvalidMessage(e.to_string()))
}

fn wire_row(row: &ListRow) -> WireRow {
    WireRow {
        id: row.id.clone(),
        title: truncate(&row.title, MAX_ROW_TITLE),
        description: row
            .description
            .as_deref()
            .map(|d| truncate(d, MAX_ROW_DESCRIPTION)),
    }
}

fn wire_button(button: &ReplyButton) -> WireButton {
    WireButton {
        kind: "reply",
        reply: WireReply {
            id: button.id.clone(),
            title: truncate(&button.title, MAX_BUTTON_TITLE),
        },
    }
}

/// Cut `s` to at most `max` chars, marking the cut with `…`.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
