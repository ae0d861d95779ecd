//! WhatsApp Business Cloud API channel.
//!
//! Inbound: the platform POSTs webhook envelopes to [`routes`], which are
//! decoded by [`webhook`]. Outbound: [`sender`] posts replies to the Graph API.

pub mod routes;
pub mod sender;
pub mod webhook;

pub use routes::{WEBHOOK_PATH, WebhookState, webhook_routes};
pub use sender::{MessageSender, WhatsAppSender};
pub use webhook::parse_envelope;
