//! Conversation system — the guided lead-capture flow.
//!
//! A sender picks a category, then a machine, then says whether they want to
//! be contacted. Inbound replies are parsed into [`Intent`]s, the
//! [`ConversationEngine`] computes the next [`Session`] and the replies, and
//! the caller delivers and persists them.

pub mod engine;
pub mod intent;
pub mod replies;
pub mod state;
pub mod types;

pub use engine::{ConversationEngine, Transition};
pub use intent::Intent;
pub use replies::Replies;
pub use state::{ConversationState, Session};
pub use types::{InboundEvent, InboundKind, ListRow, OutboundMessage, ReplyButton};
