//! Lead bot — glue between inbound events, sessions, replies and leads.
//!
//! For one event: lock the sender's session, run the engine, deliver the
//! replies in order, record any lead, then write the new session back while
//! still holding the lock.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::channels::whatsapp::{MessageSender, parse_envelope};
use crate::conversation::{ConversationEngine, ConversationState, InboundEvent};
use crate::dedup::RecentIds;
use crate::error::WebhookError;
use crate::leads::LeadStore;
use crate::session::SessionStore;

/// What happened to one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The message id was seen recently; nothing was done.
    Duplicate,
    Processed {
        state: ConversationState,
        /// Replies accepted by the channel.
        sent: usize,
        lead_recorded: bool,
    },
}

pub struct LeadBot {
    sessions: Arc<SessionStore>,
    engine: ConversationEngine,
    sender: Arc<dyn MessageSender>,
    leads: Arc<dyn LeadStore>,
    recent: Mutex<RecentIds>,
}

impl LeadBot {
    pub fn new(
        sessions: Arc<SessionStore>,
        engine: ConversationEngine,
        sender: Arc<dyn MessageSender>,
        leads: Arc<dyn LeadStore>,
        dedup_capacity: usize,
    ) -> Self {
        Self {
            sessions,
            engine,
            sender,
            leads,
            recent: Mutex::new(RecentIds::new(dedup_capacity)),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Process one inbound event end to end.
    pub async fn handle(&self, event: InboundEvent) -> HandleOutcome {
        {
            let mut recent = self.recent.lock().await;
            if !recent.insert(&event.message_id) {
                debug!(
                    message_id = %event.message_id,
                    remembered = recent.len(),
                    "Duplicate delivery skipped"
                );
                return HandleOutcome::Duplicate;
            }
        }

        let mut guard = self.sessions.lock(&event.sender).await;
        let transition = self.engine.step(&guard, &event).await;

        let mut sent = 0;
        for message in &transition.messages {
            match self.sender.send(&event.sender, message).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(
                        sender = %event.sender,
                        kind = message.kind(),
                        error = %e,
                        "Reply delivery failed, dropping remaining replies"
                    );
                    break;
                }
            }
        }

        let mut lead_recorded = false;
        if let Some(lead) = &transition.lead {
            match self.leads.record(lead).await {
                Ok(()) => {
                    lead_recorded = true;
                    info!(
                        lead_id = %lead.id,
                        phone = %lead.phone,
                        category = %lead.category,
                        machine = %lead.machine,
                        "Lead recorded"
                    );
                }
                Err(e) => error!(
                    lead_id = %lead.id,
                    phone = %lead.phone,
                    error = %e,
                    "Failed to record lead"
                ),
            }
        }

        if transition.advanced(&guard) {
            info!(
                sender = %event.sender,
                from = %guard.state,
                to = %transition.session.state,
                "Conversation advanced"
            );
        }
        let state = transition.session.state;
        *guard = transition.session;

        HandleOutcome::Processed {
            state,
            sent,
            lead_recorded,
        }
    }

    /// Parse a webhook body and handle its events in order. Returns the
    /// number of events processed (duplicates excluded).
    pub async fn handle_envelope(&self, body: &[u8]) -> Result<usize, WebhookError> {
        let events = parse_envelope(body)?;
        let mut processed = 0;
        for event in events {
            if matches!(self.handle(event).await, HandleOutcome::Processed { .. }) {
                processed += 1;
            }
        }
        Ok(processed)
    }
}
