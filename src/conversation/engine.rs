//! Conversation engine — (session, inbound event) → transition.
//!
//! The engine never stores anything. It reads the catalog, decides the next
//! session value and the replies, and hands back an optional [`Lead`] for the
//! caller to record.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::{Category, CatalogLookup, Machine};
use crate::error::CatalogError;
use crate::leads::Lead;

use super::intent::Intent;
use super::replies::Replies;
use super::state::{ConversationState, Session};
use super::types::{InboundEvent, OutboundMessage};

/// Result of one engine step.
#[derive(Debug, Clone)]
pub struct Transition {
    /// The session to persist.
    pub session: Session,
    /// Replies, in delivery order.
    pub messages: Vec<OutboundMessage>,
    /// Set when the sender confirmed interest.
    pub lead: Option<Lead>,
}

impl Transition {
    /// Whether the state moved.
    pub fn advanced(&self, from: &Session) -> bool {
        self.session.state != from.state
    }
}

/// Drives the lead-capture state machine.
pub struct ConversationEngine {
    catalog: Arc<dyn CatalogLookup>,
    replies: Replies,
}

impl ConversationEngine {
    pub fn new(catalog: Arc<dyn CatalogLookup>, replies: Replies) -> Self {
        Self { catalog, replies }
    }

    /// Compute the transition for `event` against `session`.
    pub async fn step(&self, session: &Session, event: &InboundEvent) -> Transition {
        let intent = Intent::from_event(event);
        debug!(
            sender = %session.sender,
            state = %session.state,
            intent = ?intent,
            "Conversation step"
        );

        let mut next = session.clone();
        let mut lead = None;

        let messages = match (session.state, intent) {
            (state, Intent::SelectCategory(slug)) if state.accepts_category() => {
                self.on_category(&mut next, &slug).await
            }
            (ConversationState::CategoryChosen, Intent::SelectMachine(slug)) => {
                self.on_machine(&mut next, &slug).await
            }
            (ConversationState::MachineChosen, Intent::Interested) => {
                match self.selected(session).await {
                    Ok(Some((category, machine))) => {
                        next.confirm_interest();
                        lead = Some(Lead::new(
                            &session.sender,
                            event.sender_name.clone(),
                            (category.slug.as_str(), category.name.as_str()),
                            (machine.slug.as_str(), machine.name.as_str()),
                        ));
                        vec![self.replies.confirmation(&machine), self.replies.thank_you()]
                    }
                    Ok(None) => vec![self.replies.unknown_option()],
                    Err(e) => self.catalog_failure(session, e),
                }
            }
            (ConversationState::MachineChosen, Intent::NotInterested) => {
                next.reset();
                vec![self.replies.close_out()]
            }
            _ => self.fallback(session).await,
        };

        next.touch();
        Transition {
            session: next,
            messages,
            lead,
        }
    }

    async fn on_category(&self, next: &mut Session, slug: &str) -> Vec<OutboundMessage> {
        match self.catalog.category(slug).await {
            Ok(Some(category)) if category.machines.is_empty() => {
                vec![self.replies.no_machines(&category)]
            }
            Ok(Some(category)) => {
                next.choose_category(&category.slug);
                vec![self.replies.machine_list(&category)]
            }
            Ok(None) => {
                debug!(sender = %next.sender, category = slug, "Unknown category selected");
                vec![self.replies.unknown_option()]
            }
            Err(e) => self.catalog_failure(next, e),
        }
    }

    async fn on_machine(&self, next: &mut Session, slug: &str) -> Vec<OutboundMessage> {
        let Some(category) = next.category.clone() else {
            return vec![self.replies.unknown_option()];
        };

        match self.catalog.machine(&category, slug).await {
            Ok(Some(machine)) => {
                next.choose_machine(&machine.slug);
                vec![self.replies.interest_buttons(&machine)]
            }
            Ok(None) => {
                debug!(
                    sender = %next.sender,
                    category = %category,
                    machine = slug,
                    "Unknown machine selected"
                );
                vec![self.replies.unknown_option()]
            }
            Err(e) => self.catalog_failure(next, e),
        }
    }

    /// Help text, followed by the menu that is valid in the current state.
    async fn fallback(&self, session: &Session) -> Vec<OutboundMessage> {
        let mut messages = vec![self.replies.help(session.state)];

        let reprompt = match session.state {
            ConversationState::Start | ConversationState::InterestConfirmed => self
                .catalog
                .categories()
                .await
                .map(|cats| (!cats.is_empty()).then(|| self.replies.category_list(&cats))),
            ConversationState::CategoryChosen => match session.category.as_deref() {
                Some(slug) => self
                    .catalog
                    .category(slug)
                    .await
                    .map(|c| c.filter(|c| !c.machines.is_empty()))
                    .map(|c| c.map(|c| self.replies.machine_list(&c))),
                None => Ok(None),
            },
            ConversationState::MachineChosen => self
                .selected(session)
                .await
                .map(|sel| sel.map(|(_, m)| self.replies.interest_buttons(&m))),
        };

        match reprompt {
            Ok(Some(menu)) => messages.push(menu),
            Ok(None) => {}
            Err(e) => warn!(sender = %session.sender, error = %e, "Menu re-prompt lookup failed"),
        }
        messages
    }

    /// The category and machine recorded on the session, if both still exist.
    async fn selected(
        &self,
        session: &Session,
    ) -> Result<Option<(Category, Machine)>, CatalogError> {
        let (Some(cat_slug), Some(machine_slug)) = (&session.category, &session.machine) else {
            return Ok(None);
        };
        let Some(category) = self.catalog.category(cat_slug).await? else {
            return Ok(None);
        };
        let machine = category
            .machines
            .iter()
            .find(|m| &m.slug == machine_slug)
            .cloned();
        Ok(machine.map(|m| (category, m)))
    }

    fn catalog_failure(&self, session: &Session, error: CatalogError) -> Vec<OutboundMessage> {
        warn!(
            sender = %session.sender,
            state = %session.state,
            error = %error,
            "Catalog lookup failed"
        );
        vec![self.replies.apology()]
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::conversation::types::InboundKind;

    fn engine() -> ConversationEngine {
        ConversationEngine::new(Arc::new(StaticCatalog::builtin()), Replies::new("Acme"))
    }

    fn list(id: &str) -> InboundEvent {
        InboundEvent::new(
            "wamid.1",
            "111",
            InboundKind::ListReply {
                id: id.into(),
                title: "x".into(),
            },
        )
    }

    fn button(id: &str) -> InboundEvent {
        InboundEvent::new(
            "wamid.1",
            "111",
            InboundKind::ButtonReply {
                id: id.into(),
                title: "x".into(),
            },
        )
    }

    fn text(sender: &str, body: &str) -> InboundEvent {
        InboundEvent::new("wamid.1", sender, InboundKind::Text { body: body.into() })
    }

    fn session_in(state: ConversationState) -> Session {
        let mut s = Session::new("111");
        match state {
            ConversationState::Start => {}
            ConversationState::CategoryChosen => s.choose_category("mixing"),
            ConversationState::MachineChosen => {
                s.choose_category("mixing");
                s.choose_machine("planetary_mixer");
            }
            ConversationState::InterestConfirmed => {
                s.choose_category("mixing");
                s.choose_machine("planetary_mixer");
                s.confirm_interest();
            }
        }
        s
    }

    fn text_body(msg: &OutboundMessage) -> &str {
        match msg {
            OutboundMessage::Text { body } => body.as_str(),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn category_selection_lists_machines() {
        let t = engine()
            .step(&session_in(ConversationState::Start), &list("cat_mixing"))
            .await;

        assert_eq!(t.session.state, ConversationState::CategoryChosen);
        assert_eq!(t.session.category.as_deref(), Some("mixing"));
        assert_eq!(t.messages.len(), 1);
        match &t.messages[0] {
            OutboundMessage::List { rows, .. } => {
                let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
                assert!(ids.contains(&"machine_planetary_mixer"));
                assert!(ids.iter().all(|id| id.starts_with("machine_")));
            }
            other => panic!("expected list, got {other:?}"),
        }
        assert!(t.lead.is_none());
    }

    #[tokio::test]
    async fn machine_selection_asks_interest() {
        let t = engine()
            .step(
                &session_in(ConversationState::CategoryChosen),
                &list("machine_planetary_mixer"),
            )
            .await;

        assert_eq!(t.session.state, ConversationState::MachineChosen);
        assert_eq!(t.session.machine.as_deref(), Some("planetary_mixer"));
        match &t.messages[..] {
            [OutboundMessage::Buttons { buttons, .. }] => {
                let ids: Vec<&str> = buttons.iter().map(|b| b.id.as_str()).collect();
                assert_eq!(ids, ["interest_yes", "interest_no"]);
                assert_eq!(buttons[0].title, "Yes, Interested");
                assert_eq!(buttons[1].title, "No");
            }
            other => panic!("expected buttons, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn interest_yes_confirms_and_produces_lead() {
        let event = button("interest_yes").with_sender_name("Asha");
        let t = engine()
            .step(&session_in(ConversationState::MachineChosen), &event)
            .await;

        assert_eq!(t.session.state, ConversationState::InterestConfirmed);
        assert_eq!(t.messages.len(), 2);
        assert!(text_body(&t.messages[0]).contains("Planetary Mixer"));
        assert!(text_body(&t.messages[1]).contains("Acme"));

        let lead = t.lead.expect("lead");
        assert_eq!(lead.phone, "111");
        assert_eq!(lead.customer_name.as_deref(), Some("Asha"));
        assert_eq!(lead.category, "mixing");
        assert_eq!(lead.machine, "planetary_mixer");
        assert_eq!(lead.machine_name, "Planetary Mixer");
    }

    #[tokio::test]
    async fn interest_no_resets_to_start() {
        let t = engine()
            .step(&session_in(ConversationState::MachineChosen), &button("interest_no"))
            .await;

        assert_eq!(t.session.state, ConversationState::Start);
        assert!(t.session.category.is_none());
        assert!(t.session.machine.is_none());
        assert_eq!(t.messages.len(), 1);
        assert!(t.lead.is_none());
    }

    #[tokio::test]
    async fn unseen_sender_free_text_gets_help() {
        let session = Session::new("222");
        let t = engine().step(&session, &text("222", "hello")).await;

        assert_eq!(t.session.state, ConversationState::Start);
        assert!(text_body(&t.messages[0]).contains("choose a machine category"));
        // Followed by the category menu.
        assert!(matches!(t.messages[1], OutboundMessage::List { .. }));
    }

    #[tokio::test]
    async fn unknown_category_holds_state() {
        let t = engine()
            .step(&session_in(ConversationState::Start), &list("cat_unknown"))
            .await;

        assert_eq!(t.session.state, ConversationState::Start);
        assert_eq!(t.messages.len(), 1);
        assert!(text_body(&t.messages[0]).contains("no longer available"));
    }

    #[tokio::test]
    async fn machine_from_other_category_is_rejected() {
        let t = engine()
            .step(
                &session_in(ConversationState::CategoryChosen),
                &list("machine_deck_oven"),
            )
            .await;

        assert_eq!(t.session.state, ConversationState::CategoryChosen);
        assert!(t.session.machine.is_none());
        assert!(text_body(&t.messages[0]).contains("no longer available"));
    }

    #[tokio::test]
    async fn out_of_order_reply_falls_back() {
        // Interest button while still choosing a machine.
        let session = session_in(ConversationState::CategoryChosen);
        let t = engine().step(&session, &button("interest_yes")).await;

        assert_eq!(t.session.state, ConversationState::CategoryChosen);
        assert_eq!(t.session.category, session.category);
        assert!(t.lead.is_none());
        assert!(text_body(&t.messages[0]).contains("pick a machine"));
        assert!(matches!(t.messages[1], OutboundMessage::List { .. }));
    }

    #[tokio::test]
    async fn category_reply_mid_flow_falls_back() {
        let t = engine()
            .step(&session_in(ConversationState::MachineChosen), &list("cat_packaging"))
            .await;

        assert_eq!(t.session.state, ConversationState::MachineChosen);
        assert_eq!(t.session.category.as_deref(), Some("mixing"));
        assert!(matches!(t.messages[1], OutboundMessage::Buttons { .. }));
    }

    #[tokio::test]
    async fn new_inquiry_after_confirmation() {
        let t = engine()
            .step(
                &session_in(ConversationState::InterestConfirmed),
                &list("cat_packaging"),
            )
            .await;

        assert_eq!(t.session.state, ConversationState::CategoryChosen);
        assert_eq!(t.session.category.as_deref(), Some("packaging"));
        assert!(t.session.machine.is_none());
    }

    #[tokio::test]
    async fn state_always_in_enumerated_set() {
        let events = [
            list("cat_mixing"),
            list("cat_unknown"),
            list("machine_planetary_mixer"),
            list("machine_nope"),
            button("interest_yes"),
            button("interest_no"),
            button("other"),
            text("111", "hi"),
        ];
        let engine = engine();
        for state in ConversationState::ALL {
            for event in &events {
                let from = session_in(state);
                let t = engine.step(&from, event).await;
                assert!(ConversationState::ALL.contains(&t.session.state));
                if t.advanced(&from) {
                    assert!(
                        from.state.can_transition_to(t.session.state),
                        "{} -> {} is not a valid transition",
                        from.state,
                        t.session.state
                    );
                }
                assert!(!t.messages.is_empty());
            }
        }
    }

    // ── Catalog failures ────────────────────────────────────────────

    struct BrokenCatalog;

    #[async_trait]
    impl CatalogLookup for BrokenCatalog {
        async fn categories(&self) -> Result<Vec<Category>, CatalogError> {
            Err(CatalogError::Unavailable("down".into()))
        }
        async fn category(&self, _slug: &str) -> Result<Option<Category>, CatalogError> {
            Err(CatalogError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn catalog_failure_apologizes_and_holds_state() {
        let engine = ConversationEngine::new(Arc::new(BrokenCatalog), Replies::default());

        for (state, event) in [
            (ConversationState::Start, list("cat_mixing")),
            (ConversationState::CategoryChosen, list("machine_planetary_mixer")),
            (ConversationState::MachineChosen, button("interest_yes")),
        ] {
            let from = session_in(state);
            let t = engine.step(&from, &event).await;
            assert_eq!(t.session.state, state);
            assert_eq!(t.messages.len(), 1);
            assert!(text_body(&t.messages[0]).contains("went wrong"));
            assert!(t.lead.is_none());
        }
    }

    #[tokio::test]
    async fn catalog_failure_during_fallback_sends_help_only() {
        let engine = ConversationEngine::new(Arc::new(BrokenCatalog), Replies::default());
        let t = engine.step(&Session::new("222"), &text("222", "hello")).await;
        assert_eq!(t.messages.len(), 1);
        assert_eq!(t.session.state, ConversationState::Start);
    }

    #[tokio::test]
    async fn empty_category_holds_state() {
        let catalog = StaticCatalog::new(vec![Category {
            slug: "soon".into(),
            name: "Coming Soon".into(),
            description: None,
            machines: vec![],
        }])
        .unwrap();
        let engine = ConversationEngine::new(Arc::new(catalog), Replies::default());
        let t = engine
            .step(&session_in(ConversationState::Start), &list("cat_soon"))
            .await;
        assert_eq!(t.session.state, ConversationState::Start);
        assert!(text_body(&t.messages[0]).contains("Coming Soon"));
    }
}
