//! Reply copy — every piece of text the bot sends lives here.

use crate::catalog::{Category, Machine};

use super::intent::{INTEREST_NO, INTEREST_YES, category_row_id, machine_row_id};
use super::state::ConversationState;
use super::types::{ListRow, OutboundMessage, ReplyButton};

/// Builds outbound messages, parameterized by the business name.
#[derive(Debug, Clone)]
pub struct Replies {
    business_name: String,
}

impl Replies {
    pub fn new(business_name: impl Into<String>) -> Self {
        Self {
            business_name: business_name.into(),
        }
    }

    /// Menu of all categories.
    pub fn category_list(&self, categories: &[Category]) -> OutboundMessage {
        OutboundMessage::List {
            header: "Our Machines".into(),
            body: "Which type of machine are you looking for? Tap below to pick a category."
                .into(),
            button: "View categories".into(),
            rows: categories
                .iter()
                .map(|c| ListRow {
                    id: category_row_id(&c.slug),
                    title: c.name.clone(),
                    description: c.description.clone(),
                })
                .collect(),
        }
    }

    /// Menu of the machines in one category.
    pub fn machine_list(&self, category: &Category) -> OutboundMessage {
        OutboundMessage::List {
            header: category.name.clone(),
            body: format!(
                "Here are our {}. Tap below to choose a machine.",
                category.name
            ),
            button: "View machines".into(),
            rows: category
                .machines
                .iter()
                .map(|m| ListRow {
                    id: machine_row_id(&m.slug),
                    title: m.name.clone(),
                    description: m.description.clone(),
                })
                .collect(),
        }
    }

    /// Yes/No question about one machine.
    pub fn interest_buttons(&self, machine: &Machine) -> OutboundMessage {
        OutboundMessage::Buttons {
            body: format!(
                "You selected *{}*. Would you like our sales team to contact you with a quote?",
                machine.name
            ),
            buttons: vec![
                ReplyButton {
                    id: INTEREST_YES.into(),
                    title: "Yes, Interested".into(),
                },
                ReplyButton {
                    id: INTEREST_NO.into(),
                    title: "No".into(),
                },
            ],
        }
    }

    pub fn confirmation(&self, machine: &Machine) -> OutboundMessage {
        OutboundMessage::text(format!(
            "✅ Great choice! We've noted your interest in the *{}*.",
            machine.name
        ))
    }

    pub fn thank_you(&self) -> OutboundMessage {
        OutboundMessage::text(format!(
            "Thank you for reaching out to {}. A sales representative will contact you shortly. \
             Send any message to browse more machines.",
            self.business_name
        ))
    }

    pub fn close_out(&self) -> OutboundMessage {
        OutboundMessage::text(
            "No problem! Feel free to message us anytime if you'd like to explore other machines.",
        )
    }

    /// Help text for input that doesn't fit the current step.
    pub fn help(&self, state: ConversationState) -> OutboundMessage {
        let body = match state {
            ConversationState::Start => {
                "Hi! 👋 Please choose a machine category from the menu to get started."
            }
            ConversationState::CategoryChosen => "Please pick a machine from the list.",
            ConversationState::MachineChosen => {
                "Please tap *Yes, Interested* or *No* to let us know."
            }
            ConversationState::InterestConfirmed => {
                "Your inquiry has been recorded. Pick a category to explore more machines."
            }
        };
        OutboundMessage::text(body)
    }

    /// The selected category or machine doesn't exist.
    pub fn unknown_option(&self) -> OutboundMessage {
        OutboundMessage::text(
            "Sorry, that option is no longer available. Please choose one from the latest menu.",
        )
    }

    pub fn no_machines(&self, category: &Category) -> OutboundMessage {
        OutboundMessage::text(format!(
            "We don't have any {} listed right now. Please pick another category.",
            category.name
        ))
    }

    /// The catalog couldn't be read.
    pub fn apology(&self) -> OutboundMessage {
        OutboundMessage::text(
            "Sorry, something went wrong on our side. Please try again in a moment.",
        )
    }
}

impl Default for Replies {
    fn default() -> Self {
        Self::new("our team")
    }
}
