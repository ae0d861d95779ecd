//! Wire ids ↔ typed intents.
//!
//! Interactive replies carry caller-defined ids (`cat_<slug>`,
//! `machine_<slug>`, `interest_yes`, `interest_no`). This module is the only
//! place that knows those prefixes; the engine works on [`Intent`].

use super::types::{InboundEvent, InboundKind};

const CATEGORY_PREFIX: &str = "cat_";
const MACHINE_PREFIX: &str = "machine_";

pub const INTEREST_YES: &str = "interest_yes";
pub const INTEREST_NO: &str = "interest_no";

/// What the sender asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SelectCategory(String),
    SelectMachine(String),
    Interested,
    NotInterested,
    FreeText(String),
    /// A reply we can't map to anything (wrong kind, unknown id, media…).
    Unrecognized,
}

impl Intent {
    pub fn from_event(event: &InboundEvent) -> Self {
        Self::from_kind(&event.kind)
    }

    pub fn from_kind(kind: &InboundKind) -> Self {
        match kind {
            InboundKind::ListReply { id, .. } => {
                if let Some(slug) = non_empty_suffix(id, CATEGORY_PREFIX) {
                    Self::SelectCategory(slug.to_string())
                } else if let Some(slug) = non_empty_suffix(id, MACHINE_PREFIX) {
                    Self::SelectMachine(slug.to_string())
                } else {
                    Self::Unrecognized
                }
            }
            InboundKind::ButtonReply { id, .. } => match id.as_str() {
                INTEREST_YES => Self::Interested,
                INTEREST_NO => Self::NotInterested,
                _ => Self::Unrecognized,
            },
            InboundKind::Text { body } => Self::FreeText(body.trim().to_string()),
            InboundKind::Unsupported { .. } => Self::Unrecognized,
        }
    }
}

/// Row id for a category in a list message.
pub fn category_row_id(slug: &str) -> String {
    format!("{CATEGORY_PREFIX}{slug}")
}

/// Row id for a machine in a list message.
pub fn machine_row_id(slug: &str) -> String {
    format!("{MACHINE_PREFIX}{slug}")
}

fn non_empty_suffix<'a>(id: &'a str, prefix: &str) -> Option<&'a str> {
    id.strip_prefix(prefix).filter(|s| !s.is_empty())
}
