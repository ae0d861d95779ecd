//! Conversation state machine states and the per-sender session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a sender is in the lead-capture flow.
///
/// Progresses: Start → CategoryChosen → MachineChosen → InterestConfirmed.
/// Declining interest returns to Start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    /// No category chosen yet.
    Start,
    /// Category selected, machine list shown.
    CategoryChosen,
    /// Machine selected, interest buttons shown.
    MachineChosen,
    /// Lead recorded for the current inquiry.
    InterestConfirmed,
}

impl ConversationState {
    pub const ALL: [ConversationState; 4] = [
        Self::Start,
        Self::CategoryChosen,
        Self::MachineChosen,
        Self::InterestConfirmed,
    ];

    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: ConversationState) -> bool {
        use ConversationState::*;
        matches!(
            (self, target),
            (Start, CategoryChosen)
                | (CategoryChosen, MachineChosen)
                | (MachineChosen, InterestConfirmed)
                | (MachineChosen, Start)
                | (InterestConfirmed, CategoryChosen)
        )
    }

    /// Whether a category selection is accepted in this state.
    pub fn accepts_category(&self) -> bool {
        matches!(self, Self::Start | Self::InterestConfirmed)
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::Start
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Start => "START",
            Self::CategoryChosen => "CATEGORY_CHOSEN",
            Self::MachineChosen => "MACHINE_CHOSEN",
            Self::InterestConfirmed => "INTEREST_CONFIRMED",
        };
        write!(f, "{s}")
    }
}

/// Conversation state for one sender, keyed by phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub sender: String,
    pub state: ConversationState,
    /// Selected category slug.
    pub category: Option<String>,
    /// Selected machine slug.
    pub machine: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session in `Start`.
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            state: ConversationState::Start,
            category: None,
            machine: None,
            updated_at: Utc::now(),
        }
    }

    /// Whether the session has seen no activity for longer than `idle`.
    pub fn is_idle(&self, idle: std::time::Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(idle) {
            Ok(idle) => now.signed_duration_since(self.updated_at) > idle,
            // Out of chrono's range: never idle.
            Err(_) => false,
        }
    }

    /// Move to `category`, clearing any machine selection.
    pub(crate) fn choose_category(&mut self, slug: &str) {
        self.state = ConversationState::CategoryChosen;
        self.category = Some(slug.to_string());
        self.machine = None;
    }

    pub(crate) fn choose_machine(&mut self, slug: &str) {
        self.state = ConversationState::MachineChosen;
        self.machine = Some(slug.to_string());
    }

    pub(crate) fn confirm_interest(&mut self) {
        self.state = ConversationState::InterestConfirmed;
    }

    /// Back to `Start` with no selections.
    pub(crate) fn reset(&mut self) {
        self.state = ConversationState::Start;
        self.category = None;
        self.machine = None;
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn valid_transitions() {
        use ConversationState::*;
        let transitions = [
            (Start, CategoryChosen),
            (CategoryChosen, MachineChosen),
            (MachineChosen, InterestConfirmed),
            (MachineChosen, Start),
            (InterestConfirmed, CategoryChosen),
        ];
        for (from, to) in transitions {
            assert!(from.can_transition_to(to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn invalid_transitions() {
        use ConversationState::*;
        assert!(!Start.can_transition_to(MachineChosen));
        assert!(!Start.can_transition_to(InterestConfirmed));
        assert!(!CategoryChosen.can_transition_to(InterestConfirmed));
        assert!(!CategoryChosen.can_transition_to(CategoryChosen));
        assert!(!InterestConfirmed.can_transition_to(Start));
    }

    #[test]
    fn display_matches_serde() {
        for state in ConversationState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(format!("\"{state}\""), json, "Display and serde should match for {state:?}");
        }
    }

    #[test]
    fn new_session_starts_clean() {
        let session = Session::new("111");
        assert_eq!(session.sender, "111");
        assert_eq!(session.state, ConversationState::Start);
        assert!(session.category.is_none());
        assert!(session.machine.is_none());
    }

    #[test]
    fn choosing_category_clears_machine() {
        let mut session = Session::new("111");
        session.choose_category("mixing");
        session.choose_machine("planetary_mixer");
        session.confirm_interest();
        session.choose_category("packaging");
        assert_eq!(session.state, ConversationState::CategoryChosen);
        assert_eq!(session.category.as_deref(), Some("packaging"));
        assert!(session.machine.is_none());
    }

    #[test]
    fn idle_detection() {
        let mut session = Session::new("111");
        let now = Utc::now();
        session.updated_at = now - chrono::Duration::hours(2);
        assert!(session.is_idle(Duration::from_secs(3600), now));
        assert!(!session.is_idle(Duration::from_secs(3 * 3600), now));
    }
}
