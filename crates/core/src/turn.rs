//! Turn and Session domain types.
//!
//! These are the core value objects that flow through the system:
//! the user submits a sentence → the pipeline transforms it → both ends of
//! the exchange land in the session history, in order, forever.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The end user's original sentence
    User,
    /// The transformed persona utterance
    Persona,
}

/// A single message in the conversation history.
///
/// Immutable once created — the history never rewrites a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who said it
    pub speaker: Speaker,

    /// The text content
    pub text: String,

    /// Timestamp
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    /// Create a new user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    /// Create a new persona turn.
    pub fn persona(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Persona,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// One two-party conversation: an append-only sequence of turns plus the
/// not-yet-submitted input line.
///
/// Insertion order is the display order. Nothing in the core deletes or
/// reorders existing turns; `push` is the only mutation path for history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    /// Ordered turns, oldest first
    pub turns: Vec<ChatTurn>,

    /// Raw input the rendering collaborator has staged but not submitted.
    /// Owned here — the UI treats it as a one-way display value.
    #[serde(default)]
    pub pending_input: String,
}

impl Session {
    /// Create a new empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn to the history.
    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    /// Number of turns in the history.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The most recent turn, if any.
    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_turn() {
        let turn = ChatTurn::user("おはよう！");
        assert_eq!(turn.speaker, Speaker::User);
        assert_eq!(turn.text, "おはよう！");
    }

    #[test]
    fn session_appends_in_order() {
        let mut session = Session::new();
        session.push(ChatTurn::user("first"));
        session.push(ChatTurn::persona("second"));
        assert_eq!(session.len(), 2);
        assert_eq!(session.turns[0].speaker, Speaker::User);
        assert_eq!(session.turns[1].speaker, Speaker::Persona);
        assert_eq!(session.last().unwrap().text, "second");
    }

    #[test]
    fn turn_serialization_roundtrip() {
        let turn = ChatTurn::persona("ヤッホー💕");
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains("\"persona\""));
        let back: ChatTurn = serde_json::from_str(&json).unwrap();
        assert_eq!(back.text, "ヤッホー💕");
        assert_eq!(back.speaker, Speaker::Persona);
    }

    #[test]
    fn session_starts_empty() {
        let session = Session::new();
        assert!(session.is_empty());
        assert!(session.pending_input.is_empty());
        assert!(session.last().is_none());
    }
}
