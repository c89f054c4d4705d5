//! Conversation types for chat sessions.
//!
//! A conversation is an append-only sequence of [`Turn`]s. Turns are
//! never edited in place; the context-window manager only drops whole
//! turns from the active window when the token budget is exceeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation participant role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Instructions and context pinned by the application.
    System,
    /// Input from the human user.
    User,
    /// Responses from the model.
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced this turn.
    pub role: Role,
    /// Text content of the turn.
    pub content: String,
    /// When the turn was appended to the conversation.
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Creates a turn with the given role, stamped now.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Creates a system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Creates a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Returns `true` for system turns.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_roles() {
        assert_eq!(Turn::system("s").role, Role::System);
        assert_eq!(Turn::user("u").role, Role::User);
        assert_eq!(Turn::assistant("a").role, Role::Assistant);
    }

    #[test]
    fn is_system() {
        assert!(Turn::system("pinned").is_system());
        assert!(!Turn::user("hello").is_system());
    }

    #[test]
    fn serde_round_trip() {
        let turn = Turn::user("hello");
        let json = serde_json::to_string(&turn).unwrap();
        let back: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(turn, back);
    }
}
