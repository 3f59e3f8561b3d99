//! Per-user conversation history.
//!
//! Every user gets an append-only log of turns. Only the render window is
//! bounded; the stored log grows until the user's history is cleared.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Marker appended after the rendered turns so the backend answers as the assistant.
pub const ASSISTANT_MARKER: &str = "Assistant:";

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when the turn is rendered into a prompt.
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Bot",
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    fn render(&self) -> String {
        format!("{}: {}", self.role.label(), self.text)
    }
}

/// Conversation logs keyed by user id.
#[derive(Debug, Default)]
pub struct HistoryBuffer {
    logs: HashMap<String, Vec<Turn>>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn to the user's log, creating the log on first use.
    pub fn append(&mut self, user_id: &str, role: Role, text: impl Into<String>) {
        self.logs
            .entry(user_id.to_string())
            .or_default()
            .push(Turn::new(role, text));
    }

    /// Render the last `window` turns oldest-first, one `"<Role>: <text>"` line
    /// each, followed by [`ASSISTANT_MARKER`].
    pub fn render(&self, user_id: &str, window: usize) -> String {
        let turns = self.turns(user_id);
        let start = turns.len().saturating_sub(window);

        let mut prompt = String::new();
        for turn in &turns[start..] {
            prompt.push_str(&turn.render());
            prompt.push('\n');
        }
        prompt.push_str(ASSISTANT_MARKER);
        prompt
    }

    /// Drop every turn for the user. Clearing an unknown user is a no-op.
    pub fn clear(&mut self, user_id: &str) {
        self.logs.remove(user_id);
    }

    /// All stored turns for the user, oldest-first.
    pub fn turns(&self, user_id: &str) -> &[Turn] {
        self.logs.get(user_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of stored turns for the user.
    pub fn len(&self, user_id: &str) -> usize {
        self.turns(user_id).len()
    }

    pub fn is_empty(&self, user_id: &str) -> bool {
        self.len(user_id) == 0
    }

    /// Number of users with at least one stored turn.
    pub fn user_count(&self) -> usize {
        self.logs.len()
    }
}
