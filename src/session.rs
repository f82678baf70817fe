//! Conversation records: turns, sessions, and the cached slot snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mapping from slot key to extracted value. Every schema key is present;
/// `None` means not yet collected.
pub type SlotValues = BTreeMap<String, Option<String>>;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message in a conversation. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Phase of one intake conversation.
///
/// `ReadyToFinalize` is terminal for the conversational phase; a separate
/// analysis step consumes the finalized transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    GatheringInfo,
    ReadyToFinalize,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ReadyToFinalize)
    }
}

/// The durable record of one intake conversation.
///
/// Turn order is the true conversation order: turns are append-only, never
/// deleted or reordered. `slot_values` is a cached snapshot derivable from
/// the turn history, kept for convenience; it is not the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub turns: Vec<Turn>,
    pub slot_values: SlotValues,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A fresh, empty session under the given id.
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            turns: Vec::new(),
            slot_values: SlotValues::new(),
            state: SessionState::GatheringInfo,
            created_at: now,
            updated_at: now,
        }
    }

    /// Generate a fresh session id ("conv_" + 12 hex chars).
    pub fn new_id() -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("conv_{}", &hex[..12])
    }

    /// Append a turn and bump `updated_at`.
    pub fn append(&mut self, turn: Turn) {
        self.updated_at = Utc::now();
        self.turns.push(turn);
    }

    /// Concatenation of all user turn text, oldest first.
    pub fn user_text(&self) -> String {
        self.turns
            .iter()
            .filter(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Content of the most recent assistant turn, if any.
    pub fn last_assistant(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant)
            .map(|t| t.content.as_str())
    }

    /// The newest turns whose combined content fits in `char_budget`,
    /// oldest first.
    ///
    /// Walks backward from the most recent turn and stops before the turn
    /// that would exceed the budget, so requests to the LLM step stay
    /// bounded regardless of conversation length. Long conversations lose
    /// their early context; that is the accepted trade.
    pub fn trimmed_history(&self, char_budget: usize) -> Vec<&Turn> {
        let mut used = 0usize;
        let mut kept: Vec<&Turn> = Vec::new();
        for turn in self.turns.iter().rev() {
            let len = turn.content.chars().count();
            if used + len > char_budget {
                break;
            }
            used += len;
            kept.push(turn);
        }
        kept.reverse();
        kept
    }
}
