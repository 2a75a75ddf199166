//! Message types for octool's conversation history.
//!
//! [`Turn`] is what the history manager stores and persists. [`ChatMessage`]
//! is the wire shape sent to an OpenAI-compatible provider; turns are
//! converted to it when the outgoing context is built.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tokens;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Compressed stand-in for earlier turns. At most one per history.
    Summary,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Summary => write!(f, "summary"),
        }
    }
}

/// Bookkeeping attached to a summary turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryMeta {
    /// Tokens of the turns the summary replaced.
    pub original_tokens: usize,
    /// Tokens of the summary itself.
    pub summarized_tokens: usize,
    /// Number of turns folded into the summary, including a previous summary.
    pub turns_replaced: usize,
    /// 1 for the first compression of a history, 2 for the next, ...
    pub ordinal: usize,
    /// Model that produced the summary.
    #[serde(default)]
    pub model: String,
}

impl SummaryMeta {
    /// `summarized / original`; 0 when nothing was replaced.
    pub fn compression_ratio(&self) -> f64 {
        if self.original_tokens == 0 {
            0.0
        } else {
            self.summarized_tokens as f64 / self.original_tokens as f64
        }
    }
}

/// One entry in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Token estimate, computed once when the turn is created.
    pub tokens: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryMeta>,
}

impl Turn {
    /// Creates a turn stamped with the current time and an estimated token count.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        let content = content.into();
        let tokens = tokens::message_tokens(&content);
        Self {
            role,
            content,
            timestamp: Utc::now(),
            tokens,
            summary: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Builds the single summary turn produced by compression.
    pub fn summary(content: impl Into<String>, meta: SummaryMeta) -> Self {
        let mut turn = Self::new(Role::Summary, content);
        turn.summary = Some(meta);
        turn
    }

    /// Overrides the token estimate.
    pub fn with_tokens(mut self, tokens: usize) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn is_summary(&self) -> bool {
        self.role == Role::Summary
    }
}

/// Role of a message on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A message in an OpenAI-compatible chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Turn> for ChatMessage {
    /// Summaries travel as system context ahead of the verbatim turns.
    fn from(turn: &Turn) -> Self {
        let role = match turn.role {
            Role::User => ChatRole::User,
            Role::Assistant => ChatRole::Assistant,
            Role::Summary => ChatRole::System,
        };
        Self {
            role,
            content: turn.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_role_does_not_deserialize() {
        let line = r#"{"role":"system","content":"x","timestamp":"2024-03-09T14:05:07Z","tokens":1}"#;
        assert!(serde_json::from_str::<Turn>(line).is_err());
        let line = r#"{"role":"assistant","content":"x","timestamp":"2024-03-09T14:05:07Z","tokens":1}"#;
        assert_eq!(serde_json::from_str::<Turn>(line).unwrap().role, Role::Assistant);
    }

    #[test]
    fn test_turn_serializes_lowercase_role_and_skips_empty_meta() {
        let turn = Turn::user("hi").with_tokens(7);
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["tokens"], 7);
        assert!(json.get("summary").is_none());
    }

    #[test]
    fn test_summary_turn_maps_to_system_message() {
        let meta = SummaryMeta {
            original_tokens: 400,
            summarized_tokens: 100,
            turns_replaced: 5,
            ordinal: 1,
            model: "m".into(),
        };
        let turn = Turn::summary("earlier: greetings", meta.clone());
        assert!(turn.is_summary());
        assert_eq!(meta.compression_ratio(), 0.25);

        let msg = ChatMessage::from(&turn);
        assert_eq!(msg.role, ChatRole::System);
        assert_eq!(msg.content, "earlier: greetings");
    }
}
