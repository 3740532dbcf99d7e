//! Chat, message, and transcript types for Entangle.
//!
//! A chat is an append-only log of messages keyed by a caller-supplied
//! `chat_id`. Messages are ordered by their per-chat `seq`; insertion order
//! is the authoritative conversation order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

use crate::error::ValidationError;

/// Caller-supplied, globally unique chat identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    /// Parse a chat id, rejecting empty or whitespace-only values.
    pub fn parse(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ValidationError::EmptyField("chat_id"));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a message author.
///
/// Either a caller-supplied participant id or the reserved [`SenderId::AI`]
/// sentinel. Callers can never claim the sentinel: [`SenderId::parse`]
/// rejects it, and only [`SenderId::ai`] constructs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderId(String);

impl SenderId {
    /// Reserved sender id of the AI participant.
    pub const AI: &'static str = "ai";

    /// Parse a caller-supplied sender id.
    pub fn parse(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ValidationError::EmptyField("sender_id"));
        }
        if raw == Self::AI {
            return Err(ValidationError::ReservedSender(raw));
        }
        Ok(Self(raw))
    }

    /// The AI participant.
    pub fn ai() -> Self {
        Self(Self::AI.to_string())
    }

    pub fn is_ai(&self) -> bool {
        self.0 == Self::AI
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message to be appended. The store assigns `id`, `seq`, and `created_at`.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: SenderId,
    pub content: String,
}

impl NewMessage {
    pub fn user(sender_id: SenderId, content: impl Into<String>) -> Self {
        Self {
            sender_id,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            sender_id: SenderId::ai(),
            content: content.into(),
        }
    }
}

/// A persisted, immutable message within a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_id: ChatId,
    /// 1-based position within the chat.
    pub seq: u64,
    pub sender_id: SenderId,
    pub content: String,
    /// Assigned at persistence; never decreases within a chat.
    pub created_at: DateTime<Utc>,
}

/// A conversation: chat metadata plus its full message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub chat_id: ChatId,
    /// Distinct human senders in first-seen order.
    pub members: Vec<SenderId>,
    pub is_ai_chat: bool,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
}

impl Chat {
    /// An empty AI chat, as created on the first message for an unknown id.
    pub fn new(chat_id: ChatId, created_at: DateTime<Utc>) -> Self {
        Self {
            chat_id,
            members: Vec::new(),
            is_ai_chat: true,
            created_at,
            messages: Vec::new(),
        }
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

/// One transcript line as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub sender_id: SenderId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ChatMessage> for TranscriptEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            sender_id: message.sender_id.clone(),
            content: message.content.clone(),
            created_at: message.created_at,
        }
    }
}

/// The ordered message list of a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub chat_id: ChatId,
    pub messages: Vec<TranscriptEntry>,
}

impl From<&Chat> for Transcript {
    fn from(chat: &Chat) -> Self {
        Self {
            chat_id: chat.chat_id.clone(),
            messages: chat.messages.iter().map(TranscriptEntry::from).collect(),
        }
    }
}
