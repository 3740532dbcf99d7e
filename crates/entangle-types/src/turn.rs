//! Turn submission input and lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chat::{ChatId, SenderId};
use crate::error::{TurnError, ValidationError};

/// Raw turn submission as received from a caller.
///
/// Unknown fields are rejected; all three fields are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TurnInput {
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
}

impl TurnInput {
    pub fn new(
        chat_id: impl Into<String>,
        sender_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            sender_id: sender_id.into(),
            content: content.into(),
        }
    }

    /// Validate into a [`ValidTurn`]. Whitespace-only content counts as empty.
    ///
    /// Once `chat_id` parses, later rejections still name it.
    pub fn validate(self) -> Result<ValidTurn, TurnError> {
        let chat_id = ChatId::parse(self.chat_id)?;
        let rejected = |source| TurnError::InvalidInput {
            chat_id: Some(chat_id.clone()),
            source,
        };

        let sender_id = SenderId::parse(self.sender_id).map_err(rejected)?;
        if self.content.trim().is_empty() {
            return Err(rejected(ValidationError::EmptyField("content")));
        }
        Ok(ValidTurn {
            chat_id,
            sender_id,
            content: self.content,
        })
    }
}

/// A turn that passed validation.
#[derive(Debug, Clone)]
pub struct ValidTurn {
    pub chat_id: ChatId,
    pub sender_id: SenderId,
    pub content: String,
}

/// Per-turn lifecycle.
///
/// `Received -> UserPersisted -> Completing -> AiPersisted -> Done`, or
/// `Completing -> Failed`. The assistant write always follows the user write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Received,
    UserPersisted,
    Completing,
    AiPersisted,
    Done,
    Failed,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::Received => write!(f, "received"),
            TurnState::UserPersisted => write!(f, "user_persisted"),
            TurnState::Completing => write!(f, "completing"),
            TurnState::AiPersisted => write!(f, "ai_persisted"),
            TurnState::Done => write!(f, "done"),
            TurnState::Failed => write!(f, "failed"),
        }
    }
}
