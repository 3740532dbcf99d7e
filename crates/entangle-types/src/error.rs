use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::chat::ChatId;
use crate::llm::{LlmError, UpstreamFailure};

/// Rejections of malformed turn input. Raised before any mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("sender id '{0}' is reserved")]
    ReservedSender(String),
}

/// Errors from repository operations (used by trait definitions in entangle-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Machine-readable failure category reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    UpstreamUnavailable,
    UpstreamTimeout,
    UpstreamRejected,
    StoreUnavailable,
    /// The completion succeeded but its reply could not be persisted.
    ReplyLost,
}

impl ErrorKind {
    /// Whether resubmitting the same turn can reasonably succeed.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::UpstreamUnavailable
                | ErrorKind::UpstreamTimeout
                | ErrorKind::StoreUnavailable
                | ErrorKind::ReplyLost
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidInput => write!(f, "invalid_input"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::UpstreamUnavailable => write!(f, "upstream_unavailable"),
            ErrorKind::UpstreamTimeout => write!(f, "upstream_timeout"),
            ErrorKind::UpstreamRejected => write!(f, "upstream_rejected"),
            ErrorKind::StoreUnavailable => write!(f, "store_unavailable"),
            ErrorKind::ReplyLost => write!(f, "reply_lost"),
        }
    }
}

impl From<UpstreamFailure> for ErrorKind {
    fn from(failure: UpstreamFailure) -> Self {
        match failure {
            UpstreamFailure::Unavailable => ErrorKind::UpstreamUnavailable,
            UpstreamFailure::Timeout => ErrorKind::UpstreamTimeout,
            UpstreamFailure::Rejected => ErrorKind::UpstreamRejected,
        }
    }
}

/// Failure of a turn submission or transcript read.
///
/// Every variant carries the chat id whenever the input named a valid one,
/// so the caller can re-read the transcript and decide whether to resubmit.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("invalid input: {source}")]
    InvalidInput {
        chat_id: Option<ChatId>,
        #[source]
        source: ValidationError,
    },

    #[error("chat '{chat_id}' not found")]
    NotFound { chat_id: ChatId },

    #[error("turn failed for chat '{chat_id}': {source}")]
    Upstream {
        chat_id: ChatId,
        #[source]
        source: LlmError,
    },

    #[error("store unavailable for chat '{chat_id}': {source}")]
    StoreUnavailable {
        chat_id: ChatId,
        #[source]
        source: RepositoryError,
    },

    #[error("reply for chat '{chat_id}' was generated but could not be stored: {source}")]
    ReplyLost {
        chat_id: ChatId,
        #[source]
        source: RepositoryError,
    },
}

impl From<ValidationError> for TurnError {
    fn from(source: ValidationError) -> Self {
        TurnError::InvalidInput {
            chat_id: None,
            source,
        }
    }
}

impl TurnError {
    /// Map a repository failure on `chat_id` into a turn error.
    pub fn from_repository(chat_id: &ChatId, err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => TurnError::NotFound {
                chat_id: chat_id.clone(),
            },
            other => TurnError::StoreUnavailable {
                chat_id: chat_id.clone(),
                source: other,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TurnError::InvalidInput { .. } => ErrorKind::InvalidInput,
            TurnError::NotFound { .. } => ErrorKind::NotFound,
            TurnError::Upstream { source, .. } => source.failure().into(),
            TurnError::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            TurnError::ReplyLost { .. } => ErrorKind::ReplyLost,
        }
    }

    /// The chat the failure refers to, if the input named a valid one.
    pub fn chat_id(&self) -> Option<&ChatId> {
        match self {
            TurnError::InvalidInput { chat_id, .. } => chat_id.as_ref(),
            TurnError::NotFound { chat_id }
            | TurnError::Upstream { chat_id, .. }
            | TurnError::StoreUnavailable { chat_id, .. }
            | TurnError::ReplyLost { chat_id, .. } => Some(chat_id),
        }
    }
}
