//! Read-only transcript projection.

use std::sync::Arc;

use tracing::debug;

use entangle_types::chat::{ChatId, Transcript};
use entangle_types::error::TurnError;

use super::repository::ChatRepository;

/// Reconstructs a chat's ordered message list for callers.
///
/// Reads straight from the repository; there is no cache, so every append
/// that completed before the read is visible.
pub struct TranscriptProjection<C: ChatRepository> {
    chat_repo: Arc<C>,
}

impl<C: ChatRepository> Clone for TranscriptProjection<C> {
    fn clone(&self) -> Self {
        Self {
            chat_repo: self.chat_repo.clone(),
        }
    }
}

impl<C: ChatRepository> TranscriptProjection<C> {
    pub fn new(chat_repo: Arc<C>) -> Self {
        Self { chat_repo }
    }

    /// Project the transcript of `chat_id`, or `NotFound`.
    pub async fn project(&self, chat_id: &ChatId) -> Result<Transcript, TurnError> {
        let chat = self
            .chat_repo
            .get_chat(chat_id)
            .await
            .map_err(|e| TurnError::from_repository(chat_id, e))?
            .ok_or_else(|| TurnError::NotFound {
                chat_id: chat_id.clone(),
            })?;

        debug!(chat_id = %chat_id, messages = chat.messages.len(), "Projected transcript");
        Ok(Transcript::from(&chat))
    }
}
