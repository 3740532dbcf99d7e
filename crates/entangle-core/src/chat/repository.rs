//! ChatRepository trait definition.
//!
//! Provides the store operations the turn orchestrator relies on: full read,
//! idempotent create, atomic append, and removal of a chat left empty by a
//! failed first append.

use entangle_types::chat::{Chat, ChatId, ChatMessage, NewMessage};
use entangle_types::error::RepositoryError;

/// Repository trait for chat and message persistence.
///
/// Implementations live in entangle-infra (e.g., `SqliteChatRepository`) and
/// in [`super::memory`]. Uses native async fn in traits (RPITIT, Rust 2024
/// edition).
///
/// Implementations must serialize `create_if_absent` and `append_message`
/// per `chat_id`; operations on different chats must not block each other.
pub trait ChatRepository: Send + Sync {
    /// Get a chat with its full message log in insertion order.
    fn get_chat(
        &self,
        chat_id: &ChatId,
    ) -> impl std::future::Future<Output = Result<Option<Chat>, RepositoryError>> + Send;

    /// Return the existing chat unchanged, or create an empty one.
    ///
    /// Concurrent calls for the same unknown id yield exactly one record.
    fn create_if_absent(
        &self,
        chat_id: &ChatId,
    ) -> impl std::future::Future<Output = Result<Chat, RepositoryError>> + Send;

    /// Append a message to the tail of the chat's log.
    ///
    /// Assigns `id`, the next `seq`, and a `created_at` no earlier than the
    /// previous message's. Returns `NotFound` if the chat does not exist.
    fn append_message(
        &self,
        chat_id: &ChatId,
        message: NewMessage,
    ) -> impl std::future::Future<Output = Result<ChatMessage, RepositoryError>> + Send;

    /// Delete the chat only if it holds no messages. Returns whether a record
    /// was removed; an unknown or non-empty chat is left alone.
    fn discard_if_empty(
        &self,
        chat_id: &ChatId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
