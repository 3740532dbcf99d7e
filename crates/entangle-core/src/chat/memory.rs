//! In-process chat store backed by a concurrent map.
//!
//! Each chat lives in one `DashMap` entry. Entry and `get_mut` guards hold
//! the shard lock for the duration of the mutation, which serializes creates
//! and appends per chat without an explicit lock table. Nothing is awaited
//! while a guard is held.

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use entangle_types::chat::{Chat, ChatId, ChatMessage, NewMessage};
use entangle_types::error::RepositoryError;

use super::repository::ChatRepository;

/// Non-durable `ChatRepository`. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryChatRepository {
    chats: DashMap<ChatId, Chat>,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chat records.
    pub fn chat_count(&self) -> usize {
        self.chats.len()
    }
}

/// Build the next message for `chat` and record its sender as a member.
fn append_to_chat(chat: &mut Chat, message: NewMessage) -> ChatMessage {
    let now = Utc::now();
    let (seq, created_at) = match chat.last_message() {
        Some(last) => (last.seq + 1, now.max(last.created_at)),
        None => (1, now),
    };

    if !message.sender_id.is_ai() && !chat.members.contains(&message.sender_id) {
        chat.members.push(message.sender_id.clone());
    }

    let persisted = ChatMessage {
        id: Uuid::now_v7(),
        chat_id: chat.chat_id.clone(),
        seq,
        sender_id: message.sender_id,
        content: message.content,
        created_at,
    };
    chat.messages.push(persisted.clone());
    persisted
}

impl ChatRepository for InMemoryChatRepository {
    async fn get_chat(&self, chat_id: &ChatId) -> Result<Option<Chat>, RepositoryError> {
        Ok(self.chats.get(chat_id).map(|chat| chat.clone()))
    }

    async fn create_if_absent(&self, chat_id: &ChatId) -> Result<Chat, RepositoryError> {
        let chat = self
            .chats
            .entry(chat_id.clone())
            .or_insert_with(|| Chat::new(chat_id.clone(), Utc::now()));
        Ok(chat.clone())
    }

    async fn append_message(
        &self,
        chat_id: &ChatId,
        message: NewMessage,
    ) -> Result<ChatMessage, RepositoryError> {
        let mut chat = self
            .chats
            .get_mut(chat_id)
            .ok_or(RepositoryError::NotFound)?;
        Ok(append_to_chat(&mut chat, message))
    }

    async fn discard_if_empty(&self, chat_id: &ChatId) -> Result<bool, RepositoryError> {
        Ok(self
            .chats
            .remove_if(chat_id, |_, chat| chat.messages.is_empty())
            .is_some())
    }
}
