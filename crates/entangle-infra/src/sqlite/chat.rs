//! SQLite chat repository implementation.
//!
//! Implements `ChatRepository` from `entangle-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, reads on the reader
//! pool, writes in transactions on the single writer connection.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use entangle_core::chat::repository::ChatRepository;
use entangle_types::chat::{Chat, ChatId, ChatMessage, NewMessage, SenderId};
use entangle_types::error::RepositoryError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatRepository`.
///
/// Appends are serialized by the writer pool's single connection, which
/// gives each chat a total order and keeps `seq` gap-free.
pub struct SqliteChatRepository {
    pool: DatabasePool,
}

impl SqliteChatRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ChatRow {
    chat_id: String,
    members: String,
    is_ai_chat: bool,
    created_at: String,
}

impl ChatRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            chat_id: row.try_get("chat_id")?,
            members: row.try_get("members")?,
            is_ai_chat: row.try_get("is_ai_chat")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_chat(self, messages: Vec<ChatMessage>) -> Result<Chat, RepositoryError> {
        let chat_id = ChatId::parse(self.chat_id)
            .map_err(|e| RepositoryError::Query(format!("invalid chat_id: {e}")))?;
        let raw_members: Vec<String> = serde_json::from_str(&self.members)
            .map_err(|e| RepositoryError::Query(format!("invalid members: {e}")))?;
        let members = raw_members
            .into_iter()
            .map(decode_sender)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Chat {
            chat_id,
            members,
            is_ai_chat: self.is_ai_chat,
            created_at: parse_datetime(&self.created_at)?,
            messages,
        })
    }
}

struct ChatMessageRow {
    id: String,
    chat_id: String,
    seq: i64,
    sender_id: String,
    content: String,
    created_at: String,
}

impl ChatMessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            chat_id: row.try_get("chat_id")?,
            seq: row.try_get("seq")?,
            sender_id: row.try_get("sender_id")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let chat_id = ChatId::parse(self.chat_id)
            .map_err(|e| RepositoryError::Query(format!("invalid chat_id: {e}")))?;

        Ok(ChatMessage {
            id,
            chat_id,
            seq: self.seq as u64,
            sender_id: decode_sender(self.sender_id)?,
            content: self.content,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Stored sender ids may be the reserved AI id, which `SenderId::parse` refuses.
fn decode_sender(raw: String) -> Result<SenderId, RepositoryError> {
    if raw == SenderId::AI {
        return Ok(SenderId::ai());
    }
    SenderId::parse(raw).map_err(|e| RepositoryError::Query(format!("invalid sender_id: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::Connection
        }
        other => RepositoryError::Query(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// ChatRepository implementation
// ---------------------------------------------------------------------------

impl ChatRepository for SqliteChatRepository {
    async fn get_chat(&self, chat_id: &ChatId) -> Result<Option<Chat>, RepositoryError> {
        // One read transaction so the chat row and its messages come from the
        // same snapshot.
        let mut tx = self.pool.reader.begin().await.map_err(query_error)?;

        let row = sqlx::query("SELECT * FROM chats WHERE chat_id = ?")
            .bind(chat_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let chat_row = ChatRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;

        let rows = sqlx::query("SELECT * FROM chat_messages WHERE chat_id = ? ORDER BY seq ASC")
            .bind(chat_id.as_str())
            .fetch_all(&mut *tx)
            .await
            .map_err(query_error)?;

        tx.commit().await.map_err(query_error)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let msg_row = ChatMessageRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(msg_row.into_message()?);
        }

        Ok(Some(chat_row.into_chat(messages)?))
    }

    async fn create_if_absent(&self, chat_id: &ChatId) -> Result<Chat, RepositoryError> {
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO chats (chat_id, members, is_ai_chat, created_at)
             VALUES (?, '[]', 1, ?)",
        )
        .bind(chat_id.as_str())
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if inserted.rows_affected() == 1 {
            tracing::debug!(chat_id = %chat_id, "Chat created");
        }

        self.get_chat(chat_id)
            .await?
            .ok_or_else(|| RepositoryError::Query(format!("chat {chat_id} vanished after upsert")))
    }

    async fn append_message(
        &self,
        chat_id: &ChatId,
        message: NewMessage,
    ) -> Result<ChatMessage, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        let members_json: Option<String> =
            sqlx::query_scalar("SELECT members FROM chats WHERE chat_id = ?")
                .bind(chat_id.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(query_error)?;
        let Some(members_json) = members_json else {
            return Err(RepositoryError::NotFound);
        };

        let last: Option<(i64, String)> = sqlx::query_as(
            "SELECT seq, created_at FROM chat_messages WHERE chat_id = ? ORDER BY seq DESC LIMIT 1",
        )
        .bind(chat_id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_error)?;

        let now = Utc::now();
        let (seq, created_at) = match last {
            Some((last_seq, last_created)) => {
                (last_seq as u64 + 1, now.max(parse_datetime(&last_created)?))
            }
            None => (1, now),
        };

        let persisted = ChatMessage {
            id: Uuid::now_v7(),
            chat_id: chat_id.clone(),
            seq,
            sender_id: message.sender_id,
            content: message.content,
            created_at,
        };

        sqlx::query(
            r#"INSERT INTO chat_messages (id, chat_id, seq, sender_id, content, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(persisted.id.to_string())
        .bind(chat_id.as_str())
        .bind(persisted.seq as i64)
        .bind(persisted.sender_id.as_str())
        .bind(&persisted.content)
        .bind(format_datetime(&persisted.created_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.message().contains("UNIQUE") {
                    return RepositoryError::Conflict(format!(
                        "seq {} already taken in chat {chat_id}",
                        persisted.seq
                    ));
                }
            }
            query_error(e)
        })?;

        if !persisted.sender_id.is_ai() {
            let mut members: Vec<String> = serde_json::from_str(&members_json)
                .map_err(|e| RepositoryError::Query(format!("invalid members: {e}")))?;
            if !members.iter().any(|m| m == persisted.sender_id.as_str()) {
                members.push(persisted.sender_id.as_str().to_string());
                let encoded = serde_json::to_string(&members)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                sqlx::query("UPDATE chats SET members = ? WHERE chat_id = ?")
                    .bind(encoded)
                    .bind(chat_id.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(query_error)?;
            }
        }

        tx.commit().await.map_err(query_error)?;

        Ok(persisted)
    }

    async fn discard_if_empty(&self, chat_id: &ChatId) -> Result<bool, RepositoryError> {
        let deleted = sqlx::query(
            "DELETE FROM chats
             WHERE chat_id = ?
               AND NOT EXISTS (SELECT 1 FROM chat_messages WHERE chat_id = ?)",
        )
        .bind(chat_id.as_str())
        .bind(chat_id.as_str())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if deleted.rows_affected() == 1 {
            tracing::debug!(chat_id = %chat_id, "Empty chat discarded");
        }
        Ok(deleted.rows_affected() == 1)
    }
}
