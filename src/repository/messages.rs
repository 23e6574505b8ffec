use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Conversation, ConversationSummary, Message, Pagination},
};

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// `pair` must already be ordered (`pair.0 < pair.1`).
    async fn find_or_create_conversation(&self, pair: (Uuid, Uuid)) -> AppResult<Conversation>;
    async fn get_conversation(&self, id: Uuid) -> AppResult<Option<Conversation>>;
    /// The inbox of `user_id`, most recently active first.
    async fn list_conversations(&self, user_id: Uuid, page: Pagination) -> AppResult<Vec<ConversationSummary>>;
    /// Newest first.
    async fn list_messages(&self, conversation_id: Uuid, page: Pagination) -> AppResult<Vec<Message>>;
    async fn send_message(&self, conversation_id: Uuid, sender_id: Uuid, body: String) -> AppResult<Message>;
    /// Stamps `read_at` on the messages `reader_id` received. Returns how many changed.
    async fn mark_conversation_read(&self, conversation_id: Uuid, reader_id: Uuid) -> AppResult<u64>;
}

pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CONVERSATION_COLUMNS: &str = "id, user_a, user_b, created_at, last_message_at";
const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, body, created_at, read_at";

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn find_or_create_conversation(&self, (user_a, user_b): (Uuid, Uuid)) -> AppResult<Conversation> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let conversation = sqlx::query_as::<_, Conversation>(&format!(
            "INSERT INTO conversations (id, user_a, user_b) VALUES ($1, $2, $3) \
             ON CONFLICT (user_a, user_b) DO UPDATE SET user_a = EXCLUDED.user_a \
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_a)
        .bind(user_b)
        .fetch_one(&self.pool)
        .await?;
        Ok(conversation)
    }

    async fn get_conversation(&self, id: Uuid) -> AppResult<Option<Conversation>> {
        let conversation = sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(conversation)
    }

    async fn list_conversations(&self, user_id: Uuid, page: Pagination) -> AppResult<Vec<ConversationSummary>> {
        let summaries = sqlx::query_as::<_, ConversationSummary>(
            r#"
            SELECT
                c.id,
                other.id AS other_user_id,
                other.username AS other_username,
                (SELECT m.body FROM messages m
                  WHERE m.conversation_id = c.id
                  ORDER BY m.created_at DESC LIMIT 1) AS last_message,
                c.last_message_at,
                (SELECT COUNT(*) FROM messages m
                  WHERE m.conversation_id = c.id
                    AND m.sender_id <> $1
                    AND m.read_at IS NULL) AS unread_count
            FROM conversations c
            JOIN profiles other
              ON other.id = CASE WHEN c.user_a = $1 THEN c.user_b ELSE c.user_a END
            WHERE c.user_a = $1 OR c.user_b = $1
            ORDER BY c.last_message_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(summaries)
    }

    async fn list_messages(&self, conversation_id: Uuid, page: Pagination) -> AppResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(conversation_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    async fn send_message(&self, conversation_id: Uuid, sender_id: Uuid, body: String) -> AppResult<Message> {
        let mut tx = self.pool.begin().await?;

        let message = sqlx::query_as::<_, Message>(&format!(
            "INSERT INTO messages (id, conversation_id, sender_id, body) VALUES ($1, $2, $3, $4) \
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(sender_id)
        .bind(&body)
        .fetch_one(&mut *tx)
        .await?;

        let touched = sqlx::query("UPDATE conversations SET last_message_at = $2 WHERE id = $1")
            .bind(conversation_id)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        tx.commit().await?;
        Ok(message)
    }

    async fn mark_conversation_read(&self, conversation_id: Uuid, reader_id: Uuid) -> AppResult<u64> {
        let res = sqlx::query(
            "UPDATE messages SET read_at = NOW() \
             WHERE conversation_id = $1 AND sender_id <> $2 AND read_at IS NULL",
        )
        .bind(conversation_id)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }
}
