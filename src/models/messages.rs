use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use super::bounded_text;
use crate::error::{AppError, AppResult};

pub const MAX_MESSAGE_LEN: usize = 4_000;

/// Conversation
///
/// A direct conversation between two distinct users, stored with `user_a < user_b`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Conversation {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub last_message_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    /// The participant that is not `user_id`.
    pub fn other_participant(&self, user_id: Uuid) -> Uuid {
        if self.user_a == user_id {
            self.user_b
        } else {
            self.user_a
        }
    }
}

/// Orders a pair of distinct users the way `conversations` stores them.
pub fn conversation_pair(a: Uuid, b: Uuid) -> AppResult<(Uuid, Uuid)> {
    if a == b {
        return Err(AppError::validation("cannot start a conversation with yourself"));
    }
    Ok(if a < b { (a, b) } else { (b, a) })
}

/// ConversationSummary
///
/// One entry of the inbox, seen from the requesting user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub other_user_id: Uuid,
    pub other_username: String,
    pub last_message: Option<String>,
    #[ts(type = "string")]
    pub last_message_at: DateTime<Utc>,
    pub unread_count: i64,
}

/// Message
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct StartConversationRequest {
    pub recipient_id: Uuid,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SendMessageRequest {
    pub body: String,
}

pub fn validate_message_body(body: &str) -> AppResult<String> {
    bounded_text("body", body, 1, MAX_MESSAGE_LEN)
}

/// Response of `POST /conversations`: the conversation and the first message.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ConversationStarted {
    pub conversation: Conversation,
    pub message: Message,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MarkedRead {
    pub updated: u64,
}
