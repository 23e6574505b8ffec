use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// NotificationKind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum NotificationKind {
    #[default]
    PostLiked,
    PostCommented,
    MessageReceived,
    MembershipRequested,
    MembershipApproved,
    MembershipRejected,
    PostHidden,
    ReportResolved,
}

text_enum!(NotificationKind {
    PostLiked => "post_liked",
    PostCommented => "post_commented",
    MessageReceived => "message_received",
    MembershipRequested => "membership_requested",
    MembershipApproved => "membership_approved",
    MembershipRejected => "membership_rejected",
    PostHidden => "post_hidden",
    ReportResolved => "report_resolved",
});

/// NewNotification
///
/// Insert payload. Exactly one of the subject ids is normally set, matching the kind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub actor_id: Uuid,
    pub kind: NotificationKind,
    pub post_id: Option<Uuid>,
    pub community_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
}

impl NewNotification {
    pub fn about_post(kind: NotificationKind, user_id: Uuid, actor_id: Uuid, post_id: Uuid) -> Self {
        Self { user_id, actor_id, kind, post_id: Some(post_id), ..Self::default() }
    }

    pub fn about_community(
        kind: NotificationKind,
        user_id: Uuid,
        actor_id: Uuid,
        community_id: Uuid,
    ) -> Self {
        Self { user_id, actor_id, kind, community_id: Some(community_id), ..Self::default() }
    }

    pub fn about_conversation(user_id: Uuid, actor_id: Uuid, conversation_id: Uuid) -> Self {
        Self {
            user_id,
            actor_id,
            kind: NotificationKind::MessageReceived,
            conversation_id: Some(conversation_id),
            ..Self::default()
        }
    }

    /// Users are never notified about their own actions.
    pub fn is_self_inflicted(&self) -> bool {
        self.user_id == self.actor_id
    }
}

/// NotificationResponse
///
/// A notification joined with the actor's username. The kind is sent as `type` in JSON.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct NotificationResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub kind: NotificationKind,
    pub actor_id: Uuid,
    pub actor_username: String,
    pub post_id: Option<Uuid>,
    pub community_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub is_read: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl NotificationResponse {
    /// Text shown by the service worker for this notification.
    pub fn push_payload(&self) -> PushPayload {
        let who = &self.actor_username;
        let (body, path) = match self.kind {
            NotificationKind::PostLiked => (format!("{who} liked your post"), self.post_path()),
            NotificationKind::PostCommented => {
                (format!("{who} commented on your post"), self.post_path())
            }
            NotificationKind::MessageReceived => (
                format!("New message from {who}"),
                self.conversation_id.map(|id| format!("/messages/{id}")),
            ),
            NotificationKind::MembershipRequested => (
                format!("{who} asked to join your community"),
                self.community_path(),
            ),
            NotificationKind::MembershipApproved => (
                "Your membership request was approved".to_string(),
                self.community_path(),
            ),
            NotificationKind::MembershipRejected => (
                "Your membership request was declined".to_string(),
                self.community_path(),
            ),
            NotificationKind::PostHidden => (
                "One of your posts was hidden by a moderator".to_string(),
                self.post_path(),
            ),
            NotificationKind::ReportResolved => {
                ("A report you filed was reviewed".to_string(), None)
            }
        };
        PushPayload {
            title: "Community".to_string(),
            body,
            path,
            tag: Some(self.kind.as_str().to_string()),
        }
    }

    fn post_path(&self) -> Option<String> {
        self.post_id.map(|id| format!("/posts/{id}"))
    }

    fn community_path(&self) -> Option<String> {
        self.community_id.map(|id| format!("/communities/{id}"))
    }
}

/// NotificationFilter
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct NotificationFilter {
    /// Only unread notifications when true.
    #[serde(default)]
    pub unread: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UnreadCount {
    pub count: i64,
}

// --- Web Push ---

/// PushPayload
///
/// JSON body encrypted into each Web Push message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    /// Path to open when the notification is clicked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Groups notifications of the same kind on the device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// PushSubscriptionRequest
///
/// The browser's `PushSubscription.toJSON()` output.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PushSubscriptionRequest {
    pub endpoint: String,
    #[serde(rename = "expirationTime", default)]
    pub expiration_time: Option<i64>,
    pub keys: PushSubscriptionKeys,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PushSubscriptionKeys {
    /// Client P-256 public key, base64url.
    pub p256dh: String,
    /// Client auth secret, base64url.
    pub auth: String,
}

impl PushSubscriptionRequest {
    pub fn validate(&self) -> AppResult<()> {
        let endpoint = url::Url::parse(&self.endpoint)
            .map_err(|_| AppError::validation("endpoint must be a URL"))?;
        if endpoint.scheme() != "https" {
            return Err(AppError::validation("endpoint must use https"));
        }
        if self.keys.p256dh.is_empty() || self.keys.auth.is_empty() {
            return Err(AppError::validation("subscription keys are required"));
        }
        Ok(())
    }
}

/// PushSubscription
///
/// A stored row of `push_subscriptions`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct PushSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SubscriptionResponse {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct VapidPublicKey {
    #[serde(rename = "publicKey")]
    pub public_key: String,
}
