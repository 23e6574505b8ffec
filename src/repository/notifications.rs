use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{NewNotification, NotificationResponse, Pagination, PushSubscription, PushSubscriptionRequest},
};

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    // --- In-app notifications ---
    async fn create_notification(&self, notification: NewNotification) -> AppResult<NotificationResponse>;
    /// Newest first, optionally unread only.
    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        page: Pagination,
    ) -> AppResult<Vec<NotificationResponse>>;
    async fn unread_count(&self, user_id: Uuid) -> AppResult<i64>;
    /// Recipient-only; `false` when the notification is missing or not theirs.
    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> AppResult<bool>;
    async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64>;

    // --- Push subscriptions ---
    /// Upserts by endpoint, so a browser re-subscribing under another account moves over.
    async fn save_subscription(&self, user_id: Uuid, subscription: &PushSubscriptionRequest) -> AppResult<Uuid>;
    async fn list_subscriptions(&self, user_id: Uuid) -> AppResult<Vec<PushSubscription>>;
    async fn delete_subscription(&self, id: Uuid, user_id: Uuid) -> AppResult<bool>;
    /// Used when the push service reports the endpoint as gone.
    async fn delete_subscription_by_endpoint(&self, endpoint: &str) -> AppResult<bool>;
}

pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const NOTIFICATION_SELECT: &str = r#"
    SELECT n.id, n.kind, n.actor_id, pr.username AS actor_username,
           n.post_id, n.community_id, n.conversation_id, n.is_read, n.created_at
    FROM notifications n
    JOIN profiles pr ON pr.id = n.actor_id
"#;

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn create_notification(&self, notification: NewNotification) -> AppResult<NotificationResponse> {
        let created = sqlx::query_as::<_, NotificationResponse>(
            r#"
            WITH n AS (
                INSERT INTO notifications (id, user_id, actor_id, kind, post_id, community_id, conversation_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
            )
            SELECT n.id, n.kind, n.actor_id, pr.username AS actor_username,
                   n.post_id, n.community_id, n.conversation_id, n.is_read, n.created_at
            FROM n
            JOIN profiles pr ON pr.id = n.actor_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(notification.actor_id)
        .bind(notification.kind.as_str())
        .bind(notification.post_id)
        .bind(notification.community_id)
        .bind(notification.conversation_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        page: Pagination,
    ) -> AppResult<Vec<NotificationResponse>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(NOTIFICATION_SELECT);
        builder.push(" WHERE n.user_id = ").push_bind(user_id);
        if unread_only {
            builder.push(" AND n.is_read = FALSE");
        }
        builder
            .push(" ORDER BY n.created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let notifications = builder
            .build_query_as::<NotificationResponse>()
            .fetch_all(&self.pool)
            .await?;
        Ok(notifications)
    }

    async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        let res = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    async fn save_subscription(&self, user_id: Uuid, subscription: &PushSubscriptionRequest) -> AppResult<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO push_subscriptions (id, user_id, endpoint, p256dh, auth) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (endpoint) DO UPDATE \
                SET user_id = EXCLUDED.user_id, p256dh = EXCLUDED.p256dh, auth = EXCLUDED.auth \
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&subscription.endpoint)
        .bind(&subscription.keys.p256dh)
        .bind(&subscription.keys.auth)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn list_subscriptions(&self, user_id: Uuid) -> AppResult<Vec<PushSubscription>> {
        let subscriptions = sqlx::query_as::<_, PushSubscription>(
            "SELECT id, user_id, endpoint, p256dh, auth, created_at \
             FROM push_subscriptions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(subscriptions)
    }

    async fn delete_subscription(&self, id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM push_subscriptions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_subscription_by_endpoint(&self, endpoint: &str) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = $1")
            .bind(endpoint)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
