use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{
        MarkedRead, NotificationFilter, NotificationResponse, Pagination, PushSubscriptionRequest,
        SubscriptionResponse, UnreadCount, VapidPublicKey,
    },
};

/// get_notifications
///
/// [Authenticated Route] The caller's notifications, newest first. `unread=true`
/// limits the list to unread ones.
#[utoipa::path(
    get,
    path = "/notifications",
    params(NotificationFilter),
    responses((status = 200, description = "My Notifications", body = [NotificationResponse]))
)]
pub async fn get_notifications(
    user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<NotificationFilter>,
) -> AppResult<Json<Vec<NotificationResponse>>> {
    let page = Pagination::new(filter.page, filter.per_page);
    let notifications = state
        .repos
        .notifications
        .list_notifications(user.id, filter.unread, page)
        .await?;
    Ok(Json(notifications))
}

#[utoipa::path(
    get,
    path = "/notifications/unread-count",
    responses((status = 200, description = "Unread notifications", body = UnreadCount))
)]
pub async fn get_unread_count(user: AuthUser, State(state): State<AppState>) -> AppResult<Json<UnreadCount>> {
    let count = state.repos.notifications.unread_count(user.id).await?;
    Ok(Json(UnreadCount { count }))
}

/// mark_notification_read
///
/// [Authenticated Route] Only the recipient can mark a notification; for anyone
/// else it does not exist.
#[utoipa::path(
    patch,
    path = "/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 204, description = "Marked as read"),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn mark_notification_read(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if state.repos.notifications.mark_read(id, user.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

#[utoipa::path(
    post,
    path = "/notifications/read-all",
    responses((status = 200, description = "Marked as read", body = MarkedRead))
)]
pub async fn mark_all_notifications_read(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<MarkedRead>> {
    let updated = state.repos.notifications.mark_all_read(user.id).await?;
    Ok(Json(MarkedRead { updated }))
}

// --- Web Push ---

/// get_vapid_public_key
///
/// [Public Route] The application server key browsers subscribe with. 404 when
/// push is not configured.
#[utoipa::path(
    get,
    path = "/push/vapid-public-key",
    responses(
        (status = 200, description = "VAPID public key", body = VapidPublicKey),
        (status = 404, description = "Push disabled")
    )
)]
pub async fn get_vapid_public_key(State(state): State<AppState>) -> AppResult<Json<VapidPublicKey>> {
    let public_key = state.push.public_key().ok_or(AppError::NotFound)?;
    Ok(Json(VapidPublicKey { public_key: public_key.to_string() }))
}

/// subscribe_push
///
/// [Authenticated Route] Stores a browser push subscription for the caller. Sending
/// the same endpoint again updates it in place.
#[utoipa::path(
    post,
    path = "/push/subscriptions",
    request_body = PushSubscriptionRequest,
    responses(
        (status = 201, description = "Subscribed", body = SubscriptionResponse),
        (status = 400, description = "Invalid subscription")
    )
)]
pub async fn subscribe_push(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PushSubscriptionRequest>,
) -> AppResult<(StatusCode, Json<SubscriptionResponse>)> {
    payload.validate()?;
    let id = state.repos.notifications.save_subscription(user.id, &payload).await?;
    tracing::debug!(user_id = %user.id, subscription_id = %id, "push subscription saved");
    Ok((StatusCode::CREATED, Json(SubscriptionResponse { id })))
}

#[utoipa::path(
    delete,
    path = "/push/subscriptions/{id}",
    params(("id" = Uuid, Path, description = "Subscription ID")),
    responses(
        (status = 204, description = "Unsubscribed"),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn unsubscribe_push(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if state.repos.notifications.delete_subscription(id, user.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
