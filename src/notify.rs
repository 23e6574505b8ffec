use crate::{
    AppState,
    models::NewNotification,
    push::deliver_to_user,
};

/// notify
///
/// Records an in-app notification and fans it out over Web Push in the background.
/// Never fails the calling request: errors are logged and dropped. Self-notifications
/// are skipped.
pub async fn notify(state: &AppState, notification: NewNotification) {
    if notification.is_self_inflicted() {
        return;
    }
    let recipient = notification.user_id;
    let kind = notification.kind;

    let created = match state.repos.notifications.create_notification(notification).await {
        Ok(created) => created,
        Err(e) => {
            tracing::warn!(%recipient, %kind, error = %e, "failed to record notification");
            return;
        }
    };
    tracing::debug!(%recipient, %kind, notification_id = %created.id, "notification recorded");

    if state.push.public_key().is_none() {
        return;
    }
    let push = state.push.clone();
    let notifications = state.repos.notifications.clone();
    let payload = created.push_payload();
    tokio::spawn(async move {
        deliver_to_user(&push, &notifications, recipient, &payload).await;
    });
}
