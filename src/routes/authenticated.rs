use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use crate::{
    AppState,
    handlers::{communities, messages, notifications, posts, reports, uploads, users},
};

/// Authenticated Router
///
/// Everything a signed-in member does. Ownership checks (posts, comments,
/// conversations, notifications) happen in the handlers against the `AuthUser`.
///
/// Paths shared with the public router (`/posts`, `/posts/{id}`, ...) only add
/// methods here; axum merges the method routers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Profile ---
        .route("/me", get(users::get_me).patch(users::update_me))
        .route("/me/communities", get(users::get_my_communities))
        // --- Posts, likes, comments ---
        .route("/posts", post(posts::create_post))
        .route("/posts/{id}", put(posts::update_post).delete(posts::delete_post))
        .route("/posts/{id}/like", post(posts::like_post).delete(posts::unlike_post))
        .route("/posts/{id}/comments", post(posts::add_comment))
        .route("/comments/{id}", delete(posts::delete_comment))
        // --- Communities & membership ---
        .route("/communities", post(communities::create_community))
        .route("/communities/{id}/join", post(communities::join_community))
        .route("/communities/{id}/membership", delete(communities::leave_community))
        .route("/communities/{id}/members", get(communities::list_members))
        .route(
            "/communities/{id}/members/{user_id}",
            put(communities::review_member).delete(communities::remove_member),
        )
        // --- Direct messages ---
        .route(
            "/conversations",
            get(messages::list_conversations).post(messages::start_conversation),
        )
        .route(
            "/conversations/{id}/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route("/conversations/{id}/read", post(messages::mark_conversation_read))
        // --- Notifications & push ---
        .route("/notifications", get(notifications::get_notifications))
        .route("/notifications/unread-count", get(notifications::get_unread_count))
        .route("/notifications/{id}/read", patch(notifications::mark_notification_read))
        .route("/notifications/read-all", post(notifications::mark_all_notifications_read))
        .route("/push/subscriptions", post(notifications::subscribe_push))
        .route("/push/subscriptions/{id}", delete(notifications::unsubscribe_push))
        // --- Moderation input & media ---
        .route("/reports", post(reports::create_report))
        .route("/upload/presigned", post(uploads::get_presigned_url))
}
