use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    AppState,
    handlers::{communities, notifications, posts, tags, users},
};

/// Public Router
///
/// Read-only browsing plus the account gateway. Hidden posts are filtered by the
/// handlers, which see the optional viewer.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // Liveness check for the load balancer.
        .route("/health", get(|| async { "ok" }))
        .route("/register", post(users::register_user))
        .route(
            "/auth/session",
            post(users::create_session).delete(users::delete_session),
        )
        .route("/posts", get(posts::list_posts))
        .route("/posts/{id}", get(posts::get_post))
        .route("/posts/{id}/comments", get(posts::list_comments))
        .route("/communities", get(communities::list_communities))
        .route("/communities/{id}", get(communities::get_community))
        .route("/tags", get(tags::list_tags))
        .route("/users/{id}", get(users::get_user_profile))
        .route("/push/vapid-public-key", get(notifications::get_vapid_public_key))
}
