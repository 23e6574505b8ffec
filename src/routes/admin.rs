use axum::{
    Router,
    routing::{delete, get, put},
};

use crate::{AppState, handlers::admin};

/// Admin Router
///
/// Moderation and oversight. Nested under `/admin` behind the admin guard.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(admin::get_admin_stats))
        .route("/posts", get(admin::get_admin_posts))
        .route("/posts/{id}", delete(admin::delete_post_admin))
        .route("/posts/{id}/status", put(admin::update_post_status))
        .route("/comments/{id}", delete(admin::delete_comment_admin))
        .route("/reports", get(admin::get_reports))
        .route("/reports/{id}", put(admin::resolve_report))
        .route("/memberships/pending", get(admin::get_pending_memberships))
        .route("/users/{id}/role", put(admin::set_user_role))
}
