//! Moderation endpoints under `/admin`. The router only lets admins through; the
//! handlers still take `AuthUser` where the acting admin is recorded or notified.

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
        AdminDashboardStats, AdminPostFilter, ClosedReport, MemberView, NewNotification, NotificationKind,
        PageParams, Pagination, Post, PostStatus, Report, ReportFilter, ReportStatus,
        ResolveReportRequest, SetPostStatusRequest, SetRoleRequest, User,
    },
    notify::notify,
};

#[utoipa::path(
    get,
    path = "/admin/stats",
    responses(
        (status = 200, description = "Stats", body = AdminDashboardStats),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn get_admin_stats(State(state): State<AppState>) -> AppResult<Json<AdminDashboardStats>> {
    Ok(Json(state.repos.users.dashboard_stats().await?))
}

/// get_admin_posts
///
/// [Admin Route] Every post regardless of status, optionally filtered by one.
#[utoipa::path(
    get,
    path = "/admin/posts",
    params(AdminPostFilter),
    responses((status = 200, description = "All posts", body = [Post]))
)]
pub async fn get_admin_posts(
    State(state): State<AppState>,
    Query(filter): Query<AdminPostFilter>,
) -> AppResult<Json<Vec<Post>>> {
    let page = Pagination::new(filter.page, filter.per_page);
    Ok(Json(state.repos.posts.list_all_posts(filter.status, page).await?))
}

/// update_post_status
///
/// [Admin Route] Publishes or hides a post. The author hears about hides.
#[utoipa::path(
    put,
    path = "/admin/posts/{id}/status",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = SetPostStatusRequest,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_post_status(
    admin: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetPostStatusRequest>,
) -> AppResult<Json<Post>> {
    let post = state
        .repos
        .posts
        .set_post_status(id, payload.status)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(post_id = %id, admin_id = %admin.id, status = %post.status, "post status changed");

    if post.status == PostStatus::Hidden {
        notify(
            &state,
            NewNotification::about_post(NotificationKind::PostHidden, post.author_id, admin.id, post.id),
        )
        .await;
    }
    Ok(Json(post))
}

#[utoipa::path(
    delete,
    path = "/admin/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post_admin(
    admin: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !state.repos.posts.delete_post_admin(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(post_id = %id, admin_id = %admin.id, "post force-deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/admin/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment_admin(
    admin: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    if !state.repos.posts.delete_comment_admin(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(comment_id = id, admin_id = %admin.id, "comment force-deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// get_reports
///
/// [Admin Route] The report queue, oldest first.
#[utoipa::path(
    get,
    path = "/admin/reports",
    params(ReportFilter),
    responses((status = 200, description = "Reports", body = [Report]))
)]
pub async fn get_reports(
    State(state): State<AppState>,
    Query(filter): Query<ReportFilter>,
) -> AppResult<Json<Vec<Report>>> {
    let page = Pagination::new(filter.page, filter.per_page);
    Ok(Json(state.repos.reports.list_reports(filter.status, page).await?))
}

/// resolve_report
///
/// [Admin Route] Closes an open report as resolved or dismissed. With `hide_post`
/// the reported post is hidden, or the reported comment deleted. The reporter is
/// notified either way.
#[utoipa::path(
    put,
    path = "/admin/reports/{id}",
    params(("id" = Uuid, Path, description = "Report ID")),
    request_body = ResolveReportRequest,
    responses(
        (status = 200, description = "Resolved", body = Report),
        (status = 400, description = "Invalid resolution"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Report is not open")
    )
)]
pub async fn resolve_report(
    admin: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolveReportRequest>,
) -> AppResult<Json<Report>> {
    let resolution = payload.validate()?;
    let report = state.repos.reports.get_report(id).await?.ok_or(AppError::NotFound)?;
    if report.status != ReportStatus::Open {
        return Err(AppError::conflict("report is already closed"));
    }

    let ClosedReport { report, hidden_post_author } = state
        .repos
        .reports
        .resolve_report(id, admin.id, &resolution)
        .await?
        .ok_or_else(|| AppError::conflict("report is already closed"))?;
    tracing::info!(report_id = %id, admin_id = %admin.id, status = %report.status, "report closed");

    if let (Some(author_id), Some(post_id)) = (hidden_post_author, report.post_id) {
        notify(
            &state,
            NewNotification::about_post(NotificationKind::PostHidden, author_id, admin.id, post_id),
        )
        .await;
    }
    notify(
        &state,
        NewNotification {
            user_id: report.reporter_id,
            actor_id: admin.id,
            kind: NotificationKind::ReportResolved,
            post_id: report.post_id,
            ..NewNotification::default()
        },
    )
    .await;
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/admin/memberships/pending",
    params(PageParams),
    responses((status = 200, description = "Pending membership requests", body = [MemberView]))
)]
pub async fn get_pending_memberships(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<Vec<MemberView>>> {
    Ok(Json(state.repos.communities.list_pending_memberships(params.pagination()).await?))
}

/// set_user_role
///
/// [Admin Route] Promotes or demotes a user. Admins cannot change their own role,
/// so the last admin cannot lock everyone out.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Own role")
    )
)]
pub async fn set_user_role(
    admin: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetRoleRequest>,
) -> AppResult<Json<User>> {
    if id == admin.id {
        return Err(AppError::conflict("admins cannot change their own role"));
    }
    let user = state
        .repos
        .users
        .set_role(id, payload.role)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(user_id = %id, admin_id = %admin.id, role = %user.role, "role changed");
    Ok(Json(user))
}
