use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{CreateReportRequest, Report, ReportTarget},
};

/// create_report
///
/// [Authenticated Route] Flags a post or comment for moderators. The target must
/// exist and be visible to the reporter; each user reports a target once.
#[utoipa::path(
    post,
    path = "/reports",
    request_body = CreateReportRequest,
    responses(
        (status = 201, description = "Reported", body = Report),
        (status = 400, description = "Invalid reason"),
        (status = 404, description = "Target not found"),
        (status = 409, description = "Already reported")
    )
)]
pub async fn create_report(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateReportRequest>,
) -> AppResult<(StatusCode, Json<Report>)> {
    let reason = payload.validate()?;

    let post_id = match payload.target {
        ReportTarget::Post { id } => Some(id),
        // A comment is only as visible as the post it sits under.
        ReportTarget::Comment { id } => state.repos.posts.get_comment(id).await?.map(|c| c.post_id),
    };
    let exists = match post_id {
        Some(post_id) => state
            .repos
            .posts
            .get_post(post_id)
            .await?
            .is_some_and(|post| post.is_visible_to(Some(&user))),
        None => false,
    };
    if !exists {
        return Err(AppError::NotFound);
    }

    let report = state.repos.reports.create_report(user.id, payload.target, reason).await?;
    tracing::info!(report_id = %report.id, reporter_id = %user.id, target = %report.target_type, "content reported");
    Ok((StatusCode::CREATED, Json(report)))
}
