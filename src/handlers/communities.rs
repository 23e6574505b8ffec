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
        Community, CommunityFilter, CreateCommunityRequest, MemberFilter, MemberRole, MemberView,
        Membership, MembershipStatus, NewNotification, NotificationKind, Pagination, ReviewAction,
        ReviewMembershipRequest, can_moderate, ensure_can_leave, join_status, review_status,
    },
    notify::notify,
};

async fn community_or_404(state: &AppState, id: Uuid) -> AppResult<Community> {
    state.repos.communities.get_community(id).await?.ok_or(AppError::NotFound)
}

/// Fails with 403 unless `user` may moderate `community_id`.
async fn require_moderator(state: &AppState, community_id: Uuid, user: &AuthUser) -> AppResult<()> {
    let own = state.repos.communities.get_membership(community_id, user.id).await?;
    if can_moderate(user, own.as_ref()) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[utoipa::path(
    get,
    path = "/communities",
    params(CommunityFilter),
    responses((status = 200, description = "Communities", body = [Community]))
)]
pub async fn list_communities(
    State(state): State<AppState>,
    Query(filter): Query<CommunityFilter>,
) -> AppResult<Json<Vec<Community>>> {
    let page = Pagination::new(filter.page, filter.per_page);
    Ok(Json(state.repos.communities.list_communities(filter.search, page).await?))
}

#[utoipa::path(
    get,
    path = "/communities/{id}",
    params(("id" = Uuid, Path, description = "Community ID")),
    responses(
        (status = 200, description = "Found", body = Community),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_community(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Community>> {
    Ok(Json(community_or_404(&state, id).await?))
}

/// create_community
///
/// [Authenticated Route] The creator becomes the active owner.
#[utoipa::path(
    post,
    path = "/communities",
    request_body = CreateCommunityRequest,
    responses(
        (status = 201, description = "Created", body = Community),
        (status = 400, description = "Invalid slug or name"),
        (status = 409, description = "Slug taken")
    )
)]
pub async fn create_community(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCommunityRequest>,
) -> AppResult<(StatusCode, Json<Community>)> {
    let new_community = payload.validate()?;
    let community = state.repos.communities.create_community(user.id, new_community).await?;
    tracing::info!(community_id = %community.id, owner_id = %user.id, "community created");
    Ok((StatusCode::CREATED, Json(community)))
}

/// join_community
///
/// [Authenticated Route] Joins directly, or files a pending request when the
/// community requires approval. The owner is told about pending requests.
#[utoipa::path(
    post,
    path = "/communities/{id}/join",
    params(("id" = Uuid, Path, description = "Community ID")),
    responses(
        (status = 200, description = "Membership", body = Membership),
        (status = 403, description = "Banned"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Already a member or pending")
    )
)]
pub async fn join_community(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Membership>> {
    let community = community_or_404(&state, id).await?;
    let existing = state.repos.communities.get_membership(id, user.id).await?;
    let status = join_status(existing.as_ref(), community.requires_approval)?;

    let membership = state
        .repos
        .communities
        .upsert_membership(id, user.id, status)
        .await?
        .ok_or_else(|| AppError::conflict("membership already exists"))?;

    if membership.status == MembershipStatus::Pending {
        notify(
            &state,
            NewNotification::about_community(
                NotificationKind::MembershipRequested,
                community.owner_id,
                user.id,
                community.id,
            ),
        )
        .await;
    }
    Ok(Json(membership))
}

/// leave_community
///
/// [Authenticated Route] Drops the caller's own membership. Owners and banned
/// members cannot leave.
#[utoipa::path(
    delete,
    path = "/communities/{id}/membership",
    params(("id" = Uuid, Path, description = "Community ID")),
    responses(
        (status = 204, description = "Left"),
        (status = 403, description = "Banned members cannot leave"),
        (status = 404, description = "Not a member"),
        (status = 409, description = "Owner cannot leave")
    )
)]
pub async fn leave_community(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let membership = state
        .repos
        .communities
        .get_membership(id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_can_leave(&membership)?;

    if state.repos.communities.leave_community(id, user.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// list_members
///
/// [Authenticated Route] Moderators see every status; everyone else sees active
/// members only.
#[utoipa::path(
    get,
    path = "/communities/{id}/members",
    params(("id" = Uuid, Path, description = "Community ID"), MemberFilter),
    responses(
        (status = 200, description = "Members", body = [MemberView]),
        (status = 403, description = "Status filter requires moderator rights"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn list_members(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(filter): Query<MemberFilter>,
) -> AppResult<Json<Vec<MemberView>>> {
    community_or_404(&state, id).await?;

    let status = match filter.status {
        None | Some(MembershipStatus::Active) => {
            let own = state.repos.communities.get_membership(id, user.id).await?;
            if can_moderate(&user, own.as_ref()) {
                filter.status
            } else {
                Some(MembershipStatus::Active)
            }
        }
        Some(other) => {
            require_moderator(&state, id, &user).await?;
            Some(other)
        }
    };
    Ok(Json(state.repos.communities.list_members(id, status).await?))
}

/// review_member
///
/// [Authenticated Route] Approve, reject or ban a member. Needs community
/// moderator rights or the site admin role. The applicant hears about approvals
/// and rejections.
#[utoipa::path(
    put,
    path = "/communities/{id}/members/{user_id}",
    params(
        ("id" = Uuid, Path, description = "Community ID"),
        ("user_id" = Uuid, Path, description = "Member ID")
    ),
    request_body = ReviewMembershipRequest,
    responses(
        (status = 200, description = "Updated membership", body = Membership),
        (status = 403, description = "Not a moderator, or target is the owner"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Transition not allowed from the current status")
    )
)]
pub async fn review_member(
    user: AuthUser,
    State(state): State<AppState>,
    Path((id, member_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ReviewMembershipRequest>,
) -> AppResult<Json<Membership>> {
    let community = community_or_404(&state, id).await?;
    require_moderator(&state, id, &user).await?;

    let target = state
        .repos
        .communities
        .get_membership(id, member_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let next = review_status(&target, payload.action)?;

    let updated = state
        .repos
        .communities
        .set_membership_status(id, member_id, target.status, next)
        .await?
        .ok_or_else(|| AppError::conflict("membership changed concurrently"))?;
    tracing::info!(
        community_id = %id,
        member_id = %member_id,
        moderator_id = %user.id,
        from = %target.status,
        to = %next,
        "membership reviewed"
    );

    let kind = match payload.action {
        ReviewAction::Approve => Some(NotificationKind::MembershipApproved),
        ReviewAction::Reject => Some(NotificationKind::MembershipRejected),
        ReviewAction::Ban => None,
    };
    if let Some(kind) = kind {
        notify(&state, NewNotification::about_community(kind, member_id, user.id, community.id)).await;
    }
    Ok(Json(updated))
}

/// remove_member
///
/// [Authenticated Route] Moderator removal. The owner row is untouchable.
#[utoipa::path(
    delete,
    path = "/communities/{id}/members/{user_id}",
    params(
        ("id" = Uuid, Path, description = "Community ID"),
        ("user_id" = Uuid, Path, description = "Member ID")
    ),
    responses(
        (status = 204, description = "Removed"),
        (status = 403, description = "Not a moderator, or target is the owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn remove_member(
    user: AuthUser,
    State(state): State<AppState>,
    Path((id, member_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    community_or_404(&state, id).await?;
    require_moderator(&state, id, &user).await?;

    let target = state
        .repos
        .communities
        .get_membership(id, member_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if target.role == MemberRole::Owner {
        return Err(AppError::Forbidden);
    }

    if state.repos.communities.remove_membership(id, member_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
