use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AuthUser, MaybeUser},
    error::{AppError, AppResult},
    models::{
        Comment, CreateCommentRequest, CreatePostRequest, NewNotification, NotificationKind, Post,
        PostFilter, UpdatePostRequest,
    },
    notify::notify,
};

/// Loads a post the viewer is allowed to see. Hidden posts look missing to everyone
/// but their author and admins.
async fn visible_post(state: &AppState, id: Uuid, viewer: Option<&AuthUser>) -> AppResult<Post> {
    state
        .repos
        .posts
        .get_post(id)
        .await?
        .filter(|post| post.is_visible_to(viewer))
        .ok_or(AppError::NotFound)
}

/// list_posts
///
/// [Public Route] Published posts, newest first, filtered by community, tag, author
/// or free-text search.
#[utoipa::path(
    get,
    path = "/posts",
    params(PostFilter),
    responses(
        (status = 200, description = "Published posts", body = [Post]),
        (status = 400, description = "Invalid tag filter")
    )
)]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(filter): Query<PostFilter>,
) -> AppResult<Json<Vec<Post>>> {
    let query = filter.into_query()?;
    Ok(Json(state.repos.posts.list_posts(query).await?))
}

#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = Post),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_post(
    MaybeUser(viewer): MaybeUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Post>> {
    Ok(Json(visible_post(&state, id, viewer.as_ref()).await?))
}

/// create_post
///
/// [Authenticated Route] Publishes a post. Posting into a community requires an
/// active membership there.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = Post),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Not an active member of the community")
    )
)]
pub async fn create_post(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<Post>)> {
    let new_post = payload.validate()?;

    if let Some(community_id) = new_post.community_id {
        state
            .repos
            .communities
            .get_community(community_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let membership = state.repos.communities.get_membership(community_id, user.id).await?;
        if !membership.is_some_and(|m| m.is_active()) {
            return Err(AppError::Forbidden);
        }
    }

    let post = state.repos.posts.create_post(user.id, new_post).await?;
    tracing::info!(post_id = %post.id, author_id = %user.id, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// update_post
///
/// [Authenticated Route] Author-only edit. Anyone else gets 404.
#[utoipa::path(
    put,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 404, description = "Not Found or Not Author")
    )
)]
pub async fn update_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> AppResult<Json<Post>> {
    let changes = payload.validate()?;
    let post = state
        .repos
        .posts
        .update_post(id, user.id, changes)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(post))
}

#[utoipa::path(
    delete,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found or Not Author")
    )
)]
pub async fn delete_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if state.repos.posts.delete_post(id, user.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// like_post
///
/// [Authenticated Route] One like per user and post; a repeat is a 409.
#[utoipa::path(
    post,
    path = "/posts/{id}/like",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Liked"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Already liked")
    )
)]
pub async fn like_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let post = visible_post(&state, id, Some(&user)).await?;
    if !state.repos.posts.like_post(user.id, post.id).await? {
        return Err(AppError::conflict("post already liked"));
    }
    notify(
        &state,
        NewNotification::about_post(NotificationKind::PostLiked, post.author_id, user.id, post.id),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/posts/{id}/like",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Like removed"),
        (status = 404, description = "Not liked")
    )
)]
pub async fn unlike_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if state.repos.posts.unlike_post(user.id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// list_comments
///
/// [Public Route] Comments of a post the viewer can see, oldest first.
#[utoipa::path(
    get,
    path = "/posts/{id}/comments",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Comments", body = [Comment]),
        (status = 404, description = "Not Found")
    )
)]
pub async fn list_comments(
    MaybeUser(viewer): MaybeUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Comment>>> {
    let post = visible_post(&state, id, viewer.as_ref()).await?;
    Ok(Json(state.repos.posts.list_comments(post.id).await?))
}

#[utoipa::path(
    post,
    path = "/posts/{id}/comments",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment Added", body = Comment),
        (status = 404, description = "Not Found")
    )
)]
pub async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let body = payload.validate()?;
    let post = visible_post(&state, id, Some(&user)).await?;
    let comment = state.repos.posts.add_comment(post.id, user.id, body).await?;
    notify(
        &state,
        NewNotification::about_post(NotificationKind::PostCommented, post.author_id, user.id, post.id),
    )
    .await;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// delete_comment
///
/// [Authenticated Route] The author deletes their own comment; admins delete any.
#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let deleted = if user.is_admin() {
        state.repos.posts.delete_comment_admin(id).await?
    } else {
        state.repos.posts.delete_comment(id, user.id).await?
    };
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
