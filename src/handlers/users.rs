use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AuthUser, decode_session_token},
    config::Env,
    error::{AppError, AppResult},
    models::{Community, NewUser, PublicProfile, RegisterUserRequest, UpdateProfileRequest, User},
};

/// register_user
///
/// [Public Route] Creates the account with the hosted auth provider, then the local
/// profile under the same id. Every new profile is a `member`. A taken username is
/// refused before the hosted account is created.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = User),
        (status = 400, description = "Invalid input or rejected by the auth provider"),
        (status = 409, description = "Email or username taken"),
        (status = 502, description = "Auth provider unavailable")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    payload.validate()?;
    let email = payload.email.trim().to_lowercase();
    if state.repos.users.username_taken(&payload.username).await? {
        return Err(AppError::conflict("username already taken"));
    }

    let id = state.auth_provider.sign_up(&email, &payload.password).await?;
    let user = state
        .repos
        .users
        .create_user(NewUser {
            id,
            email,
            username: payload.username,
            display_name: payload.display_name.filter(|name| !name.trim().is_empty()),
        })
        .await
        .inspect_err(|e| {
            // The hosted account exists at this point; it stays without a profile.
            tracing::warn!(auth_user_id = %id, error = %e, "profile creation failed after sign-up");
        })?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// CreateSessionRequest
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    /// Access token issued by the hosted auth provider at sign-in.
    pub access_token: String,
}

/// create_session
///
/// [Public Route] Exchanges a hosted-auth access token for an HttpOnly session cookie.
/// The token is verified and must belong to an existing profile.
#[utoipa::path(
    post,
    path = "/auth/session",
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "Session cookie set", body = User),
        (status = 401, description = "Invalid token or unknown profile")
    )
)]
pub async fn create_session(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<CreateSessionRequest>,
) -> AppResult<(CookieJar, Json<User>)> {
    let token = payload.access_token.trim().to_string();
    let claims = decode_session_token(&state.config, &token)?;
    let user = state.repos.users.get_user(claims.sub).await?.ok_or(AppError::Unauthorized)?;

    let cookie = Cookie::build((state.config.session_cookie.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.env == Env::Production);

    Ok((jar.add(cookie), Json(user)))
}

/// delete_session
///
/// [Public Route] Clears the session cookie. Idempotent.
#[utoipa::path(
    delete,
    path = "/auth/session",
    responses((status = 204, description = "Session cookie cleared"))
)]
pub async fn delete_session(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, StatusCode) {
    let jar = jar.remove(Cookie::build((state.config.session_cookie.clone(), "")).path("/"));
    (jar, StatusCode::NO_CONTENT)
}

/// get_me
///
/// [Authenticated Route] The caller's full profile, including email and role.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = User))
)]
pub async fn get_me(user: AuthUser, State(state): State<AppState>) -> AppResult<Json<User>> {
    let profile = state.repos.users.get_user(user.id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(profile))
}

#[utoipa::path(
    patch,
    path = "/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = User),
        (status = 400, description = "Invalid field")
    )
)]
pub async fn update_me(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<User>> {
    let changes = payload.validate()?;
    let profile = state
        .repos
        .users
        .update_profile(user.id, changes)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(profile))
}

/// get_my_communities
///
/// [Authenticated Route] Communities the caller is an active member of.
#[utoipa::path(
    get,
    path = "/me/communities",
    responses((status = 200, description = "My communities", body = [Community]))
)]
pub async fn get_my_communities(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Community>>> {
    Ok(Json(state.repos.communities.list_user_communities(user.id).await?))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Public profile", body = PublicProfile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PublicProfile>> {
    let user = state.repos.users.get_user(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(user.into()))
}
